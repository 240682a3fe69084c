//! Caller-driven cancellation
//!
//! A [`CancelHandle`] flips a watch channel; every [`Cancellation`] cloned from
//! it observes the flip. Futures raced against [`Cancellation::cancelled`] are
//! dropped when it fires, which aborts in-flight HTTP requests and releases
//! their connections.

use crate::error::RpcError;
use std::future::Future;
use tokio::sync::watch;

/// Owner side; cancelling is idempotent
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cheap to clone
#[derive(Clone, Debug)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> Cancellation {
        Cancellation {
            rx: self.tx.subscribe(),
        }
    }
}

impl Cancellation {
    /// A token that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. If the handle was dropped without
    /// cancelling, never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` unless cancelled first
    pub async fn run<T, F>(&self, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        if self.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(RpcError::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_future() {
        let (handle, token) = cancellation();
        let task = tokio::spawn(async move {
            token
                .run(async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, RpcError>(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        assert_eq!(task.await.unwrap(), Err(RpcError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_short_circuits() {
        let (handle, token) = cancellation();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(handle.token().is_cancelled());
        let result = token.run(async { Ok::<_, RpcError>(1) }).await;
        assert_eq!(result, Err(RpcError::Cancelled));
    }

    #[tokio::test]
    async fn test_never_lets_work_finish() {
        let token = Cancellation::never();
        assert!(!token.is_cancelled());
        assert_eq!(token.run(async { Ok::<_, RpcError>(7) }).await, Ok(7));
    }
}
