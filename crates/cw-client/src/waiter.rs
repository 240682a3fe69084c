//! Confirmation polling

use crate::cancel::Cancellation;
use crate::error::{ClientError, RpcError};
use crate::transport::{RpcTransport, TxStatus};
use cw_types::{Event, Hash, Message, MsgOutcome};
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, warn};

/// Same cap tokio applies when a timeout does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn instant_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Where a transaction stands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionResult {
    /// Not seen in a block before the deadline
    Pending { hash: Hash },
    Included {
        hash: Hash,
        height: u64,
        gas_used: u64,
        events: Vec<Event>,
    },
    /// Included, but execution failed
    Failed {
        hash: Hash,
        height: u64,
        code: u32,
        log: String,
    },
}

impl TransactionResult {
    pub fn hash(&self) -> Hash {
        match self {
            TransactionResult::Pending { hash }
            | TransactionResult::Included { hash, .. }
            | TransactionResult::Failed { hash, .. } => *hash,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TransactionResult::Pending { .. })
    }

    pub fn height(&self) -> Option<u64> {
        match self {
            TransactionResult::Pending { .. } => None,
            TransactionResult::Included { height, .. }
            | TransactionResult::Failed { height, .. } => Some(*height),
        }
    }

    pub fn events(&self) -> &[Event] {
        match self {
            TransactionResult::Included { events, .. } => events,
            _ => &[],
        }
    }

    /// Per-message results, in message order. Empty unless included.
    pub fn outcomes(&self, msgs: &[Message]) -> Vec<MsgOutcome> {
        match self {
            TransactionResult::Included { events, .. } => {
                msgs.iter().map(|msg| msg.parse_outcome(events)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Turn an execution failure into an error; other states pass through
    pub fn into_result(self) -> Result<Self, ClientError> {
        match self {
            TransactionResult::Failed {
                hash,
                height,
                code,
                log,
            } => Err(ClientError::TransactionFailed {
                hash,
                height,
                code,
                log,
            }),
            other => Ok(other),
        }
    }
}

impl From<TxStatus> for TransactionResult {
    fn from(status: TxStatus) -> Self {
        if status.code == 0 {
            TransactionResult::Included {
                hash: status.hash,
                height: status.height,
                gas_used: status.gas_used,
                events: status.events,
            }
        } else {
            TransactionResult::Failed {
                hash: status.hash,
                height: status.height,
                code: status.code,
                log: status.log,
            }
        }
    }
}

/// Polls the node until a transaction lands or a deadline passes
#[derive(Clone)]
pub struct ConfirmationWaiter {
    transport: RpcTransport,
    poll_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(transport: RpcTransport, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }

    /// Wait up to `timeout` for `hash` to be included. Running out of time is
    /// not an error: the result is `Pending`, and calling again later picks
    /// up where this left off.
    pub async fn await_confirmation(
        &self,
        hash: &Hash,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> Result<TransactionResult, ClientError> {
        let deadline = instant_after(Instant::now(), timeout);
        let mut polls = 0u32;

        loop {
            polls += 1;
            match timeout_at(deadline, self.transport.tx_status(hash, cancel)).await {
                Ok(Ok(Some(status))) => {
                    debug!(
                        hash = %hash,
                        height = status.height,
                        code = status.code,
                        polls,
                        "Transaction included"
                    );
                    return Ok(status.into());
                }
                Ok(Ok(None)) => {}
                Ok(Err(RpcError::Cancelled)) => return Err(RpcError::Cancelled.into()),
                Ok(Err(e)) if e.is_transient() => {
                    warn!(hash = %hash, error = %e, "Transient error while polling");
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let next = instant_after(now, self.poll_interval).min(deadline);
            cancel
                .run(async {
                    sleep_until(next).await;
                    Ok(())
                })
                .await?;
        }

        debug!(hash = %hash, polls, "Confirmation timed out; still pending");
        Ok(TransactionResult::Pending { hash: *hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_types::{Addr, Coins};

    fn hash() -> Hash {
        Hash::of(b"tx")
    }

    #[test]
    fn test_status_conversion() {
        let ok = TxStatus {
            hash: hash(),
            height: 10,
            code: 0,
            log: String::new(),
            gas_wanted: 100,
            gas_used: 80,
            events: vec![Event::new("transfer")],
        };
        let result: TransactionResult = ok.clone().into();
        assert_eq!(result.height(), Some(10));
        assert_eq!(result.events().len(), 1);
        assert!(result.clone().into_result().is_ok());

        let failed: TransactionResult = TxStatus {
            code: 5,
            log: "insufficient funds".into(),
            ..ok
        }
        .into();
        assert!(matches!(
            failed.into_result(),
            Err(ClientError::TransactionFailed { code: 5, height: 10, .. })
        ));
    }

    #[test]
    fn test_pending_has_no_outcomes() {
        let pending = TransactionResult::Pending { hash: hash() };
        let msg = Message::transfer(
            Addr::from_array([1; 32]),
            Addr::from_array([2; 32]),
            Coins::empty(),
        );
        assert!(pending.is_pending());
        assert!(pending.outcomes(&[msg]).is_empty());
        assert_eq!(pending.height(), None);
    }

    #[test]
    fn test_oversized_wait_is_capped() {
        let now = Instant::now();
        let capped = instant_after(now, Duration::MAX);
        assert_eq!(capped, now + FAR_FUTURE);
        assert_eq!(
            instant_after(now, Duration::from_millis(10)),
            now + Duration::from_millis(10)
        );
    }
}
