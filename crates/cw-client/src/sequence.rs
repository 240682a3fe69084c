//! Per-account sequence tracking
//!
//! Each account gets its own async mutex; the guard is held across
//! build and broadcast so concurrent submissions for one sender serialize,
//! while unrelated senders never contend. The node stays the source of
//! truth: a sequence mismatch resets the account to `Unknown`.

use crate::tx_builder::AccountSnapshot;
use cw_types::Addr;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountState {
    Unknown,
    Known { sequence: u64, chain_id: String },
}

#[derive(Default)]
pub struct SequenceTracker {
    accounts: DashMap<Addr, Arc<Mutex<AccountState>>>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive ownership of an account's sequence until the guard
    /// drops
    pub async fn lock(&self, address: &Addr) -> AccountGuard {
        // Clone the slot out so the map shard is not held across the await
        let slot = self
            .accounts
            .entry(*address)
            .or_insert_with(|| Arc::new(Mutex::new(AccountState::Unknown)))
            .clone();
        AccountGuard {
            address: *address,
            state: slot.lock_owned().await,
        }
    }

    /// Current state, waiting for any in-flight submission to finish
    pub async fn state(&self, address: &Addr) -> AccountState {
        self.lock(address).await.state().clone()
    }

    /// Forget an account, forcing a refresh on next use
    pub async fn invalidate(&self, address: &Addr) {
        self.lock(address).await.invalidate();
    }
}

/// Exclusive access to one account's sequence
pub struct AccountGuard {
    address: Addr,
    state: OwnedMutexGuard<AccountState>,
}

impl AccountGuard {
    pub fn address(&self) -> &Addr {
        &self.address
    }

    pub fn state(&self) -> &AccountState {
        &self.state
    }

    /// Snapshot to build against, if the sequence is known
    pub fn snapshot(&self) -> Option<AccountSnapshot> {
        match &*self.state {
            AccountState::Known { sequence, chain_id } => Some(AccountSnapshot {
                address: self.address,
                sequence: *sequence,
                chain_id: chain_id.clone(),
            }),
            AccountState::Unknown => None,
        }
    }

    pub fn set_known(&mut self, sequence: u64, chain_id: impl Into<String>) {
        *self.state = AccountState::Known {
            sequence,
            chain_id: chain_id.into(),
        };
    }

    /// Optimistic advance after a broadcast the node accepted
    pub fn advance(&mut self) {
        if let AccountState::Known { sequence, .. } = &mut *self.state {
            *sequence += 1;
            debug!(address = %self.address, next = *sequence, "Advanced sequence");
        }
    }

    pub fn invalidate(&mut self) {
        debug!(address = %self.address, "Invalidated sequence");
        *self.state = AccountState::Unknown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr(byte: u8) -> Addr {
        Addr::from_array([byte; 32])
    }

    #[tokio::test]
    async fn test_advances_from_known() {
        let tracker = SequenceTracker::new();
        let a = addr(1);

        {
            let mut guard = tracker.lock(&a).await;
            assert_eq!(guard.snapshot(), None);
            // advancing an unknown account is a no-op
            guard.advance();
            assert_eq!(*guard.state(), AccountState::Unknown);
            guard.set_known(5, "dev-1");
        }

        for _ in 0..3 {
            tracker.lock(&a).await.advance();
        }
        assert_eq!(
            tracker.state(&a).await,
            AccountState::Known {
                sequence: 8,
                chain_id: "dev-1".to_string()
            }
        );

        tracker.invalidate(&a).await;
        assert_eq!(tracker.state(&a).await, AccountState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_account_serializes() {
        let tracker = Arc::new(SequenceTracker::new());
        let a = addr(1);
        let guard = tracker.lock(&a).await;

        let t = tracker.clone();
        let waiter = tokio::spawn(async move { t.lock(&a).await.address().to_owned() });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_distinct_accounts_do_not_block() {
        let tracker = SequenceTracker::new();
        let _held = tracker.lock(&addr(1)).await;
        let other = tokio::time::timeout(Duration::from_secs(1), tracker.lock(&addr(2))).await;
        assert!(other.is_ok());
    }
}
