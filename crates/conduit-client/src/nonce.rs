//! Per-account send serialization

use std::collections::HashMap;
use std::sync::Arc;

use conduit_primitives::Address;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// Next nonce to use for an account, `None` until read from the node
pub(crate) type NonceSlot = Arc<AsyncMutex<Option<u64>>>;

/// One async lock per sending account
///
/// A sender holds its account's slot from the nonce lookup until the node
/// has accepted the transaction, so two sends from one account never share
/// a nonce. Different accounts never contend.
#[derive(Default)]
pub(crate) struct NonceManager {
    slots: Mutex<HashMap<Address, NonceSlot>>,
}

impl NonceManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lock slot for `address`, created on first use
    pub(crate) fn slot(&self, address: &Address) -> NonceSlot {
        self.slots.lock().entry(*address).or_default().clone()
    }

    /// Number of accounts that have sent through this manager
    pub(crate) fn tracked(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_account_shares_slot() {
        let manager = NonceManager::new();
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);

        let first = manager.slot(&a);
        *first.lock().await = Some(5);

        assert_eq!(*manager.slot(&a).lock().await, Some(5));
        assert_eq!(*manager.slot(&b).lock().await, None);
        assert_eq!(manager.tracked(), 2);
    }

    #[tokio::test]
    async fn test_slot_is_exclusive() {
        let manager = NonceManager::new();
        let a = Address::from_bytes([1; 20]);

        let slot = manager.slot(&a);
        let _held = slot.lock().await;
        assert!(manager.slot(&a).try_lock().is_err());
    }
}
