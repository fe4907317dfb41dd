//! Pending transactions awaiting inclusion.
//!
//! The pool does no cryptographic checks; callers verify before adding.

use crate::core::transaction::Transaction;
use crate::types::hash::Hash;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Default pre-allocation for the pool map.
pub const TXPOOL_CAPACITY: usize = 1024;

/// Transactions keyed by content hash.
#[derive(Default)]
pub struct TxPool {
    transactions: RwLock<HashMap<Hash, Transaction>>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::with_capacity(TXPOOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transactions: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Inserts `tx` unless its hash is already pooled. Returns whether it was inserted.
    pub fn add(&self, tx: Transaction) -> bool {
        let mut transactions = self.transactions.write().unwrap_or_else(PoisonError::into_inner);
        let hash = tx.hash();
        if transactions.contains_key(&hash) {
            return false;
        }
        transactions.insert(hash, tx);
        true
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.transactions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot ordered by ascending first-seen. Ties have no defined order.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut snapshot: Vec<Transaction> = self
            .transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        snapshot.sort_unstable_by_key(Transaction::first_seen);
        snapshot
    }

    /// Drops every pooled transaction.
    pub fn flush(&self) {
        self.transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::random_tx;

    #[test]
    fn new_pool_is_empty() {
        let pool = TxPool::new();
        assert_eq!(pool.len(), 0);
        assert!(pool.is_empty());
        assert!(pool.transactions().is_empty());
    }

    #[test]
    fn add_ignores_duplicates() {
        let pool = TxPool::new();
        let tx = random_tx();

        assert!(pool.add(tx.clone()));
        assert!(!pool.add(tx.clone()));
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&tx.hash()));
    }

    #[test]
    fn same_payload_different_signer_is_a_duplicate() {
        let pool = TxPool::new();
        let mut a = Transaction::new(b"same payload");
        a.sign(&crate::crypto::key_pair::PrivateKey::new()).unwrap();
        let mut b = Transaction::new(b"same payload");
        b.sign(&crate::crypto::key_pair::PrivateKey::new()).unwrap();

        pool.add(a);
        pool.add(b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn transactions_sorted_by_first_seen() {
        let pool = TxPool::with_capacity(1000);
        let mut expected = Vec::with_capacity(1000);

        for i in 0..1000 {
            let mut tx = Transaction::new(format!("tx-{i}"));
            tx.set_first_seen(1_000 + i as i64);
            expected.push(tx.hash());
            pool.add(tx);
        }

        assert_eq!(pool.len(), 1000);
        let ordered: Vec<Hash> = pool.transactions().iter().map(Transaction::hash).collect();
        assert_eq!(ordered, expected);
    }

    #[test]
    fn snapshot_is_detached_from_pool() {
        let pool = TxPool::new();
        pool.add(random_tx());

        let mut snapshot = pool.transactions();
        snapshot.clear();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn flush_clears_everything() {
        let pool = TxPool::new();
        let txs: Vec<Transaction> = (0..10).map(|_| random_tx()).collect();
        for tx in &txs {
            pool.add(tx.clone());
        }

        pool.flush();
        assert_eq!(pool.len(), 0);
        for tx in &txs {
            assert!(!pool.contains(&tx.hash()));
        }
    }
}
