use std::collections::HashSet;

use mockbft_core::{
    Transaction,
    TxHash,
};

#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction {hash} is already in the mempool")]
    AlreadyPending { hash: TxHash },
}

/// Ordered holding area for admitted but not-yet-committed transactions.
///
/// Insertion order is preserved exactly; it becomes the delivery order of the
/// next block. A transaction is identified by the hash of its bytes, and a
/// second admission of the same bytes while the first is still pending is
/// rejected. The pool is drained wholesale on commit.
#[derive(Debug, Default)]
pub struct Mempool {
    txs: Vec<Transaction>,
    pending: HashSet<TxHash>,
}

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `tx`, rejecting bytes that are already pending.
    pub fn push(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        let hash = tx.hash();
        if !self.pending.insert(hash) {
            return Err(MempoolError::AlreadyPending { hash });
        }
        self.txs.push(tx);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, hash: &TxHash) -> bool {
        self.pending.contains(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// All pending transactions in admission order. The pool keeps them; only
    /// `clear` removes entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.txs.clone()
    }

    pub fn clear(&mut self) {
        self.txs.clear();
        self.pending.clear();
    }
}
