use std::fmt;

use jiff::Timestamp;
use sha2::{
    Digest as _,
    Sha256,
};

use crate::{
    transaction::Transaction,
    validator::ValidatorId,
};

/// Sha256 digest identifying a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// A block produced by one consensus round.
///
/// The hash is computed at construction and is a pure function of
/// `(height, time, prev_hash, proposer, txs)`; recomputing with the same
/// inputs yields the same value. A block at height 1 has no parent and
/// carries `prev_hash = None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    height: i64,
    prev_hash: Option<BlockHash>,
    time: Timestamp,
    proposer: ValidatorId,
    txs: Vec<Transaction>,
    hash: BlockHash,
}

impl Block {
    #[must_use]
    pub fn new(
        height: i64,
        prev_hash: Option<BlockHash>,
        time: Timestamp,
        proposer: ValidatorId,
        txs: Vec<Transaction>,
    ) -> Self {
        let hash = compute_hash(height, time, prev_hash.as_ref(), &proposer, &txs);
        Self {
            height,
            prev_hash,
            time,
            proposer,
            txs,
            hash,
        }
    }

    #[must_use]
    pub fn height(&self) -> i64 {
        self.height
    }

    #[must_use]
    pub fn prev_hash(&self) -> Option<BlockHash> {
        self.prev_hash
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    #[must_use]
    pub fn proposer(&self) -> &ValidatorId {
        &self.proposer
    }

    #[must_use]
    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    #[must_use]
    pub fn hash(&self) -> BlockHash {
        self.hash
    }
}

fn compute_hash(
    height: i64,
    time: Timestamp,
    prev_hash: Option<&BlockHash>,
    proposer: &ValidatorId,
    txs: &[Transaction],
) -> BlockHash {
    let mut hasher = Sha256::new();
    hasher.update(height.to_be_bytes());
    hasher.update(time.as_nanosecond().to_be_bytes());
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(proposer.as_str().as_bytes());
    for tx in txs {
        hasher.update(tx.as_bytes());
    }
    BlockHash(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txs() -> Vec<Transaction> {
        vec![Transaction::from("a=1"), Transaction::from("b=2")]
    }

    #[test]
    fn hash_is_reproducible_from_the_same_inputs() {
        let time = Timestamp::UNIX_EPOCH;
        let first = Block::new(1, None, time, "val-0".into(), txs());
        let second = Block::new(1, None, time, "val-0".into(), txs());
        assert_eq!(first.hash(), second.hash());
    }

    #[test]
    fn hash_covers_every_field() {
        let time = Timestamp::UNIX_EPOCH;
        let base = Block::new(1, None, time, "val-0".into(), txs());
        let parent = base.hash();

        let other_height = Block::new(2, None, time, "val-0".into(), txs());
        let other_time = Block::new(
            1,
            None,
            Timestamp::new(1, 0).unwrap(),
            "val-0".into(),
            txs(),
        );
        let other_parent = Block::new(2, Some(parent), time, "val-0".into(), txs());
        let other_proposer = Block::new(1, None, time, "val-1".into(), txs());
        let other_txs = Block::new(1, None, time, "val-0".into(), vec![]);

        for other in [
            other_height,
            other_time,
            other_parent,
            other_proposer,
            other_txs,
        ] {
            assert_ne!(base.hash(), other.hash());
        }
    }

    #[test]
    fn tx_order_changes_the_hash() {
        let time = Timestamp::UNIX_EPOCH;
        let forward = Block::new(1, None, time, "val-0".into(), txs());
        let reversed = Block::new(
            1,
            None,
            time,
            "val-0".into(),
            txs().into_iter().rev().collect(),
        );
        assert_ne!(forward.hash(), reversed.hash());
    }
}
