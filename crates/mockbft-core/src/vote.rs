use std::fmt;

use indexmap::IndexMap;
use jiff::Timestamp;

use crate::{
    block::BlockHash,
    validator::ValidatorId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteKind {
    Prevote,
    Precommit,
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prevote => "prevote",
            Self::Precommit => "precommit",
        };
        f.write_str(name)
    }
}

/// A single validator's vote at one height. A `None` block hash is a nil
/// vote: it counts toward participation but not toward any block's tally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    kind: VoteKind,
    height: i64,
    validator: ValidatorId,
    block_hash: Option<BlockHash>,
    time: Timestamp,
}

impl Vote {
    #[must_use]
    pub fn new(
        kind: VoteKind,
        height: i64,
        validator: ValidatorId,
        block_hash: Option<BlockHash>,
        time: Timestamp,
    ) -> Self {
        Self {
            kind,
            height,
            validator,
            block_hash,
            time,
        }
    }

    #[must_use]
    pub fn kind(&self) -> VoteKind {
        self.kind
    }

    #[must_use]
    pub fn height(&self) -> i64 {
        self.height
    }

    #[must_use]
    pub fn validator(&self) -> &ValidatorId {
        &self.validator
    }

    #[must_use]
    pub fn block_hash(&self) -> Option<BlockHash> {
        self.block_hash
    }

    #[must_use]
    pub fn time(&self) -> Timestamp {
        self.time
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("vote height {got} does not match vote set height {expected}")]
    HeightMismatch { got: i64, expected: i64 },
    #[error("vote kind `{got}` does not match vote set kind `{expected}`")]
    KindMismatch { got: VoteKind, expected: VoteKind },
}

/// All votes of one kind at one height.
///
/// Holds at most one vote per validator; the first write wins. The tally map
/// is insertion ordered so that threshold evaluation visits block hashes in a
/// deterministic order.
#[derive(Debug)]
pub struct VoteSet {
    kind: VoteKind,
    height: i64,
    votes: IndexMap<ValidatorId, Vote>,
    power_for: IndexMap<BlockHash, i64>,
}

impl VoteSet {
    #[must_use]
    pub fn new(kind: VoteKind, height: i64) -> Self {
        Self {
            kind,
            height,
            votes: IndexMap::new(),
            power_for: IndexMap::new(),
        }
    }

    /// Records a vote carrying `power`.
    ///
    /// Returns `Ok(true)` if the vote was recorded and `Ok(false)` if this
    /// validator already voted here; the duplicate is dropped without
    /// altering the tally.
    ///
    /// # Errors
    ///
    /// Returns an error if the vote's height or kind disagree with this set.
    pub fn add(&mut self, vote: Vote, power: i64) -> Result<bool, VoteError> {
        if vote.kind != self.kind {
            return Err(VoteError::KindMismatch {
                got: vote.kind,
                expected: self.kind,
            });
        }
        if vote.height != self.height {
            return Err(VoteError::HeightMismatch {
                got: vote.height,
                expected: self.height,
            });
        }
        if self.votes.contains_key(&vote.validator) {
            return Ok(false);
        }
        if let Some(hash) = vote.block_hash {
            *self.power_for.entry(hash).or_insert(0) += power;
        }
        self.votes.insert(vote.validator.clone(), vote);
        Ok(true)
    }

    #[must_use]
    pub fn kind(&self) -> VoteKind {
        self.kind
    }

    #[must_use]
    pub fn height(&self) -> i64 {
        self.height
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    #[must_use]
    pub fn has_voted(&self, validator: &ValidatorId) -> bool {
        self.votes.contains_key(validator)
    }

    /// Voting power recorded for the given block hash.
    #[must_use]
    pub fn power_for(&self, hash: &BlockHash) -> i64 {
        self.power_for.get(hash).copied().unwrap_or(0)
    }

    /// Tally entries in insertion order.
    pub fn tally(&self) -> impl Iterator<Item = (&BlockHash, i64)> {
        self.power_for.iter().map(|(hash, power)| (hash, *power))
    }
}
