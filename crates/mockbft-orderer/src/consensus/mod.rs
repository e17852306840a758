//! The per-height consensus state machine.
//!
//! One round is propose → prevote → precommit → commit. Every configured
//! validator is treated as honest: the round driver casts each validator's
//! prevote and precommit for the proposed block, and the precommit path
//! commits in place the moment the tally crosses two thirds. There is no
//! networking, no signatures, and no fork choice; the value of the machine is
//! that heights, parent hashes, vote tallies, and proposer rotation behave
//! exactly like the engine it mocks.

mod selector;

use std::sync::RwLock;

use jiff::Timestamp;
use mockbft_core::{
    Block,
    BlockHash,
    Transaction,
    Validator,
    ValidatorId,
    ValidatorSet,
    Vote,
    VoteError,
    VoteKind,
    VoteSet,
};
use tracing::debug;

pub use self::selector::{
    ProposerSelector,
    RoundRobin,
};

#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("validator set is empty; no proposer for height {height}")]
    NoProposer { height: i64 },
    #[error("validator `{id}` is not in the validator set")]
    UnknownValidator { id: ValidatorId },
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("prevote power {power} of {total} failed the liveness floor")]
    RoundNotLive { power: i64, total: i64 },
    #[error("prevote power {power} of {total} is below the two-thirds threshold")]
    InsufficientPrevotes { power: i64, total: i64 },
    #[error("precommit power never reached the two-thirds threshold")]
    CommitThresholdNotReached,
    #[error("block height {block} does not match the current height {current}")]
    HeightMismatch { block: i64, current: i64 },
    #[error("block parent hash does not match the latest committed block")]
    PrevHashMismatch,
}

/// Outcome of recording a precommit.
#[derive(Debug)]
pub enum PrecommitOutcome {
    /// Vote recorded; the tally has not crossed two thirds.
    Recorded,
    /// The validator already precommitted at this height; tally unchanged.
    Duplicate,
    /// This vote pushed the proposed block past two thirds and it was
    /// committed in place.
    Committed(Block),
}

struct RoundState {
    height: i64,
    proposer: Option<Validator>,
    proposed_block: Option<Block>,
    locked_block: Option<Block>,
    prevotes: VoteSet,
    precommits: VoteSet,
    committed: Vec<Block>,
}

/// Heights, votes, and block history for one chain instance.
///
/// Mutating operations take the interior write lock; inspectors take read.
/// Callers must not hold any lock of this type across calls (the engine
/// serializes whole rounds above this layer).
pub struct ConsensusState {
    validators: ValidatorSet,
    selector: Box<dyn ProposerSelector>,
    state: RwLock<RoundState>,
}

impl ConsensusState {
    #[must_use]
    pub fn new(validators: ValidatorSet, selector: Box<dyn ProposerSelector>) -> Self {
        let proposer = selector.select(1, &validators).cloned();
        Self {
            validators,
            selector,
            state: RwLock::new(RoundState {
                height: 1,
                proposer,
                proposed_block: None,
                locked_block: None,
                prevotes: VoteSet::new(VoteKind::Prevote, 1),
                precommits: VoteSet::new(VoteKind::Precommit, 1),
                committed: Vec::new(),
            }),
        }
    }

    /// Runs one full round over `txs`: propose, then cast every validator's
    /// prevote and precommit for the proposed hash. Commit triggers inside
    /// the precommit path once two thirds is reached.
    ///
    /// # Errors
    ///
    /// Any abort (no proposer, thresholds missed) resets the round at the
    /// current height and returns the reason; the height never advances on
    /// an aborted round.
    pub fn run_round(&self, txs: Vec<Transaction>) -> Result<Block, ConsensusError> {
        let block = self.propose_block(txs)?;
        let hash = block.hash();

        for validator in self.validators.iter() {
            self.prevote(validator.id(), Some(hash))?;
        }
        let prevote_power = self.prevote_power_for(&hash);
        if !self.validators.gte_one_tenth(prevote_power) {
            self.abort_round();
            return Err(ConsensusError::RoundNotLive {
                power: prevote_power,
                total: self.validators.total_power(),
            });
        }
        if !self.validators.gte_two_thirds(prevote_power) {
            self.abort_round();
            return Err(ConsensusError::InsufficientPrevotes {
                power: prevote_power,
                total: self.validators.total_power(),
            });
        }
        self.lock_proposed();

        for validator in self.validators.iter() {
            if let PrecommitOutcome::Committed(committed) =
                self.precommit(validator.id(), Some(hash))?
            {
                debug!(
                    height = committed.height(),
                    hash = %committed.hash(),
                    txs = committed.txs().len(),
                    "committed block"
                );
                return Ok(committed);
            }
        }
        self.abort_round();
        Err(ConsensusError::CommitThresholdNotReached)
    }

    /// Builds and records the proposal for the current height. The parent
    /// hash is the latest committed block's hash, or empty at height 1.
    pub fn propose_block(&self, txs: Vec<Transaction>) -> Result<Block, ConsensusError> {
        let mut state = self.write();
        let proposer = state
            .proposer
            .clone()
            .ok_or(ConsensusError::NoProposer {
                height: state.height,
            })?;
        let prev_hash = state.committed.last().map(Block::hash);
        let block = Block::new(
            state.height,
            prev_hash,
            Timestamp::now(),
            proposer.id().clone(),
            txs,
        );
        state.proposed_block = Some(block.clone());
        Ok(block)
    }

    /// Records `validator`'s prevote for `block_hash` (`None` is a nil vote).
    ///
    /// Returns `Ok(false)` when the validator already prevoted at this
    /// height; the duplicate is dropped without altering the tally.
    pub fn prevote(
        &self,
        validator: &ValidatorId,
        block_hash: Option<BlockHash>,
    ) -> Result<bool, ConsensusError> {
        let power = self.power_of(validator)?;
        let mut state = self.write();
        let vote = Vote::new(
            VoteKind::Prevote,
            state.height,
            validator.clone(),
            block_hash,
            Timestamp::now(),
        );
        Ok(state.prevotes.add(vote, power)?)
    }

    /// Records `validator`'s precommit and re-evaluates the tally. If the
    /// proposed block's hash crosses two thirds, the block commits in place
    /// under the write lock already held here; this path must not call back
    /// into [`Self::commit_block`].
    pub fn precommit(
        &self,
        validator: &ValidatorId,
        block_hash: Option<BlockHash>,
    ) -> Result<PrecommitOutcome, ConsensusError> {
        let power = self.power_of(validator)?;
        let mut state = self.write();
        let vote = Vote::new(
            VoteKind::Precommit,
            state.height,
            validator.clone(),
            block_hash,
            Timestamp::now(),
        );
        if !state.precommits.add(vote, power)? {
            return Ok(PrecommitOutcome::Duplicate);
        }

        // First hash to cross the threshold wins; the tally iterates in
        // insertion order, keeping the choice deterministic.
        let winning = state
            .precommits
            .tally()
            .find(|(_, power)| self.validators.gte_two_thirds(*power))
            .map(|(hash, _)| *hash);
        if let Some(winning) = winning {
            let proposed_matches = state
                .proposed_block
                .as_ref()
                .is_some_and(|block| block.hash() == winning);
            if proposed_matches {
                let committed = self.advance_height(&mut state);
                return Ok(PrecommitOutcome::Committed(committed));
            }
        }
        Ok(PrecommitOutcome::Recorded)
    }

    /// Out-of-band commit entry point, reserved for hosts that drive the
    /// machine without `run_round`. Must not be called for a block that a
    /// precommit already committed in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the block's height or parent hash do not line up
    /// with the current state.
    pub fn commit_block(&self, block: Block) -> Result<(), ConsensusError> {
        let mut state = self.write();
        if block.height() != state.height {
            return Err(ConsensusError::HeightMismatch {
                block: block.height(),
                current: state.height,
            });
        }
        if block.prev_hash() != state.committed.last().map(Block::hash) {
            return Err(ConsensusError::PrevHashMismatch);
        }
        state.proposed_block = Some(block);
        let _ = self.advance_height(&mut state);
        Ok(())
    }

    /// Appends the proposed block, advances the height, rebuilds the vote
    /// sets, and rotates the proposer. Callers hold the write lock.
    fn advance_height(&self, state: &mut RoundState) -> Block {
        let block = state
            .proposed_block
            .take()
            .expect("a proposed block exists on every commit path");
        state.committed.push(block.clone());
        state.height += 1;
        state.prevotes = VoteSet::new(VoteKind::Prevote, state.height);
        state.precommits = VoteSet::new(VoteKind::Precommit, state.height);
        state.locked_block = None;
        state.proposer = self.selector.select(state.height, &self.validators).cloned();
        block
    }

    /// Resets the round at the current height after an abort so the next
    /// tick can retry with fresh vote sets.
    fn abort_round(&self) {
        let mut state = self.write();
        let height = state.height;
        state.proposed_block = None;
        state.locked_block = None;
        state.prevotes = VoteSet::new(VoteKind::Prevote, height);
        state.precommits = VoteSet::new(VoteKind::Precommit, height);
    }

    fn lock_proposed(&self) {
        let mut state = self.write();
        state.locked_block = state.proposed_block.clone();
    }

    pub fn current_height(&self) -> i64 {
        self.read().height
    }

    pub fn current_proposer(&self) -> Option<Validator> {
        self.read().proposer.clone()
    }

    pub fn latest_committed_block(&self) -> Option<Block> {
        self.read().committed.last().cloned()
    }

    /// The committed block at `height` (blocks are committed at heights
    /// `1..current_height`).
    pub fn committed_block(&self, height: i64) -> Option<Block> {
        let state = self.read();
        let index = usize::try_from(height.checked_sub(1)?).ok()?;
        state.committed.get(index).cloned()
    }

    pub fn committed_count(&self) -> usize {
        self.read().committed.len()
    }

    pub fn validator_set(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn prevote_power_for(&self, hash: &BlockHash) -> i64 {
        self.read().prevotes.power_for(hash)
    }

    pub fn precommit_power_for(&self, hash: &BlockHash) -> i64 {
        self.read().precommits.power_for(hash)
    }

    pub fn proposed_block(&self) -> Option<Block> {
        self.read().proposed_block.clone()
    }

    pub fn locked_block(&self) -> Option<Block> {
        self.read().locked_block.clone()
    }

    fn power_of(&self, validator: &ValidatorId) -> Result<i64, ConsensusError> {
        self.validators
            .power_of(validator)
            .ok_or_else(|| ConsensusError::UnknownValidator {
                id: validator.clone(),
            })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RoundState> {
        self.state.read().expect("consensus lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RoundState> {
        self.state.write().expect("consensus lock poisoned")
    }
}
