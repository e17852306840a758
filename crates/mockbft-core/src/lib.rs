//! Core data model for the mockbft orderer.
//!
//! This crate holds the pure, I/O-free types shared by the orderer kernel:
//! opaque transactions, blocks, validators and their voting-power thresholds,
//! and votes with their per-height tally sets. All hashing is sha256; hashes
//! display as uppercase hex.
//!
//! Nothing in this crate locks, spawns, or performs I/O. Concurrency and the
//! consensus state machine built on top of these types live in
//! `mockbft-orderer`.

pub mod block;
pub mod transaction;
pub mod validator;
pub mod vote;

pub use block::{
    Block,
    BlockHash,
};
pub use transaction::{
    Transaction,
    TxHash,
};
pub use validator::{
    Validator,
    ValidatorId,
    ValidatorSet,
    ValidatorSetError,
};
pub use vote::{
    Vote,
    VoteError,
    VoteKind,
    VoteSet,
};
