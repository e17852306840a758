//! The ABCI++-shaped application contract and the default key/value
//! application.
//!
//! The kernel drives whatever implements [`Application`]; hosts plug in their
//! own state machines through this trait plus the processor registry. The
//! contract mirrors the application side of the consensus engine this orderer
//! replaces: admission (`check_tx`), proposal construction and validation,
//! ordered delivery, and a commit that publishes a deterministic app hash and
//! drains the mempool.

mod kv;

use std::fmt;

use bytes::Bytes;
use mockbft_core::Transaction;

pub use self::kv::KvApplication;

/// Digest of the application state as of the latest commit.
///
/// The default application produces sha256 digests; hosts may publish hashes
/// of any length. An empty hash denotes "nothing committed yet".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppHash(Bytes);

impl AppHash {
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AppHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

/// Outcome of delivering one transaction within a block.
///
/// A non-zero code marks a failed delivery; the block still commits and the
/// failed transaction contributes an empty log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    pub code: u32,
    pub log: String,
}

impl TxResult {
    #[must_use]
    pub fn ok(log: impl Into<String>) -> Self {
        Self {
            code: 0,
            log: log.into(),
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            code: 1,
            log: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckTxError {
    #[error("transaction is empty")]
    Empty,
    #[error("transaction is already in the mempool")]
    AlreadyPending,
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliverTxError {
    #[error("failed routing transaction to a processor")]
    Route(#[from] crate::processor::RouteError),
    #[error("processor failed")]
    Process(#[from] crate::processor::ProcessorError),
}

/// The application execution contract.
///
/// Implementations own one mutex and take it for the duration of every
/// operation, so a round is serialized against concurrent mempool admissions.
/// `finalize_block` MUST apply transactions in the exact order given;
/// `commit` publishes the app hash and drains the mempool, once per height.
pub trait Application: Send + Sync {
    /// Validates `tx` and, on success, admits it to the mempool.
    fn check_tx(&self, tx: &Transaction) -> Result<(), CheckTxError>;

    /// All pending transactions in admission order. Does not drain.
    fn prepare_proposal(&self) -> Vec<Transaction>;

    /// Validates a proposed ordering. A `false` return aborts the round.
    fn process_proposal(&self, txs: &[Transaction]) -> bool;

    /// Applies a single transaction, returning its log line.
    fn deliver_tx(&self, tx: &Transaction) -> Result<String, DeliverTxError>;

    /// Applies `txs` in order, capturing one result per transaction.
    fn finalize_block(&self, txs: &[Transaction]) -> Vec<TxResult>;

    /// Publishes the post-block app hash and drains the mempool.
    fn commit(&self) -> AppHash;

    /// Validates `tx` without admitting it. Backs the dry-run RPC; the
    /// default accepts everything.
    fn simulate_tx(&self, tx: &Transaction) -> Result<(), CheckTxError> {
        let _ = tx;
        Ok(())
    }

    /// Reads a value from the application state, if the application exposes
    /// key/value reads.
    fn query(&self, key: &[u8]) -> Option<Bytes> {
        let _ = key;
        None
    }
}
