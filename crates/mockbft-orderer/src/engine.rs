use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        Mutex,
        RwLock,
    },
};

use jiff::Timestamp;
use mockbft_core::{
    Block,
    Transaction,
    TxHash,
    ValidatorSet,
};
use tokio::sync::watch;
use tracing::instrument;

use crate::{
    app::{
        AppHash,
        Application,
        CheckTxError,
        TxResult,
    },
    consensus::{
        ConsensusError,
        ConsensusState,
        ProposerSelector,
    },
};

/// What a committed block did to the application, retained so the RPC
/// surface can answer `BlockResults`, `ABCIInfo`, and `BroadcastTxCommit`
/// without re-running transactions.
///
/// Records are indexed by the height the chain advanced to when the block was
/// applied (the post-commit height), matching the engine this kernel mocks.
#[derive(Clone, Debug)]
pub struct BlockExecution {
    pub tx_hashes: Vec<TxHash>,
    pub tx_results: Vec<TxResult>,
    pub app_hash: AppHash,
}

#[derive(Debug, thiserror::Error)]
pub enum BlockProductionError {
    #[error("application rejected the proposal")]
    ProposalRejected,
    #[error("consensus round failed")]
    Consensus(#[from] ConsensusError),
}

/// The assembled kernel: application, consensus state, and the execution
/// records that bridge the two for the RPC surface.
///
/// `produce_block` is the single entry point for block production and is
/// serialized by an interior lock, so a host driving the engine by hand can
/// never interleave two rounds with the background driver. Lock order is
/// engine, then application, then consensus.
pub struct Engine {
    app: Arc<dyn Application>,
    consensus: ConsensusState,
    executions: RwLock<BTreeMap<i64, BlockExecution>>,
    committed_height: watch::Sender<i64>,
    production_lock: Mutex<()>,
    chain_id: String,
    genesis_time: Timestamp,
}

impl Engine {
    #[must_use]
    pub fn new(
        app: Arc<dyn Application>,
        validators: ValidatorSet,
        selector: Box<dyn ProposerSelector>,
        chain_id: impl Into<String>,
    ) -> Self {
        let (committed_height, _) = watch::channel(0);
        Self {
            app,
            consensus: ConsensusState::new(validators, selector),
            executions: RwLock::new(BTreeMap::new()),
            committed_height,
            production_lock: Mutex::new(()),
            chain_id: chain_id.into(),
            genesis_time: Timestamp::now(),
        }
    }

    /// Runs one block production attempt: prepare, validate, one consensus
    /// round, finalize, commit.
    ///
    /// Returns `Ok(None)` when the mempool is empty; the round is skipped and
    /// the app hash stays stable across idle ticks.
    ///
    /// # Errors
    ///
    /// A rejected proposal or a failed consensus round aborts the attempt;
    /// the mempool is untouched, so the transactions survive to the next
    /// tick.
    #[instrument(skip_all, fields(chain_id = %self.chain_id))]
    pub fn produce_block(&self) -> Result<Option<Block>, BlockProductionError> {
        let _production = self
            .production_lock
            .lock()
            .expect("production lock poisoned");

        let txs = self.app.prepare_proposal();
        if txs.is_empty() {
            return Ok(None);
        }
        if !self.app.process_proposal(&txs) {
            return Err(BlockProductionError::ProposalRejected);
        }

        let block = self.consensus.run_round(txs.clone())?;
        let tx_results = self.app.finalize_block(&txs);
        let app_hash = self.app.commit();

        let as_of_height = self.consensus.current_height();
        {
            let mut executions = self.executions.write().expect("executions lock poisoned");
            executions.insert(
                as_of_height,
                BlockExecution {
                    tx_hashes: block.txs().iter().map(Transaction::hash).collect(),
                    tx_results,
                    app_hash,
                },
            );
        }
        // Subscribers observe the height only after its record is readable.
        self.committed_height.send_replace(as_of_height);
        Ok(Some(block))
    }

    /// Validates and admits a transaction through the application.
    pub fn check_tx(&self, tx: &Transaction) -> Result<(), CheckTxError> {
        self.app.check_tx(tx)
    }

    /// Dry-run validation; never admits.
    pub fn simulate_tx(&self, tx: &Transaction) -> Result<(), CheckTxError> {
        self.app.simulate_tx(tx)
    }

    pub fn query(&self, key: &[u8]) -> Option<bytes::Bytes> {
        self.app.query(key)
    }

    /// The height the chain is currently working at. One past the latest
    /// committed block.
    pub fn current_height(&self) -> i64 {
        self.consensus.current_height()
    }

    pub fn latest_committed_block(&self) -> Option<Block> {
        self.consensus.latest_committed_block()
    }

    pub fn committed_block(&self, height: i64) -> Option<Block> {
        self.consensus.committed_block(height)
    }

    pub fn latest_app_hash(&self) -> AppHash {
        let executions = self.executions.read().expect("executions lock poisoned");
        executions
            .values()
            .next_back()
            .map(|execution| execution.app_hash.clone())
            .unwrap_or_default()
    }

    /// The execution record stored when the chain advanced to `height`.
    pub fn execution(&self, height: i64) -> Option<BlockExecution> {
        let executions = self.executions.read().expect("executions lock poisoned");
        executions.get(&height).cloned()
    }

    /// The app hash produced by the block committed at block height
    /// `block_height` (its record lives one height later).
    pub fn app_hash_of_block(&self, block_height: i64) -> Option<AppHash> {
        self.execution(block_height + 1)
            .map(|execution| execution.app_hash)
    }

    pub fn validator_set(&self) -> &ValidatorSet {
        self.consensus.validator_set()
    }

    pub fn consensus(&self) -> &ConsensusState {
        &self.consensus
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn genesis_time(&self) -> Timestamp {
        self.genesis_time
    }

    /// Receiver of post-commit heights, updated after each block's execution
    /// record is readable.
    pub fn subscribe_commits(&self) -> watch::Receiver<i64> {
        self.committed_height.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use mockbft_core::Validator;

    use super::*;
    use crate::{
        app::KvApplication,
        consensus::RoundRobin,
    };

    fn engine() -> Engine {
        let validators = ValidatorSet::new(
            (0..4)
                .map(|i| Validator::new(format!("val-{i}"), format!("ADDR{i}"), 1))
                .collect(),
        )
        .unwrap();
        Engine::new(
            Arc::new(KvApplication::new()),
            validators,
            Box::new(RoundRobin),
            "test-chain",
        )
    }

    #[test]
    fn empty_mempool_skips_the_round() {
        let engine = engine();
        let before = engine.latest_app_hash();
        assert!(engine.produce_block().unwrap().is_none());
        assert_eq!(engine.current_height(), 1);
        assert_eq!(engine.latest_app_hash(), before);
    }

    #[test]
    fn a_round_commits_and_records_the_execution() {
        let engine = engine();
        engine.check_tx(&Transaction::from("a=1")).unwrap();
        let block = engine.produce_block().unwrap().unwrap();

        assert_eq!(block.height(), 1);
        assert_eq!(engine.current_height(), 2);
        // the record is indexed by the post-commit height
        let execution = engine.execution(2).unwrap();
        assert_eq!(execution.tx_results.len(), 1);
        assert_eq!(execution.tx_results[0].code, 0);
        assert_eq!(execution.tx_hashes[0], Transaction::from("a=1").hash());
        assert!(engine.execution(1).is_none());
        assert_eq!(engine.latest_app_hash(), execution.app_hash);

        // the mempool drained, so the next tick skips
        assert!(engine.produce_block().unwrap().is_none());
        assert_eq!(engine.current_height(), 2);
    }

    #[test]
    fn commit_signal_fires_after_the_record_is_readable() {
        let engine = engine();
        let mut commits = engine.subscribe_commits();
        assert_eq!(*commits.borrow_and_update(), 0);

        engine.check_tx(&Transaction::from("a=1")).unwrap();
        engine.produce_block().unwrap().unwrap();

        assert!(commits.has_changed().unwrap());
        let height = *commits.borrow_and_update();
        assert_eq!(height, 2);
        assert!(engine.execution(height).is_some());
    }

    #[test]
    fn failed_deliveries_still_commit() {
        let engine = engine();
        engine.check_tx(&Transaction::from("zz:oops")).unwrap();
        let block = engine.produce_block().unwrap().unwrap();
        assert_eq!(block.txs().len(), 1);
        let execution = engine.execution(2).unwrap();
        assert_eq!(execution.tx_results[0].code, 1);
        assert!(execution.tx_results[0].log.is_empty());
    }

    #[test]
    fn app_hash_is_looked_up_by_block_height() {
        let engine = engine();
        engine.check_tx(&Transaction::from("a=1")).unwrap();
        engine.produce_block().unwrap().unwrap();
        let by_block = engine.app_hash_of_block(1).unwrap();
        assert_eq!(by_block, engine.latest_app_hash());
        assert!(engine.app_hash_of_block(2).is_none());
    }
}
