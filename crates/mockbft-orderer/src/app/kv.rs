use std::sync::Mutex;

use bytes::Bytes;
use mockbft_core::Transaction;
use tracing::debug;

use super::{
    AppHash,
    Application,
    CheckTxError,
    DeliverTxError,
    TxResult,
};
use crate::{
    mempool::{
        Mempool,
        MempoolError,
    },
    processor::{
        KvProcessor,
        ProcessorRegistry,
    },
    state_store::StateStore,
};

/// The default key/value application.
///
/// Transactions are `key=value` payloads (optionally tagged `kv:`); delivery
/// routes them through the processor registry into the state store. Hosts
/// that need richer transaction kinds construct the application with their
/// own registry.
pub struct KvApplication {
    inner: Mutex<Inner>,
}

struct Inner {
    mempool: Mempool,
    store: StateStore,
    registry: ProcessorRegistry,
}

impl KvApplication {
    /// A registry with the key/value processor installed under the `kv` tag
    /// and as the untagged fallback.
    #[must_use]
    pub fn default_registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        registry.register("kv", Box::new(KvProcessor));
        registry.set_fallback(Box::new(KvProcessor));
        registry
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(Self::default_registry())
    }

    #[must_use]
    pub fn with_registry(registry: ProcessorRegistry) -> Self {
        Self {
            inner: Mutex::new(Inner {
                mempool: Mempool::new(),
                store: StateStore::new(),
                registry,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("application lock poisoned")
    }

    fn validate(tx: &Transaction) -> Result<(), CheckTxError> {
        if tx.is_empty() {
            return Err(CheckTxError::Empty);
        }
        Ok(())
    }
}

impl Default for KvApplication {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for KvApplication {
    fn check_tx(&self, tx: &Transaction) -> Result<(), CheckTxError> {
        Self::validate(tx)?;
        let mut inner = self.lock();
        inner.mempool.push(tx.clone()).map_err(|err| match err {
            MempoolError::AlreadyPending { .. } => CheckTxError::AlreadyPending,
        })
    }

    fn prepare_proposal(&self) -> Vec<Transaction> {
        self.lock().mempool.snapshot()
    }

    fn process_proposal(&self, txs: &[Transaction]) -> bool {
        !txs.is_empty()
    }

    fn deliver_tx(&self, tx: &Transaction) -> Result<String, DeliverTxError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let processor = inner.registry.route(tx)?;
        Ok(processor.process(&mut inner.store, tx)?)
    }

    fn finalize_block(&self, txs: &[Transaction]) -> Vec<TxResult> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        txs.iter()
            .map(|tx| match inner.registry.route(tx) {
                Ok(processor) => match processor.process(&mut inner.store, tx) {
                    Ok(log) => TxResult::ok(log),
                    Err(error) => {
                        debug!(tx = %tx.hash(), %error, "transaction failed during delivery");
                        TxResult::failed()
                    }
                },
                Err(error) => {
                    debug!(tx = %tx.hash(), %error, "no processor for transaction");
                    TxResult::failed()
                }
            })
            .collect()
    }

    fn commit(&self) -> AppHash {
        let mut inner = self.lock();
        let hash = inner.store.commit();
        inner.mempool.clear();
        AppHash::new(hash.to_vec())
    }

    fn simulate_tx(&self, tx: &Transaction) -> Result<(), CheckTxError> {
        Self::validate(tx)
    }

    fn query(&self, key: &[u8]) -> Option<Bytes> {
        self.lock().store.get(key).cloned()
    }
}
