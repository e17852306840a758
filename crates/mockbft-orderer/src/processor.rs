use std::collections::HashMap;

use mockbft_core::Transaction;

use crate::state_store::StateStore;

/// Error produced while applying a transaction to the state store.
///
/// Delivery failures are non-fatal: they surface as a per-tx result code and
/// the enclosing block still commits.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProcessorError {
    message: String,
}

impl ProcessorError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Interprets one kind of transaction payload.
///
/// Processors are host-provided; the kernel routes transaction bytes to them
/// by tag without interpreting the payload itself.
pub trait Processor: Send + Sync {
    /// Applies `tx` to `store`, returning a human-readable log line.
    fn process(&self, store: &mut StateStore, tx: &Transaction) -> Result<String, ProcessorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no processor registered for transaction tag `{tag}`")]
    UnknownTag { tag: String },
    #[error("transaction has no tag and no fallback processor is installed")]
    MissingTag,
}

/// Routes transaction bytes to the processor registered for their tag.
///
/// The tag is the UTF-8 prefix before the first `:` byte. Untagged
/// transactions go to the fallback processor when one is installed.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Box<dyn Processor>>,
    fallback: Option<Box<dyn Processor>>,
}

impl ProcessorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: impl Into<String>, processor: Box<dyn Processor>) {
        self.processors.insert(tag.into(), processor);
    }

    pub fn set_fallback(&mut self, processor: Box<dyn Processor>) {
        self.fallback = Some(processor);
    }

    /// Resolves the processor responsible for `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is unknown, or if the transaction carries
    /// no tag and no fallback is installed.
    pub fn route(&self, tx: &Transaction) -> Result<&dyn Processor, RouteError> {
        match tag_of(tx) {
            Some(tag) => match self.processors.get(tag) {
                Some(processor) => Ok(processor.as_ref()),
                None => Err(RouteError::UnknownTag {
                    tag: tag.to_string(),
                }),
            },
            None => self
                .fallback
                .as_deref()
                .ok_or(RouteError::MissingTag),
        }
    }
}

/// The transaction-kind tag: the bytes before the first `:`, when present
/// and valid UTF-8.
fn tag_of(tx: &Transaction) -> Option<&str> {
    let bytes = tx.as_bytes();
    let split = bytes.iter().position(|b| *b == b':')?;
    std::str::from_utf8(&bytes[..split]).ok()
}

/// Key/value processor used by the default application.
///
/// Payloads are `key=value` in UTF-8; a leading `kv:` tag is stripped when
/// routed by tag.
pub struct KvProcessor;

impl Processor for KvProcessor {
    fn process(&self, store: &mut StateStore, tx: &Transaction) -> Result<String, ProcessorError> {
        let bytes = tx.as_bytes();
        let payload = match bytes.iter().position(|b| *b == b':') {
            Some(split) => &bytes[split + 1..],
            None => bytes,
        };
        let payload = std::str::from_utf8(payload)
            .map_err(|_| ProcessorError::new("payload is not valid UTF-8"))?;
        let (key, value) = payload
            .split_once('=')
            .ok_or_else(|| ProcessorError::new("payload is missing a `=` delimiter"))?;
        if key.is_empty() {
            return Err(ProcessorError::new("payload key is empty"));
        }
        store.set(key.as_bytes().to_vec(), value.as_bytes().to_vec());
        Ok(format!("set {key}"))
    }
}
