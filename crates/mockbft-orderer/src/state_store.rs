use std::collections::BTreeMap;

use bytes::Bytes;
use sha2::{
    Digest as _,
    Sha256,
};

/// In-memory keyed byte store backing the default application.
///
/// The map is ordered by key, so the commit hash visits entries in
/// lexicographic key order and is reproducible across runs regardless of
/// insertion order. `commit` is pure: it does not mutate or reset the map.
///
/// The store has no interior locking; the owning application serializes all
/// access under its own mutex.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: BTreeMap<Vec<u8>, Bytes>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Bytes>) {
        self.entries.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sha256 over every `(key, value)` pair in lexicographic key order.
    #[must_use]
    pub fn commit(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (key, value) in &self.entries {
            hasher.update(key);
            hasher.update(value);
        }
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_is_independent_of_insertion_order() {
        let mut forward = StateStore::new();
        forward.set("x", "1");
        forward.set("y", "2");

        let mut reversed = StateStore::new();
        reversed.set("y", "2");
        reversed.set("x", "1");

        assert_eq!(forward.commit(), reversed.commit());
    }

    #[test]
    fn commit_does_not_reset_the_map() {
        let mut store = StateStore::new();
        store.set("a", "1");
        let first = store.commit();
        let second = store.commit();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn commit_reflects_content_changes() {
        let mut store = StateStore::new();
        store.set("a", "1");
        let before = store.commit();
        store.set("a", "2");
        assert_ne!(before, store.commit());
    }

    #[test]
    fn get_returns_the_latest_value() {
        let mut store = StateStore::new();
        assert!(store.get(b"a").is_none());
        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get(b"a").map(|v| v.as_ref()), Some(&b"2"[..]));
    }
}
