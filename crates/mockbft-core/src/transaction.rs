use std::fmt;

use bytes::Bytes;
use sha2::{
    Digest as _,
    Sha256,
};

/// An opaque transaction payload.
///
/// The orderer never interprets the bytes; they are routed to a host-provided
/// processor at delivery time. Cloning is cheap (the payload is reference
/// counted).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Transaction(Bytes);

impl Transaction {
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The transaction's identity, used for mempool deduplication and for
    /// reporting the tx on the RPC surface.
    #[must_use]
    pub fn hash(&self) -> TxHash {
        TxHash(Sha256::digest(&self.0).into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Vec<u8>> for Transaction {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for Transaction {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<&str> for Transaction {
    fn from(payload: &str) -> Self {
        Self(Bytes::copy_from_slice(payload.as_bytes()))
    }
}

/// Sha256 digest of a transaction's bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_a_pure_function_of_the_bytes() {
        let a = Transaction::from("a=1");
        let b = Transaction::from("a=1");
        let c = Transaction::from("a=2");
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn hash_displays_as_uppercase_hex() {
        let rendered = Transaction::from("a=1").hash().to_string();
        assert_eq!(rendered.len(), 64);
        assert!(rendered
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
