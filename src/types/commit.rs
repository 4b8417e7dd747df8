use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::Result;

/// commit metadata object: the root pointer of a snapshot
///
/// `timestamp` is UTC seconds; cbor writes integers big-endian so the
/// canonical bytes carry it in network order. `parent` is absent for
/// an initial commit. `metadata` uses a BTreeMap so the encoding does
/// not depend on insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub metadata: BTreeMap<String, String>,
    pub parent: Option<Hash>,
    pub related: Vec<(String, Hash)>,
    pub subject: String,
    pub body: String,
    pub timestamp: u64,
    pub root_contents: Hash,
    pub root_meta: Hash,
}

impl Commit {
    /// assemble a commit with an explicit timestamp
    pub fn new(
        parent: Option<Hash>,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: u64,
        root_contents: Hash,
        root_meta: Hash,
    ) -> Self {
        Self {
            metadata: BTreeMap::new(),
            parent,
            related: Vec::new(),
            subject: subject.into(),
            body: body.into(),
            timestamp,
            root_contents,
            root_meta,
        }
    }

    /// is this an initial commit (no parent)
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn test_commit_new() {
        let c = Commit::new(None, "init", "", 1234567890, h(1), h(2));
        assert!(c.is_root());
        assert!(c.metadata.is_empty());
        assert!(c.related.is_empty());
        assert_eq!(c.subject, "init");
        assert_eq!(c.body, "");
        assert_eq!(c.root_contents, h(1));
        assert_eq!(c.root_meta, h(2));
    }

    #[test]
    fn test_commit_with_parent() {
        let c = Commit::new(Some(h(9)), "second", "details", 1, h(1), h(2));
        assert!(!c.is_root());
        assert_eq!(c.parent, Some(h(9)));
    }

    #[test]
    fn test_commit_roundtrip() {
        let c = Commit::new(Some(h(3)), "subject", "body", 1700000000, h(1), h(2));
        let parsed = Commit::decode(&c.encode().unwrap()).unwrap();
        assert_eq!(c, parsed);
    }

    #[test]
    fn test_commit_encoding_deterministic() {
        let mut c1 = Commit::new(None, "s", "", 42, h(1), h(2));
        c1.metadata.insert("z".into(), "1".into());
        c1.metadata.insert("a".into(), "2".into());

        let mut c2 = Commit::new(None, "s", "", 42, h(1), h(2));
        c2.metadata.insert("a".into(), "2".into());
        c2.metadata.insert("z".into(), "1".into());

        assert_eq!(c1.encode().unwrap(), c2.encode().unwrap());
    }

    #[test]
    fn test_timestamp_changes_encoding() {
        let c1 = Commit::new(None, "s", "", 1, h(1), h(2));
        let c2 = Commit::new(None, "s", "", 2, h(1), h(2));
        assert_ne!(c1.encode().unwrap(), c2.encode().unwrap());
    }
}
