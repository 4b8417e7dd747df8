//! in-memory staging tree
//!
//! a mutable tree accumulates a directory's file checksums and child
//! subtrees before serialization. the checksum fields are caches: the
//! contents checksum is only valid for the current files/subdirs, so
//! every mutation invalidates it.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::hash::Hash;

/// staging node for one directory level
///
/// names iterate in byte order (BTreeMap), which is the sort the tree
/// serializer requires.
#[derive(Debug, Default)]
pub struct MutableTree {
    files: BTreeMap<String, Hash>,
    subdirs: BTreeMap<String, MutableTree>,
    metadata_checksum: Option<Hash>,
    contents_checksum: Option<Hash>,
}

impl MutableTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// get or create the named child subtree
    pub fn ensure_dir(&mut self, name: &str) -> Result<&mut MutableTree> {
        validate_name(name)?;
        if self.files.contains_key(name) {
            return Err(Error::EntryConflict(format!(
                "'{}' already names a file",
                name
            )));
        }
        self.contents_checksum = None;
        Ok(self.subdirs.entry(name.to_string()).or_default())
    }

    /// bind a content checksum to the named file entry, replacing any
    /// previous binding
    pub fn replace_file(&mut self, name: &str, checksum: Hash) -> Result<()> {
        validate_name(name)?;
        if self.subdirs.contains_key(name) {
            return Err(Error::EntryConflict(format!(
                "'{}' already names a subdirectory",
                name
            )));
        }
        self.contents_checksum = None;
        self.files.insert(name.to_string(), checksum);
        Ok(())
    }

    pub fn files(&self) -> &BTreeMap<String, Hash> {
        &self.files
    }

    pub fn subdirs(&self) -> &BTreeMap<String, MutableTree> {
        &self.subdirs
    }

    pub(crate) fn subdirs_mut(&mut self) -> &mut BTreeMap<String, MutableTree> {
        &mut self.subdirs
    }

    pub fn metadata_checksum(&self) -> Option<Hash> {
        self.metadata_checksum
    }

    pub fn set_metadata_checksum(&mut self, checksum: Hash) {
        self.metadata_checksum = Some(checksum);
    }

    pub fn contents_checksum(&self) -> Option<Hash> {
        self.contents_checksum
    }

    pub fn set_contents_checksum(&mut self, checksum: Hash) {
        self.contents_checksum = Some(checksum);
    }

    /// a tree with no staged files or subdirs
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.subdirs.is_empty()
    }
}

/// entry names are single path components
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn test_empty_tree() {
        let tree = MutableTree::new();
        assert!(tree.is_empty());
        assert!(tree.metadata_checksum().is_none());
        assert!(tree.contents_checksum().is_none());
    }

    #[test]
    fn test_replace_file() {
        let mut tree = MutableTree::new();

        tree.replace_file("hello", h(1)).unwrap();
        assert_eq!(tree.files().get("hello"), Some(&h(1)));

        // replacing rebinds
        tree.replace_file("hello", h(2)).unwrap();
        assert_eq!(tree.files().get("hello"), Some(&h(2)));
        assert_eq!(tree.files().len(), 1);
    }

    #[test]
    fn test_ensure_dir_idempotent() {
        let mut tree = MutableTree::new();

        tree.ensure_dir("sub").unwrap().replace_file("f", h(1)).unwrap();
        // second ensure returns the same child
        assert_eq!(
            tree.ensure_dir("sub").unwrap().files().get("f"),
            Some(&h(1))
        );
        assert_eq!(tree.subdirs().len(), 1);
    }

    #[test]
    fn test_file_dir_conflicts() {
        let mut tree = MutableTree::new();

        tree.replace_file("x", h(1)).unwrap();
        assert!(matches!(
            tree.ensure_dir("x"),
            Err(Error::EntryConflict(_))
        ));

        tree.ensure_dir("d").unwrap();
        assert!(matches!(
            tree.replace_file("d", h(1)),
            Err(Error::EntryConflict(_))
        ));
    }

    #[test]
    fn test_name_validation() {
        let mut tree = MutableTree::new();

        assert!(matches!(
            tree.replace_file("", h(1)),
            Err(Error::InvalidEntryName(_))
        ));
        assert!(matches!(
            tree.replace_file("a/b", h(1)),
            Err(Error::InvalidEntryName(_))
        ));
        assert!(matches!(
            tree.replace_file("a\0b", h(1)),
            Err(Error::InvalidEntryName(_))
        ));
        assert!(matches!(
            tree.ensure_dir("."),
            Err(Error::InvalidEntryName(_))
        ));
        assert!(matches!(
            tree.ensure_dir(".."),
            Err(Error::InvalidEntryName(_))
        ));
    }

    #[test]
    fn test_names_iterate_sorted() {
        let mut tree = MutableTree::new();
        tree.replace_file("zebra", h(1)).unwrap();
        tree.replace_file("alpha", h(2)).unwrap();
        tree.replace_file("beta", h(3)).unwrap();

        let names: Vec<_> = tree.files().keys().cloned().collect();
        assert_eq!(names, vec!["alpha", "beta", "zebra"]);
    }

    #[test]
    fn test_mutation_invalidates_contents_checksum() {
        let mut tree = MutableTree::new();
        tree.set_contents_checksum(h(9));
        assert_eq!(tree.contents_checksum(), Some(h(9)));

        tree.replace_file("f", h(1)).unwrap();
        assert!(tree.contents_checksum().is_none());

        tree.set_contents_checksum(h(9));
        tree.ensure_dir("d").unwrap();
        assert!(tree.contents_checksum().is_none());
    }

    #[test]
    fn test_metadata_checksum_survives_mutation() {
        let mut tree = MutableTree::new();
        tree.set_metadata_checksum(h(5));
        tree.replace_file("f", h(1)).unwrap();
        assert_eq!(tree.metadata_checksum(), Some(h(5)));
    }
}
