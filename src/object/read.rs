//! verified read-back of stored objects

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::ObjectType;
use crate::repo::Repo;
use crate::types::{Commit, DirMeta, DirTree};

impl Repo {
    /// read the canonical bytes of a metadata object, re-hashing them
    /// against the requested checksum; falls back to the parent
    /// repository on miss
    pub fn read_metadata(&self, objtype: ObjectType, checksum: &Hash) -> Result<Vec<u8>> {
        assert!(objtype.is_meta(), "content objects have no canonical read");

        let path = self.object_path(checksum, objtype);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return match self.parent() {
                    Some(parent) => parent.read_metadata(objtype, checksum),
                    None => Err(Error::ObjectNotFound(*checksum)),
                };
            }
            Err(e) => return Err(Error::Io { path, source: e }),
        };

        let actual = Hash::from_bytes(Sha256::digest(&bytes).into());
        if actual != *checksum {
            return Err(Error::CorruptObject {
                expected: *checksum,
                actual,
            });
        }

        Ok(bytes)
    }

    /// read and decode a dirtree object
    pub fn read_dirtree(&self, checksum: &Hash) -> Result<DirTree> {
        DirTree::decode(&self.read_metadata(ObjectType::DirTree, checksum)?)
    }

    /// read and decode a dirmeta object
    pub fn read_dirmeta(&self, checksum: &Hash) -> Result<DirMeta> {
        DirMeta::decode(&self.read_metadata(ObjectType::DirMeta, checksum)?)
    }

    /// read and decode a commit object
    pub fn read_commit(&self, checksum: &Hash) -> Result<Commit> {
        Commit::decode(&self.read_metadata(ObjectType::Commit, checksum)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoMode;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo"), RepoMode::Bare).unwrap();
        repo.prepare_transaction(None).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_read_back_dirtree() {
        let (_dir, repo) = test_repo();

        let tree = DirTree {
            files: vec![("a".into(), Hash::from_bytes([1; 32]))],
            dirs: vec![],
        };
        let checksum = repo
            .write_metadata(ObjectType::DirTree, None, &tree.encode().unwrap(), None)
            .unwrap();

        let read = repo.read_dirtree(&checksum).unwrap();
        assert_eq!(read, tree);
    }

    #[test]
    fn test_read_missing_object() {
        let (_dir, repo) = test_repo();
        let result = repo.read_metadata(ObjectType::DirMeta, &Hash::ZERO);
        assert!(matches!(result, Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_read_detects_corruption() {
        let (_dir, repo) = test_repo();

        let checksum = repo
            .write_metadata(ObjectType::DirMeta, None, b"meta bytes", None)
            .unwrap();

        let path = repo.object_path(&checksum, ObjectType::DirMeta);
        std::fs::write(&path, b"tampered").unwrap();

        let result = repo.read_metadata(ObjectType::DirMeta, &checksum);
        assert!(matches!(result, Err(Error::CorruptObject { .. })));
    }

    #[test]
    fn test_read_falls_back_to_parent() {
        let dir = tempdir().unwrap();
        let base_path = dir.path().join("base");
        let base = Repo::init(&base_path, RepoMode::Bare).unwrap();
        base.prepare_transaction(None).unwrap();
        let checksum = base
            .write_metadata(ObjectType::DirMeta, None, b"shared meta", None)
            .unwrap();
        base.commit_transaction(None).unwrap();

        let child =
            Repo::init_with_parent(&dir.path().join("child"), RepoMode::Bare, Some(base_path))
                .unwrap();
        let bytes = child.read_metadata(ObjectType::DirMeta, &checksum).unwrap();
        assert_eq!(bytes, b"shared meta");
    }
}
