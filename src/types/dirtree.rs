use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::types::{FileInfo, Xattr};
use crate::Result;

/// dirtree metadata object: the manifest of one directory level
///
/// `files` maps entry name to content checksum; `dirs` maps entry name
/// to (contents checksum, metadata checksum). both arrays must be
/// sorted ascending by name so identical trees serialize to identical
/// bytes on every platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTree {
    pub files: Vec<(String, Hash)>,
    pub dirs: Vec<(String, Hash, Hash)>,
}

impl DirTree {
    /// serialize to canonical bytes; the object checksum is over these
    pub fn encode(&self) -> Result<Vec<u8>> {
        debug_assert!(self.files.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(self.dirs.windows(2).all(|w| w[0].0 < w[1].0));
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

/// dirmeta metadata object: per-directory ownership, mode and xattrs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirMeta {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub xattrs: Vec<Xattr>,
}

impl DirMeta {
    /// build from directory stat info; xattrs are sorted by name
    pub fn new(info: &FileInfo, mut xattrs: Vec<Xattr>) -> Self {
        xattrs.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Self {
            uid: info.uid,
            gid: info.gid,
            mode: info.mode,
            xattrs,
        }
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
    use crate::types::FileKind;

    fn h(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn test_dirtree_roundtrip() {
        let tree = DirTree {
            files: vec![("a.txt".into(), h(1)), ("b.txt".into(), h(2))],
            dirs: vec![("sub".into(), h(3), h(4))],
        };

        let bytes = tree.encode().unwrap();
        let parsed = DirTree::decode(&bytes).unwrap();
        assert_eq!(tree, parsed);
    }

    #[test]
    fn test_dirtree_encoding_deterministic() {
        let tree = DirTree {
            files: vec![("alpha".into(), h(9))],
            dirs: vec![],
        };
        assert_eq!(tree.encode().unwrap(), tree.encode().unwrap());
    }

    #[test]
    fn test_empty_dirtree_is_canonical() {
        let a = DirTree::default().encode().unwrap();
        let b = DirTree {
            files: vec![],
            dirs: vec![],
        }
        .encode()
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dirmeta_sorts_xattrs() {
        let info = FileInfo {
            kind: FileKind::Directory,
            uid: 0,
            gid: 0,
            mode: 0o40755,
        };
        let m1 = DirMeta::new(
            &info,
            vec![
                Xattr::new("user.b", vec![2]),
                Xattr::new("user.a", vec![1]),
            ],
        );
        let m2 = DirMeta::new(
            &info,
            vec![
                Xattr::new("user.a", vec![1]),
                Xattr::new("user.b", vec![2]),
            ],
        );
        assert_eq!(m1.encode().unwrap(), m2.encode().unwrap());
        assert_eq!(m1.xattrs[0].name, "user.a");
    }

    #[test]
    fn test_dirmeta_roundtrip() {
        let info = FileInfo {
            kind: FileKind::Directory,
            uid: 1000,
            gid: 1000,
            mode: 0o40700,
        };
        let meta = DirMeta::new(&info, vec![Xattr::new("user.x", vec![7])]);
        let parsed = DirMeta::decode(&meta.encode().unwrap()).unwrap();
        assert_eq!(meta, parsed);
    }
}
