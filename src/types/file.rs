use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// extended attribute (name + value)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xattr {
    pub name: String,
    pub value: Vec<u8>,
}

impl Xattr {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// kind of filesystem entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileKind {
    /// regular file
    Regular { size: u64 },
    /// symbolic link
    Symlink { target: String },
    /// directory
    Directory,
    /// device, fifo or socket; representable so a commit filter can
    /// skip it, but never storable
    Special,
}

/// logical metadata for a filesystem entry
///
/// this is what the content codec encodes and what a commit filter may
/// edit (uid/gid/mode). on-disk dev/ino live on [`std::fs::Metadata`],
/// not here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub kind: FileKind,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl FileInfo {
    /// read logical metadata from a path (does not follow symlinks)
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = std::fs::symlink_metadata(path).with_path(path)?;
        Self::from_metadata(&meta, path)
    }

    /// build from stat results; `path` is consulted only to read a
    /// symlink target
    pub fn from_metadata(meta: &Metadata, path: &Path) -> Result<Self> {
        let ft = meta.file_type();
        let kind = if ft.is_file() {
            FileKind::Regular { size: meta.len() }
        } else if ft.is_symlink() {
            let target = std::fs::read_link(path).with_path(path)?;
            FileKind::Symlink {
                target: target.to_string_lossy().into_owned(),
            }
        } else if ft.is_dir() {
            FileKind::Directory
        } else {
            FileKind::Special
        };

        Ok(Self {
            kind,
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
        })
    }

    pub fn is_regular(&self) -> bool {
        matches!(self.kind, FileKind::Regular { .. })
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, FileKind::Symlink { .. })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// payload size of the entry: file length for regular files, zero
    /// for everything else
    pub fn payload_size(&self) -> u64 {
        match self.kind {
            FileKind::Regular { size } => size,
            _ => 0,
        }
    }

    /// symlink target, if any
    pub fn symlink_target(&self) -> Option<&str> {
        match &self.kind {
            FileKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_file_info_regular() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();

        let info = FileInfo::from_path(&path).unwrap();
        assert!(info.is_regular());
        assert_eq!(info.payload_size(), 7);
        assert_eq!(info.mode & 0o170000, 0o100000);
    }

    #[test]
    fn test_file_info_directory() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let info = FileInfo::from_path(&subdir).unwrap();
        assert!(info.is_dir());
        assert_eq!(info.payload_size(), 0);
    }

    #[test]
    fn test_file_info_symlink() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink("/some/target", &link).unwrap();

        let info = FileInfo::from_path(&link).unwrap();
        assert!(info.is_symlink());
        assert_eq!(info.symlink_target(), Some("/some/target"));
        assert_eq!(info.payload_size(), 0);
    }

    #[test]
    fn test_file_info_fifo_is_special() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipe");
        nix::unistd::mkfifo(&path, nix::sys::stat::Mode::from_bits_truncate(0o644)).unwrap();

        let info = FileInfo::from_path(&path).unwrap();
        assert_eq!(info.kind, FileKind::Special);
    }

    #[test]
    fn test_xattr_creation() {
        let x = Xattr::new("user.test", vec![1, 2, 3]);
        assert_eq!(x.name, "user.test");
        assert_eq!(x.value, vec![1, 2, 3]);
    }
}
