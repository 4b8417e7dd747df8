//! object naming, path policy and the loose-object probe

pub mod read;
pub mod write;

use std::path::PathBuf;

use crate::config::RepoMode;
use crate::error::{IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// the four persisted object kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    Commit,
    DirTree,
    DirMeta,
    File,
}

impl ObjectType {
    /// metadata objects are commit/dirtree/dirmeta; content is file
    pub fn is_meta(&self) -> bool {
        !matches!(self, ObjectType::File)
    }

    /// on-disk suffix; content objects switch to `.filez` when the
    /// payload is zlib-wrapped under archive mode
    pub fn suffix(&self, mode: RepoMode) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::DirTree => "dirtree",
            ObjectType::DirMeta => "dirmeta",
            ObjectType::File => match mode {
                RepoMode::Bare => "file",
                RepoMode::ArchiveZ2 => "filez",
            },
        }
    }

}

/// relative path of a loose object within `objects/`
///
/// fanout is exactly the first two hex chars; the rest of the hex
/// plus the type suffix is the file name.
pub fn loose_path(checksum: &Hash, objtype: ObjectType, mode: RepoMode) -> String {
    let (prefix, rest) = checksum.to_path_components();
    format!("{}/{}.{}", prefix, rest, objtype.suffix(mode))
}

impl Repo {
    /// absolute path a loose object would occupy in this repository
    pub fn object_path(&self, checksum: &Hash, objtype: ObjectType) -> PathBuf {
        self.objects_path()
            .join(loose_path(checksum, objtype, self.mode()))
    }

    /// companion path used by archive-mode callers that keep an
    /// uncompressed copy; never written by the commit engine
    pub fn uncompressed_object_cache_path(&self, checksum: &Hash) -> PathBuf {
        self.path()
            .join("uncompressed-objects-cache/objects")
            .join(loose_path(checksum, ObjectType::File, RepoMode::Bare))
    }

    /// does the store (or a parent repository) already hold this
    /// object? side-effect free.
    pub fn has_loose_object(&self, checksum: &Hash, objtype: ObjectType) -> Result<bool> {
        let path = self.object_path(checksum, objtype);
        match path.symlink_metadata() {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match self.parent() {
                Some(parent) => parent.has_loose_object(checksum, objtype),
                None => Ok(false),
            },
            Err(e) => Err(e).with_path(&path),
        }
    }
}
