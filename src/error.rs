use std::path::PathBuf;

use crate::Hash;

/// error type for arbor operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    NoRepo(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupted object {expected} (actual checksum is {actual})")]
    CorruptObject { expected: Hash, actual: Hash },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(&'static str),

    #[error("exhausted attempts to create temporary file")]
    Exhausted,

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("tree entry conflict: {0}")]
    EntryConflict(String),

    #[error("commit modifiers cannot be applied to stored trees")]
    StoredTreeModifier,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("xattr error on {path}: {message}")]
    Xattr { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
