//! arbor - content-addressed filesystem tree repository
//!
//! the commit engine for an immutable, deduplicated object store of
//! filesystem snapshots. directory hierarchies are ingested into four
//! object kinds (content, dirmeta, dirtree, commit), each named by the
//! SHA-256 of its canonical serialization and stored under a
//! two-hex-char fanout.
//!
//! # Core concepts
//!
//! - **Transaction**: the bracket within which all mutation happens;
//!   refs staged on the transaction publish atomically on commit
//! - **Content object**: a regular file or symlink plus its metadata,
//!   checksummed over the codec-canonical stream encoding
//! - **Mutable tree**: in-memory staging of a directory's file
//!   checksums and subtrees before serialization
//! - **Devino cache**: a (device, inode) -> checksum map letting
//!   hardlinked inputs skip re-hashing entirely
//!
//! # Example usage
//!
//! ```no_run
//! use arbor::{commit, ingest, MutableTree, Repo, RepoMode, TreeSource};
//! use std::path::Path;
//!
//! let repo = Repo::init(Path::new("/srv/repo"), RepoMode::Bare).unwrap();
//! repo.prepare_transaction(None).unwrap();
//!
//! let mut mtree = MutableTree::new();
//! ingest::write_directory_to_mtree(
//!     &repo,
//!     TreeSource::Filesystem(Path::new("/srv/source")),
//!     &mut mtree,
//!     None,
//!     None,
//! )
//! .unwrap();
//!
//! let root_contents = commit::write_mtree(&repo, &mut mtree, None).unwrap();
//! let root_meta = mtree.metadata_checksum().unwrap();
//! let checksum = commit::write_commit(
//!     &repo, "main", None, "initial", "", &root_contents, &root_meta, None,
//! )
//! .unwrap();
//!
//! repo.transaction_set_ref(None, "main", Some(checksum));
//! repo.commit_transaction(None).unwrap();
//! ```

mod cancel;
mod config;
mod devino;
mod error;
mod hash;
mod mtree;
mod repo;
mod transaction;

pub mod commit;
pub mod fs;
pub mod ingest;
pub mod object;
pub mod refs;
pub mod stream;
pub mod types;

pub use cancel::Cancellable;
pub use commit::{write_commit, write_commit_with_timestamp, write_mtree};
pub use config::{Config, RepoMode};
pub use devino::DevinoCache;
pub use error::{Error, IoResultExt, Result};
pub use hash::Hash;
pub use ingest::{
    write_directory_to_mtree, CommitModifier, FilterResult, ModifierFlags, StoredDir, TreeSource,
};
pub use mtree::MutableTree;
pub use object::ObjectType;
pub use repo::Repo;
pub use transaction::TransactionStats;
pub use types::{Commit, DirMeta, DirTree, FileInfo, FileKind, Xattr};
