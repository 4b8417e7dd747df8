//! directory ingest
//!
//! walks a source tree, applies the commit filter, stores content
//! objects and per-directory metadata, and populates a mutable tree
//! whose serialization yields the root checksum. sources can be
//! working directories or subtrees already committed to the store.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

use crate::cancel::{check_cancelled, Cancellable};
use crate::error::{Error, IoResultExt, Result};
use crate::fs::read_xattrs;
use crate::hash::Hash;
use crate::mtree::MutableTree;
use crate::object::ObjectType;
use crate::repo::Repo;
use crate::stream::raw_file_to_content_stream;
use crate::types::{DirMeta, FileInfo, FileKind};

/// verdict of a commit filter for one path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterResult {
    /// include the entry
    Allow,
    /// leave the entry (and, for directories, its subtree) out
    Skip,
}

/// behavior switches for a commit modifier
#[derive(Clone, Copy, Debug, Default)]
pub struct ModifierFlags {
    /// do not read or store extended attributes
    pub skip_xattrs: bool,
}

/// per-path filter callback: logical path (root is "/") plus a
/// mutable copy of the entry's info the callback may edit
pub type CommitFilter = dyn Fn(&Repo, &str, &mut FileInfo) -> FilterResult + Send + Sync;

/// filter and flags applied to an ingest
///
/// shared ownership via `Arc`: clone to add a reference, drop the last
/// one to release filter state (captured closure state is dropped
/// exactly once).
pub struct CommitModifier {
    flags: ModifierFlags,
    filter: Option<Box<CommitFilter>>,
}

impl CommitModifier {
    pub fn new(flags: ModifierFlags, filter: Option<Box<CommitFilter>>) -> Arc<Self> {
        Arc::new(Self { flags, filter })
    }

    pub fn flags(&self) -> ModifierFlags {
        self.flags
    }
}

/// a subtree that is already committed, named by its dirtree and
/// dirmeta checksums
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoredDir {
    pub contents_checksum: Hash,
    pub metadata_checksum: Hash,
}

impl StoredDir {
    pub fn new(contents_checksum: Hash, metadata_checksum: Hash) -> Self {
        Self {
            contents_checksum,
            metadata_checksum,
        }
    }

    /// resolve a commit's root directory
    pub fn from_commit(repo: &Repo, commit_checksum: &Hash) -> Result<Self> {
        let commit = repo.read_commit(commit_checksum)?;
        Ok(Self::new(commit.root_contents, commit.root_meta))
    }
}

/// where an ingest reads from
pub enum TreeSource<'a> {
    /// a directory on the working filesystem
    Filesystem(&'a Path),
    /// a subtree already in the repository; its checksums are reused
    /// without touching any file content
    Stored(StoredDir),
}

/// ingest a source tree into `mtree`, storing every needed object
///
/// stored sources bind known checksums and cannot be combined with a
/// modifier.
pub fn write_directory_to_mtree(
    repo: &Repo,
    source: TreeSource<'_>,
    mtree: &mut MutableTree,
    modifier: Option<&CommitModifier>,
    cancellable: Option<&Cancellable>,
) -> Result<()> {
    assert!(repo.in_transaction(), "ingest requires an open transaction");
    match source {
        TreeSource::Filesystem(dir) => {
            let mut path = Vec::new();
            ingest_fs_dir(repo, dir, mtree, modifier, &mut path, cancellable)
        }
        TreeSource::Stored(stored) => {
            if modifier.is_some() {
                return Err(Error::StoredTreeModifier);
            }
            ingest_stored_dir(repo, stored, mtree, cancellable)
        }
    }
}

/// render a logical path stack as "/a/b/c"; the root is "/"
fn render_path(path: &[String]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut rendered = String::new();
    for component in path {
        rendered.push('/');
        rendered.push_str(component);
    }
    rendered
}

/// run the filter for one path; the original info is never mutated
fn apply_filter(
    repo: &Repo,
    modifier: Option<&CommitModifier>,
    path: &[String],
    info: &FileInfo,
) -> (FilterResult, FileInfo) {
    let filter = match modifier.and_then(|m| m.filter.as_ref()) {
        Some(filter) => filter,
        None => return (FilterResult::Allow, info.clone()),
    };

    let mut modified = info.clone();
    let result = filter(repo, &render_path(path), &mut modified);
    (result, modified)
}

fn skip_xattrs(modifier: Option<&CommitModifier>) -> bool {
    modifier.map(|m| m.flags.skip_xattrs).unwrap_or(false)
}

fn ingest_fs_dir(
    repo: &Repo,
    dir: &Path,
    mtree: &mut MutableTree,
    modifier: Option<&CommitModifier>,
    path: &mut Vec<String>,
    cancellable: Option<&Cancellable>,
) -> Result<()> {
    check_cancelled(cancellable)?;
    log::debug!("examining {}", dir.display());

    let dir_info = FileInfo::from_path(dir)?;
    let (filter_result, modified_info) = apply_filter(repo, modifier, path, &dir_info);
    if filter_result == FilterResult::Skip {
        return Ok(());
    }

    let xattrs = if skip_xattrs(modifier) {
        vec![]
    } else {
        read_xattrs(dir)?
    };
    let dirmeta = DirMeta::new(&modified_info, xattrs);
    let meta_checksum =
        repo.write_metadata(ObjectType::DirMeta, None, &dirmeta.encode()?, cancellable)?;
    mtree.set_metadata_checksum(meta_checksum);

    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_path(dir)?
        .collect::<io::Result<Vec<_>>>()
        .with_path(dir)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        check_cancelled(cancellable)?;
        let child_path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        // pushed before the child is touched, popped whatever happens
        path.push(name.clone());
        let result = ingest_fs_child(
            repo,
            &child_path,
            &name,
            mtree,
            modifier,
            path,
            cancellable,
        );
        path.pop();
        result?;
    }

    Ok(())
}

fn ingest_fs_child(
    repo: &Repo,
    child_path: &Path,
    name: &str,
    mtree: &mut MutableTree,
    modifier: Option<&CommitModifier>,
    path: &mut Vec<String>,
    cancellable: Option<&Cancellable>,
) -> Result<()> {
    let meta = fs::symlink_metadata(child_path).with_path(child_path)?;
    let child_info = FileInfo::from_metadata(&meta, child_path)?;

    let (filter_result, modified_info) = apply_filter(repo, modifier, path, &child_info);
    if filter_result == FilterResult::Skip {
        return Ok(());
    }

    match modified_info.kind {
        FileKind::Directory => {
            let child_mtree = mtree.ensure_dir(name)?;
            ingest_fs_dir(repo, child_path, child_mtree, modifier, path, cancellable)
        }
        FileKind::Regular { .. } | FileKind::Symlink { .. } => {
            log::debug!("adding {}", child_path.display());

            // a devino hit means the content is already stored; attach
            // the known checksum without opening the file
            if let Some(checksum) = repo.devino_lookup(meta.dev(), meta.ino()) {
                return mtree.replace_file(name, checksum);
            }

            let xattrs = if skip_xattrs(modifier) {
                vec![]
            } else {
                read_xattrs(child_path)?
            };

            let checksum = if modified_info.is_regular() {
                let file = File::open(child_path).with_path(child_path)?;
                let (stream, length) =
                    raw_file_to_content_stream(file, &modified_info, &xattrs)?;
                repo.write_content(None, stream, length, cancellable)?
            } else {
                let (stream, length) =
                    raw_file_to_content_stream(io::empty(), &modified_info, &xattrs)?;
                repo.write_content(None, stream, length, cancellable)?
            };
            mtree.replace_file(name, checksum)
        }
        FileKind::Special => Err(Error::UnsupportedFileType("special")),
    }
}

/// bind a stored subtree into the mtree: metadata checksum up front,
/// child checksums from the dirtree, and the contents checksum as a
/// shortcut when the mtree held nothing else
fn ingest_stored_dir(
    repo: &Repo,
    stored: StoredDir,
    mtree: &mut MutableTree,
    cancellable: Option<&Cancellable>,
) -> Result<()> {
    check_cancelled(cancellable)?;

    mtree.set_metadata_checksum(stored.metadata_checksum);
    let was_empty = mtree.is_empty();

    let tree = repo.read_dirtree(&stored.contents_checksum)?;
    for (name, checksum) in &tree.files {
        mtree.replace_file(name, *checksum)?;
    }
    for (name, contents, metadata) in &tree.dirs {
        let child = mtree.ensure_dir(name)?;
        ingest_stored_dir(repo, StoredDir::new(*contents, *metadata), child, cancellable)?;
    }

    if was_empty {
        mtree.set_contents_checksum(stored.contents_checksum);
    }
    Ok(())
}
