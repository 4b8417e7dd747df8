//! tree serialization and commit assembly

use std::time::{SystemTime, UNIX_EPOCH};

use crate::cancel::Cancellable;
use crate::hash::Hash;
use crate::mtree::MutableTree;
use crate::object::ObjectType;
use crate::repo::Repo;
use crate::types::{Commit, DirTree};
use crate::Result;

/// fold a mutable tree into dirtree objects, bottom up, returning the
/// root contents checksum
///
/// a node whose contents checksum is already cached (the stored-tree
/// reuse path) is returned as-is without writing anything.
pub fn write_mtree(
    repo: &Repo,
    mtree: &mut MutableTree,
    cancellable: Option<&Cancellable>,
) -> Result<Hash> {
    if let Some(existing) = mtree.contents_checksum() {
        return Ok(existing);
    }

    let mut dirs = Vec::with_capacity(mtree.subdirs().len());
    for (name, child) in mtree.subdirs_mut().iter_mut() {
        let contents = write_mtree(repo, child, cancellable)?;
        let metadata = child
            .metadata_checksum()
            .expect("subdir metadata checksum not set");
        dirs.push((name.clone(), contents, metadata));
    }

    let tree = DirTree {
        files: mtree
            .files()
            .iter()
            .map(|(name, checksum)| (name.clone(), *checksum))
            .collect(),
        dirs,
    };

    let checksum =
        repo.write_metadata(ObjectType::DirTree, None, &tree.encode()?, cancellable)?;
    mtree.set_contents_checksum(checksum);
    Ok(checksum)
}

/// write a commit object for `branch`, stamped with the current time
///
/// no ref is advanced here; stage that separately with
/// [`Repo::transaction_set_ref`].
pub fn write_commit(
    repo: &Repo,
    branch: &str,
    parent: Option<&Hash>,
    subject: &str,
    body: &str,
    root_contents: &Hash,
    root_meta: &Hash,
    cancellable: Option<&Cancellable>,
) -> Result<Hash> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    write_commit_with_timestamp(
        repo,
        branch,
        parent,
        subject,
        body,
        timestamp,
        root_contents,
        root_meta,
        cancellable,
    )
}

/// write a commit object with an explicit timestamp; callers that need
/// reproducible commits pin the time themselves
#[allow(clippy::too_many_arguments)]
pub fn write_commit_with_timestamp(
    repo: &Repo,
    branch: &str,
    parent: Option<&Hash>,
    subject: &str,
    body: &str,
    timestamp: u64,
    root_contents: &Hash,
    root_meta: &Hash,
    cancellable: Option<&Cancellable>,
) -> Result<Hash> {
    log::debug!("writing commit for branch {}", branch);

    let commit = Commit::new(
        parent.copied(),
        subject,
        body,
        timestamp,
        *root_contents,
        *root_meta,
    );
    repo.write_metadata(ObjectType::Commit, None, &commit.encode()?, cancellable)
}
