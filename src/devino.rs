//! devino cache: hardlink-based checksum reuse
//!
//! ingesting a tree whose files are hardlinks into the store would
//! re-open and re-hash every one of them. scanning the loose objects
//! once builds a (device, inode) -> checksum map, and ingest then
//! attaches the known checksum without any file i/o.

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// mapping from (dev, ino) to the checksum of a stored content object
#[derive(Debug, Default)]
pub struct DevinoCache {
    map: HashMap<(u64, u64), Hash>,
}

impl DevinoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// record an inode, replacing any prior entry at that key
    pub fn insert(&mut self, dev: u64, ino: u64, checksum: Hash) {
        self.map.insert((dev, ino), checksum);
    }

    pub fn lookup(&self, dev: u64, ino: u64) -> Option<&Hash> {
        self.map.get(&(dev, ino))
    }

    /// number of tracked inodes
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl Repo {
    /// populate the devino cache by scanning all loose content objects
    ///
    /// parent repositories are scanned first so this repository's
    /// entries win on collision. call this inside a transaction,
    /// before ingesting trees that hardlink into the store.
    pub fn scan_hardlinks(&self) -> Result<()> {
        assert!(self.in_transaction(), "no transaction open");

        let mut guard = self.devino_cache.write().unwrap();
        let cache = guard.get_or_insert_with(DevinoCache::new);
        cache.clear();
        scan_loose_devino(self, cache)?;
        log::debug!("devino scan found {} inodes", cache.len());
        Ok(())
    }

    /// checksum for (dev, ino) if the scan recorded it
    pub(crate) fn devino_lookup(&self, dev: u64, ino: u64) -> Option<Hash> {
        self.devino_cache
            .read()
            .unwrap()
            .as_ref()
            .and_then(|cache| cache.lookup(dev, ino))
            .copied()
    }
}

/// walk the two-level objects fanout of `repo` (parents first) and
/// record every loose `.file` entry
///
/// only `.file` qualifies even under archive mode: `.filez` entries
/// are compressed, so their inodes can never match a working-tree
/// file.
fn scan_loose_devino(repo: &Repo, cache: &mut DevinoCache) -> Result<()> {
    if let Some(parent) = repo.parent() {
        scan_loose_devino(parent, cache)?;
    }

    for entry in WalkDir::new(repo.objects_path())
        .min_depth(2)
        .max_depth(2)
    {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| repo.objects_path());
            match e.into_io_error() {
                Some(source) => Error::Io { path, source },
                None => Error::Io {
                    path,
                    source: std::io::Error::other("walkdir loop"),
                },
            }
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some((stem, suffix)) = name.rsplit_once('.') else {
            continue;
        };
        if suffix != "file" || stem.len() != 62 {
            continue;
        }

        let Some(prefix) = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        else {
            continue;
        };
        if prefix.len() != 2 {
            continue;
        }

        let Ok(checksum) = Hash::from_hex(&format!("{}{}", prefix, stem)) else {
            continue;
        };

        let meta = entry.metadata().map_err(|e| Error::Io {
            path: entry.path().to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walkdir metadata")),
        })?;
        cache.insert(meta.dev(), meta.ino(), checksum);
    }

    Ok(())
}
