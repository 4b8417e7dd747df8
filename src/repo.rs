use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use crate::config::{Config, RepoMode};
use crate::devino::DevinoCache;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::transaction::TransactionStats;

/// an arbor repository
///
/// the handle carries the open-state the commit engine needs: the
/// storage mode, the optional parent repository used as a lookup
/// fallback, and the active transaction state (stats, pending refs,
/// devino cache).
pub struct Repo {
    path: PathBuf,
    config: Config,
    parent: Option<Box<Repo>>,

    pub(crate) in_transaction: AtomicBool,
    pub(crate) txn_stats: Mutex<TransactionStats>,
    /// pending refspec -> target; None value stages a deletion
    pub(crate) txn_refs: Mutex<Option<HashMap<String, Option<Hash>>>>,
    /// populated by scan_hardlinks, read-only during ingest
    pub(crate) devino_cache: RwLock<Option<DevinoCache>>,
    /// brackets the post-hash existence recheck and the install rename
    /// so the written counters stay exact under concurrent writers
    pub(crate) install_lock: Mutex<()>,
}

impl Repo {
    /// initialize a new repository at the given path
    pub fn init(path: &Path, mode: RepoMode) -> Result<Self> {
        Self::init_with_parent(path, mode, None)
    }

    /// initialize a new repository with a parent lookup repository
    pub fn init_with_parent(
        path: &Path,
        mode: RepoMode,
        parent: Option<PathBuf>,
    ) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        std::fs::create_dir_all(path.join("objects")).with_path(path)?;
        std::fs::create_dir_all(path.join("tmp")).with_path(path)?;
        std::fs::create_dir_all(path.join("refs/heads")).with_path(path)?;
        std::fs::create_dir_all(path.join("refs/remotes")).with_path(path)?;

        let mut config = Config::new(mode);
        config.parent = parent;
        config.save(&config_path)?;

        Self::from_config(path.to_path_buf(), config)
    }

    /// open an existing repository
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;
        Self::from_config(path.to_path_buf(), config)
    }

    fn from_config(path: PathBuf, config: Config) -> Result<Self> {
        let parent = match &config.parent {
            Some(parent_path) => Some(Box::new(Repo::open(parent_path)?)),
            None => None,
        };

        Ok(Self {
            path,
            config,
            parent,
            in_transaction: AtomicBool::new(false),
            txn_stats: Mutex::new(TransactionStats::default()),
            txn_refs: Mutex::new(None),
            devino_cache: RwLock::new(None),
            install_lock: Mutex::new(()),
        })
    }

    /// repository root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// repository storage mode
    pub fn mode(&self) -> RepoMode {
        self.config.mode
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// parent repository, if configured
    pub fn parent(&self) -> Option<&Repo> {
        self.parent.as_deref()
    }

    /// is a transaction currently open on this handle
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    /// path to objects directory
    pub fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }

    /// path to tmp directory (scratch for in-flight objects)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// path to local branch refs
    pub fn refs_heads_path(&self) -> PathBuf {
        self.path.join("refs/heads")
    }

    /// path to remote-tracking refs
    pub fn refs_remotes_path(&self) -> PathBuf {
        self.path.join("refs/remotes")
    }

    /// path to the advisory transaction lock symlink
    pub fn transaction_lock_path(&self) -> PathBuf {
        self.path.join("transaction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repo_init() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");

        let repo = Repo::init(&repo_path, RepoMode::Bare).unwrap();

        assert!(repo_path.join("objects").is_dir());
        assert!(repo_path.join("tmp").is_dir());
        assert!(repo_path.join("refs/heads").is_dir());
        assert!(repo_path.join("refs/remotes").is_dir());
        assert!(repo_path.join("config.toml").is_file());
        assert_eq!(repo.mode(), RepoMode::Bare);
        assert!(!repo.in_transaction());
    }

    #[test]
    fn test_repo_init_already_exists() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");

        Repo::init(&repo_path, RepoMode::Bare).unwrap();
        let result = Repo::init(&repo_path, RepoMode::Bare);

        assert!(matches!(result, Err(Error::RepoExists(_))));
    }

    #[test]
    fn test_repo_open() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");

        Repo::init(&repo_path, RepoMode::ArchiveZ2).unwrap();
        let repo = Repo::open(&repo_path).unwrap();

        assert_eq!(repo.path(), repo_path);
        assert_eq!(repo.mode(), RepoMode::ArchiveZ2);
    }

    #[test]
    fn test_repo_open_not_found() {
        let dir = tempdir().unwrap();
        let result = Repo::open(&dir.path().join("nonexistent"));
        assert!(matches!(result, Err(Error::NoRepo(_))));
    }

    #[test]
    fn test_repo_parent_chain() {
        let dir = tempdir().unwrap();
        let base_path = dir.path().join("base");
        let child_path = dir.path().join("child");

        Repo::init(&base_path, RepoMode::Bare).unwrap();
        let child =
            Repo::init_with_parent(&child_path, RepoMode::Bare, Some(base_path.clone())).unwrap();

        let parent = child.parent().unwrap();
        assert_eq!(parent.path(), base_path);
        assert!(parent.parent().is_none());
    }

    #[test]
    fn test_repo_paths() {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path, RepoMode::Bare).unwrap();

        assert_eq!(repo.objects_path(), repo_path.join("objects"));
        assert_eq!(repo.tmp_path(), repo_path.join("tmp"));
        assert_eq!(repo.refs_heads_path(), repo_path.join("refs/heads"));
        assert_eq!(repo.transaction_lock_path(), repo_path.join("transaction"));
    }
}
