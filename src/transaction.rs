//! transaction lifecycle
//!
//! all mutation happens inside a transaction bracket. refs staged with
//! [`Repo::transaction_set_ref`] are only published when the
//! transaction commits; aborting drops them. objects installed during
//! the transaction are content-addressed and stay valid even on abort.

use std::collections::HashMap;
use std::os::unix::fs::symlink;
use std::sync::atomic::Ordering;

use crate::cancel::{check_cancelled, Cancellable};
use crate::error::{IoResultExt, Result};
use crate::hash::Hash;
use crate::refs;
use crate::repo::Repo;

/// counters accumulated over one transaction
///
/// `*_total` advances on every write call, `*_written` only when an
/// object was actually installed, so written/total measures how much
/// the store deduplicated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub metadata_objects_total: u64,
    pub metadata_objects_written: u64,
    pub content_objects_total: u64,
    pub content_objects_written: u64,
    pub content_bytes_written: u64,
}

impl Repo {
    /// start a transaction
    ///
    /// returns true when a prior session left its lock symlink behind,
    /// i.e. this transaction resumes unclean state. the lock is an
    /// advisory crash marker, not cross-process mutual exclusion.
    pub fn prepare_transaction(&self, cancellable: Option<&Cancellable>) -> Result<bool> {
        assert!(!self.in_transaction(), "transaction already open");
        check_cancelled(cancellable)?;

        let lock_path = self.transaction_lock_path();
        let resume = matches!(
            std::fs::symlink_metadata(&lock_path),
            Ok(meta) if meta.file_type().is_symlink()
        );

        *self.txn_stats.lock().unwrap() = TransactionStats::default();
        *self.txn_refs.lock().unwrap() = None;
        self.in_transaction.store(true, Ordering::SeqCst);

        if resume {
            std::fs::remove_file(&lock_path).with_path(&lock_path)?;
        }
        let target = format!("pid={}", std::process::id());
        symlink(&target, &lock_path).with_path(&lock_path)?;

        log::debug!("transaction prepared (resume={})", resume);
        Ok(resume)
    }

    /// complete the transaction: wipe tmp, publish staged refs, drop
    /// the lock symlink and return the accumulated stats
    ///
    /// failure leaves the transaction open so the caller may retry or
    /// abort.
    pub fn commit_transaction(
        &self,
        cancellable: Option<&Cancellable>,
    ) -> Result<TransactionStats> {
        assert!(self.in_transaction(), "no transaction open");
        check_cancelled(cancellable)?;

        self.cleanup_tmpdir()?;

        if let Some(cache) = self.devino_cache.write().unwrap().as_mut() {
            cache.clear();
        }

        {
            let mut pending = self.txn_refs.lock().unwrap();
            if let Some(staged) = pending.as_ref() {
                refs::update_refs(self, staged)?;
            }
            *pending = None;
        }

        self.in_transaction.store(false, Ordering::SeqCst);

        let lock_path = self.transaction_lock_path();
        match std::fs::remove_file(&lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_path(&lock_path),
        }

        let stats = *self.txn_stats.lock().unwrap();
        log::debug!(
            "transaction committed: {} metadata, {} content objects written",
            stats.metadata_objects_written,
            stats.content_objects_written
        );
        Ok(stats)
    }

    /// abort the transaction: wipe tmp and drop staged refs without
    /// publishing them
    ///
    /// already-installed objects stay in place; they are
    /// content-addressed and a future commit may reference them. no-op
    /// when no transaction is open.
    pub fn abort_transaction(&self, cancellable: Option<&Cancellable>) -> Result<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        check_cancelled(cancellable)?;

        self.cleanup_tmpdir()?;

        if let Some(cache) = self.devino_cache.write().unwrap().as_mut() {
            cache.clear();
        }

        *self.txn_refs.lock().unwrap() = None;
        self.in_transaction.store(false, Ordering::SeqCst);
        log::debug!("transaction aborted");
        Ok(())
    }

    /// stage a refspec ("[remote:]name") update for commit time;
    /// `None` stages a deletion
    pub fn transaction_set_refspec(&self, refspec: &str, checksum: Option<Hash>) {
        assert!(self.in_transaction(), "no transaction open");

        let mut pending = self.txn_refs.lock().unwrap();
        pending
            .get_or_insert_with(HashMap::new)
            .insert(refspec.to_string(), checksum);
    }

    /// stage a ref update for commit time, optionally scoped to a
    /// remote; `None` stages a deletion
    pub fn transaction_set_ref(&self, remote: Option<&str>, name: &str, checksum: Option<Hash>) {
        let refspec = match remote {
            Some(remote) => format!("{}:{}", remote, name),
            None => name.to_string(),
        };
        self.transaction_set_refspec(&refspec, checksum);
    }

    /// snapshot of the current transaction counters
    pub fn transaction_stats(&self) -> TransactionStats {
        *self.txn_stats.lock().unwrap()
    }

    /// wipe everything under tmp/; in-flight objects of this
    /// transaction are uniquely named and never shared
    fn cleanup_tmpdir(&self) -> Result<()> {
        let tmp = self.tmp_path();
        for entry in std::fs::read_dir(&tmp).with_path(&tmp)? {
            let entry = entry.with_path(&tmp)?;
            let path = entry.path();
            let file_type = entry.file_type().with_path(&path)?;
            if file_type.is_dir() {
                std::fs::remove_dir_all(&path).with_path(&path)?;
            } else {
                std::fs::remove_file(&path).with_path(&path)?;
            }
        }
        Ok(())
    }
}
