//! refs store
//!
//! a refspec is `"[remote:]name"`. local refs live under `refs/heads`,
//! remote-scoped refs under `refs/remotes/<remote>`. the commit engine
//! never writes refs directly; staged updates are applied here when a
//! transaction commits.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::Repo;

/// apply a staged refspec -> target map; `None` targets delete
pub(crate) fn update_refs(repo: &Repo, refs: &HashMap<String, Option<Hash>>) -> Result<()> {
    for (refspec, target) in refs {
        match target {
            Some(checksum) => write_ref(repo, refspec, checksum)?,
            None => delete_ref_if_exists(repo, refspec)?,
        }
    }
    Ok(())
}

/// write a ref (create or update), atomically via tmp + rename
pub fn write_ref(repo: &Repo, refspec: &str, checksum: &Hash) -> Result<()> {
    let ref_path = ref_path(repo, refspec)?;

    if let Some(parent) = ref_path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        writeln!(tmp_file, "{}", checksum.to_hex()).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, &ref_path).with_path(&ref_path)?;

    if let Some(parent) = ref_path.parent() {
        crate::fs::fsync_dir(parent)?;
    }

    Ok(())
}

/// read a ref
pub fn read_ref(repo: &Repo, refspec: &str) -> Result<Hash> {
    let ref_path = ref_path(repo, refspec)?;

    let content = fs::read_to_string(&ref_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(refspec.to_string())
        } else {
            Error::Io {
                path: ref_path.clone(),
                source: e,
            }
        }
    })?;

    Hash::from_hex(content.trim())
}

/// delete a ref; missing refs are an error
pub fn delete_ref(repo: &Repo, refspec: &str) -> Result<()> {
    let ref_path = ref_path(repo, refspec)?;

    fs::remove_file(&ref_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::RefNotFound(refspec.to_string())
        } else {
            Error::Io {
                path: ref_path,
                source: e,
            }
        }
    })
}

/// delete a ref, tolerating a ref that was never written
fn delete_ref_if_exists(repo: &Repo, refspec: &str) -> Result<()> {
    match delete_ref(repo, refspec) {
        Ok(()) | Err(Error::RefNotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// check if a ref exists
pub fn ref_exists(repo: &Repo, refspec: &str) -> bool {
    ref_path(repo, refspec).map(|p| p.exists()).unwrap_or(false)
}

/// list all refs as refspecs, local names first
pub fn list_refs(repo: &Repo) -> Result<Vec<String>> {
    let mut refs = Vec::new();

    let heads = repo.refs_heads_path();
    if heads.exists() {
        collect_refs(&heads, &heads, None, &mut refs)?;
    }

    let remotes = repo.refs_remotes_path();
    if remotes.exists() {
        for entry in fs::read_dir(&remotes).with_path(&remotes)? {
            let entry = entry.with_path(&remotes)?;
            if entry.path().is_dir() {
                let remote = entry.file_name().to_string_lossy().into_owned();
                collect_refs(&entry.path(), &entry.path(), Some(&remote), &mut refs)?;
            }
        }
    }

    refs.sort();
    Ok(refs)
}

/// list refs matching a glob pattern
pub fn list_refs_matching(repo: &Repo, pattern: &str) -> Result<Vec<String>> {
    let all_refs = list_refs(repo)?;
    let glob = glob::Pattern::new(pattern).map_err(|e| Error::InvalidRef(e.to_string()))?;

    Ok(all_refs.into_iter().filter(|r| glob.matches(r)).collect())
}

/// split a refspec into (remote, name)
fn parse_refspec(refspec: &str) -> Result<(Option<&str>, &str)> {
    match refspec.split_once(':') {
        Some((remote, name)) => {
            if remote.is_empty() {
                return Err(Error::InvalidRef(refspec.to_string()));
            }
            validate_ref_name(name)?;
            Ok((Some(remote), name))
        }
        None => {
            validate_ref_name(refspec)?;
            Ok((None, refspec))
        }
    }
}

/// filesystem path for a refspec
fn ref_path(repo: &Repo, refspec: &str) -> Result<PathBuf> {
    let (remote, name) = parse_refspec(refspec)?;
    Ok(match remote {
        Some(remote) => repo.refs_remotes_path().join(remote).join(name),
        None => repo.refs_heads_path().join(name),
    })
}

/// recursively collect refs from directory
fn collect_refs(
    base: &PathBuf,
    dir: &PathBuf,
    remote: Option<&str>,
    refs: &mut Vec<String>,
) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();

        if path.is_dir() {
            collect_refs(base, &path, remote, refs)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(base) {
                let name = rel.to_string_lossy().to_string();
                refs.push(match remote {
                    Some(remote) => format!("{}:{}", remote, name),
                    None => name,
                });
            }
        }
    }
    Ok(())
}

/// validate ref name
fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("empty ref name".to_string()));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot start or end with '/': {}",
            name
        )));
    }

    if name.contains("//") {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain '//': {}",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain null byte: {}",
            name
        )));
    }

    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRef(format!(
                "ref name cannot contain '.' or '..': {}",
                name
            )));
        }
    }

    Ok(())
}
