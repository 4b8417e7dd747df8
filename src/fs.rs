//! small filesystem helpers shared by ingest and the object writer

use std::fs::File;
use std::path::Path;

use nix::libc;

use crate::error::{Error, IoResultExt, Result};
use crate::types::Xattr;

/// read all extended attributes from a path
pub fn read_xattrs(path: &Path) -> Result<Vec<Xattr>> {
    let mut xattrs = Vec::new();

    let names: Vec<String> = match xattr::list(path) {
        Ok(iter) => iter.map(|n| n.to_string_lossy().into_owned()).collect(),
        Err(e) => {
            // ENOTSUP/ENODATA means no xattr support or no xattrs, not an error
            if e.raw_os_error() == Some(libc::ENOTSUP)
                || e.raw_os_error() == Some(libc::ENODATA)
                || e.raw_os_error() == Some(libc::EOPNOTSUPP)
            {
                return Ok(vec![]);
            }
            return Err(Error::Xattr {
                path: path.to_path_buf(),
                message: format!("failed to list: {}", e),
            });
        }
    };

    for name in names {
        match xattr::get(path, &name) {
            Ok(Some(value)) => {
                xattrs.push(Xattr::new(name, value));
            }
            Ok(None) => {
                // xattr was removed between list and get, skip it
            }
            Err(e) => {
                if e.raw_os_error() != Some(libc::ENODATA) {
                    log::warn!("failed to read xattr {} on {:?}: {}", name, path, e);
                }
            }
        }
    }

    // sort for determinism
    xattrs.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(xattrs)
}

/// apply extended attributes to a path
pub fn apply_xattrs(path: &Path, xattrs: &[Xattr]) -> Result<()> {
    for xattr in xattrs {
        xattr::set(path, &xattr.name, &xattr.value).map_err(|e| Error::Xattr {
            path: path.to_path_buf(),
            message: format!("failed to set {}: {}", xattr.name, e),
        })?;
    }
    Ok(())
}

/// fsync a directory
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}
