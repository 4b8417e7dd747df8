use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// repository storage mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoMode {
    /// files stored verbatim with their real uid/gid/mode/xattrs
    Bare,
    /// files stored as a header followed by a zlib-raw compressed payload
    ArchiveZ2,
}

impl fmt::Display for RepoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoMode::Bare => write!(f, "bare"),
            RepoMode::ArchiveZ2 => write!(f, "archive-z2"),
        }
    }
}

/// repository configuration stored in config.toml
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// storage mode of this repository
    pub mode: RepoMode,
    /// optional parent repository used as a lookup fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<PathBuf>,
}

impl Config {
    /// create a new config with the given mode
    pub fn new(mode: RepoMode) -> Self {
        Self { mode, parent: None }
    }

    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::new(RepoMode::Bare);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.mode, RepoMode::Bare);
        assert!(loaded.parent.is_none());
    }

    #[test]
    fn test_config_archive_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::new(RepoMode::ArchiveZ2);
        config.parent = Some(PathBuf::from("/srv/base-repo"));
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("archive-z2"));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.mode, RepoMode::ArchiveZ2);
        assert_eq!(loaded.parent, Some(PathBuf::from("/srv/base-repo")));
    }

    #[test]
    fn test_config_missing_file() {
        let dir = tempdir().unwrap();
        let result = Config::load(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }
}
