// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for weft hosts (uses the platform config dir).
#![forbid(unsafe_code)]

use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use weft_app_core::{validate_key, ConfigError, ConfigStore};

/// Stores config blobs as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at the user config directory (e.g. `~/.config/weft`).
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("dev", "flyingrobots", "weft")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Self::at(dirs.config_dir())
    }

    /// Store rooted at `dir`, created if missing.
    pub fn at(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = dir.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory the blobs live in.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ConfigError> {
        validate_key(key)?;
        Ok(self.base.join(format!("{key}.json")))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.base)?;
        // Staged write, then rename over the previous blob.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, data)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("weft-config-fs-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn blobs_round_trip_through_files() {
        let dir = scratch("round-trip");
        let store = FsConfigStore::at(&dir).unwrap();
        store.save_raw("session-default", b"{}").unwrap();
        assert_eq!(store.load_raw("session-default").unwrap(), b"{}");
        assert!(dir.join("session-default.json").is_file());
        assert!(!dir.join("session-default.json.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_blob_is_not_found() {
        let dir = scratch("missing");
        let store = FsConfigStore::at(&dir).unwrap();
        assert!(matches!(store.load_raw("absent"), Err(ConfigError::NotFound)));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let dir = scratch("keys");
        let store = FsConfigStore::at(&dir).unwrap();
        assert!(matches!(
            store.save_raw("../outside", b"x"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(matches!(store.load_raw("a/b"), Err(ConfigError::InvalidKey(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
