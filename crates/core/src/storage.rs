//! Durable key-value storage.
//!
//! A single JSON object persisted under the user config directory backs
//! the credential store, the export preference map, and the
//! feature-enabled flag. Writes merge one key at a time so independent
//! consumers never clobber each other, and go through a temp-file rename
//! so a crash mid-write cannot truncate existing state.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{ExcerpoError, Result};

/// Storage key for the pairing credential.
pub const KEY_API_KEY: &str = "api_key";
/// Storage key for the category-keyed export preference map.
pub const KEY_PREFERENCES: &str = "preferences";
/// Storage key for the export feature flag.
pub const KEY_EXPORT_ENABLED: &str = "export_enabled";

/// File-backed key-value store.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Opens the default store under `<config_dir>/excerpo/storage.json`.
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| {
                ExcerpoError::Storage(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "could not determine config directory",
                ))
            })?
            .join("excerpo");

        Ok(Self { path: dir.join("storage.json") })
    }

    /// Opens a store at an explicit path. Used by tests and `--storage` overrides.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads one key, deserialized into `T`.
    ///
    /// A missing file, a missing key, and an explicit JSON null all read
    /// as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let map = self.load()?;
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Writes one key, preserving every other key in the file.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), serde_json::to_value(value)?);
        self.store(&map)
    }

    /// Removes one key, preserving every other key in the file.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.store(&map)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ExcerpoError::Storage(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("storage file {} is not a JSON object", self.path.display()),
            ))),
        }
    }

    fn store(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(map)?;
        let tmp_path = self.path.with_extension("json.part");
        fs::write(&tmp_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, perms)?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
