//! Durable storage backed by a single JSON file.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::Storage;
use crate::error::{Error, Result};

/// Stores all items as one JSON object in a file.
///
/// Each write rewrites the whole file through a sibling temporary file
/// that is renamed over the target. A file that no longer parses is
/// discarded by the next write, so `set_item` and `remove_item` keep
/// working after a torn write. Suitable for the handful of keys
/// this crate persists, not as a general-purpose database.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    /// Creates storage at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if items.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Storage(format!(
                    "failed to remove {}: {e}",
                    self.path.display()
                ))),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let serialized = serde_json::to_string_pretty(items)?;
        let tmp = self.temp_path();
        fs::write(&tmp, serialized)
            .map_err(|e| Error::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("storage"), ToOwned::to_owned);
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| Error::Storage("file storage lock poisoned".into()))?;
        let mut items = match self.read_all() {
            Ok(items) => items,
            Err(Error::Json(e)) => {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt storage file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut items);
        self.write_all(&items)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| Error::Storage("file storage lock poisoned".into()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.modify(|items| {
            items.remove(key);
        })
    }
}
