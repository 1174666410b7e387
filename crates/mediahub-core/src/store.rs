//! Settings store: load, validate, and atomically replace the settings document.
//!
//! # Snapshot Model
//!
//! Readers get an `Arc<Settings>` from [`SettingsStore::current`]; the snapshot
//! is never mutated in place. [`SettingsStore::replace`] validates a complete
//! candidate, persists it with write-temp-then-rename, and only then swaps
//! the in-memory pointer. Readers block only for the pointer swap.
//!
//! Replacements are serialized by an async mutex so two writers can never
//! interleave their temp-file writes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::settings::Settings;

/// Owns the current settings snapshot and its persisted document.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Arc<Settings>>,
    replace_lock: Mutex<()>,
}

impl SettingsStore {
    /// Loads the document at `path`, falling back to the compiled-in default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupt`] if the document exists but cannot be
    /// read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        Self::load_with_defaults(path, None)
    }

    /// Loads the document at `path`, then `defaults`, then the compiled-in default.
    ///
    /// Only a document that exists and is unreadable is an error; a missing
    /// document is not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupt`] if either document exists but cannot be
    /// read or parsed.
    pub fn load_with_defaults(path: impl Into<PathBuf>, defaults: Option<&Path>) -> Result<Self> {
        let path = path.into();

        let settings = if let Some(settings) = read_document(&path)? {
            tracing::info!(path = %path.display(), "Loaded settings");
            settings
        } else if let Some(settings) = defaults.map(read_document).transpose()?.flatten() {
            tracing::info!(
                path = %path.display(),
                "Settings not found; loaded defaults document"
            );
            settings
        } else {
            tracing::info!(
                path = %path.display(),
                "Settings not found; using compiled-in defaults"
            );
            Settings::default()
        };

        if let Err(e) = settings.validate() {
            // Served as-is; the next replace must pass validation.
            tracing::warn!(error = %e, "Loaded settings do not pass validation");
        }

        Ok(Self::with_settings(path, settings))
    }

    /// Creates a store around an existing snapshot without touching disk.
    #[must_use]
    pub fn with_settings(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(settings)),
            replace_lock: Mutex::new(()),
        }
    }

    /// Path of the persisted document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the latest valid snapshot. Never performs I/O.
    #[must_use]
    pub fn current(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Validates `candidate`, persists it, and makes it the current snapshot.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the candidate is rejected (nothing changes).
    /// - [`Error::Persist`] if the document cannot be written (the in-memory
    ///   snapshot is unchanged).
    pub async fn replace(&self, candidate: Settings) -> Result<Arc<Settings>> {
        candidate.validate()?;

        let _guard = self.replace_lock.lock().await;

        let bytes = serde_json::to_vec_pretty(&candidate)
            .map_err(|e| Error::internal(format!("failed to serialize settings: {e}")))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| Error::internal(format!("settings writer task failed: {e}")))??;

        let snapshot = Arc::new(candidate);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);

        tracing::info!(
            path = %self.path.display(),
            apps = snapshot.apps.len(),
            "Settings replaced"
        );
        Ok(snapshot)
    }
}

fn read_document(path: &Path) -> Result<Option<Settings>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::ConfigCorrupt {
                path: path.display().to_string(),
                message: format!("unreadable: {e}"),
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::ConfigCorrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_else(|| "settings.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::persist(format!("create {}", parent.display()), e))?;
    }

    let tmp = temp_path(path);
    let written = (|| -> io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.write_all(b"\n")?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(Error::persist(format!("write {}", tmp.display()), e));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::persist(format!("rename {} -> {}", tmp.display(), path.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_a_sibling() {
        let tmp = temp_path(Path::new("/etc/mediahub/config.json"));
        assert_eq!(tmp, PathBuf::from("/etc/mediahub/config.json.tmp"));
    }

    #[test]
    fn current_never_touches_disk() {
        let store = SettingsStore::with_settings("/nonexistent/config.json", Settings::empty());
        assert!(store.current().apps.is_empty());
    }
}
