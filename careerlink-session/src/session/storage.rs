//! Session Storage - persisted credential store
//!
//! A small key-value store holding the token and the serialized user record
//! between process runs. Writes are last-write-wins.

use careerlink_core::{storage_error, CareerlinkResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Key of the opaque token issued by the authority
pub const TOKEN_KEY: &str = "token";
/// Key of the serialized user record
pub const USER_KEY: &str = "user";

/// Durable key-value storage for credentials
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> CareerlinkResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> CareerlinkResult<()>;
    fn remove(&self, key: &str) -> CareerlinkResult<()>;
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store, as if a previous run had written it
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> CareerlinkResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| storage_error!("Credential store lock poisoned", "memory_store"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CareerlinkResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| storage_error!("Credential store lock poisoned", "memory_store"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CareerlinkResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| storage_error!("Credential store lock poisoned", "memory_store"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk
pub struct FileCredentialStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store at `path`; the file itself is created on first write
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("Credential store at: {}", path.display());

        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> CareerlinkResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            storage_error!(
                format!("Failed to read {}: {}", self.path.display(), e),
                "file_store",
                e
            )
        })?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            storage_error!(
                format!("Credential file {} is corrupt: {}", self.path.display(), e),
                "file_store",
                e
            )
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> CareerlinkResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json_data = serde_json::to_string_pretty(entries)?;

        // Write then rename so readers never see a half-written file
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json_data).map_err(|e| {
            storage_error!(
                format!("Failed to write {}: {}", tmp_path.display(), e),
                "file_store",
                e
            )
        })?;
        restrict_permissions(&tmp_path);
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            storage_error!(
                format!("Failed to replace {}: {}", self.path.display(), e),
                "file_store",
                e
            )
        })?;

        debug!("Saved {} credential entries to {}", entries.len(), self.path.display());
        Ok(())
    }

    fn modify(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> CareerlinkResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| storage_error!("Credential store lock poisoned", "file_store"))?;

        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Discarding unreadable credential file: {}", e);
                BTreeMap::new()
            }
        };
        apply(&mut entries);
        self.write_entries(&entries)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> CareerlinkResult<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> CareerlinkResult<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> CareerlinkResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
