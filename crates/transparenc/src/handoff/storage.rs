use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use dashmap::DashMap;
use tracing::{debug, warn};

/// String key-value storage in the shape of the browser storages.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove_item(&self, key: &str) -> anyhow::Result<()>;
}

/// Per-process storage; gone when the process exits.
#[derive(Clone, Default)]
pub struct SessionStorage {
    items: Arc<DashMap<String, String>>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for SessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|v| v.clone())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// JSON-file storage that survives restarts. Every write rewrites the file.
pub struct LocalStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl LocalStorage {
    /// Loads `path` if it exists. An unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed local storage at {}: {}", path.display(), e);
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, items: Mutex::new(items) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!("Local storage written to {}", self.path.display());
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| anyhow::anyhow!("Local storage lock poisoned"))
    }
}

impl KeyValueStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().ok().and_then(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut items = self.lock()?;
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        let mut items = self.lock()?;
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }
}
