//! # Local Connection
//!
//! Durable key-value storage on the local file system. Each key maps to one
//! JSON document at `{base_directory}/{key}.json`.
//!
//! ```text
//! data/
//! ├── finance_items_v3.json
//! ├── finance_history_v3.json
//! ├── finance_categories_v1.json
//! └── finance_item_revisions_v1.json   (server only)
//! ```
//!
//! Writes go to a temp file first and are renamed into place.

use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Storage key for the item collection
pub const ITEMS_KEY: &str = "finance_items_v3";
/// Storage key for history snapshots
pub const HISTORY_KEY: &str = "finance_history_v3";
/// Storage key for the category list
pub const CATEGORIES_KEY: &str = "finance_categories_v1";
/// Storage key for server-side item revisions
pub const REVISIONS_KEY: &str = "finance_item_revisions_v1";

const APP_DIRECTORY: &str = "finance-tracker";

/// LocalConnection owns the data directory and serializes writes to it
#[derive(Clone)]
pub struct LocalConnection {
    base_directory: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalConnection {
    /// Create a new connection rooted at `base_directory`, creating it if needed
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .with_context(|| format!("Failed to create data directory {}", base_path.display()))?;
            info!("Created data directory: {}", base_path.display());
        }

        Ok(Self {
            base_directory: base_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create a connection in the platform data directory
    pub fn new_default() -> Result<Self> {
        Self::new(Self::default_directory()?)
    }

    /// Platform data directory for the application, e.g. `~/.local/share/finance-tracker`
    pub fn default_directory() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine the platform data directory"))?;
        Ok(data_dir.join(APP_DIRECTORY))
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// File path backing a storage key
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.base_directory.join(format!("{}.json", key))
    }

    /// Read the raw document stored under `key`, or `None` if it was never written
    pub fn read_key(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Atomically replace the document stored under `key`
    pub fn write_key(&self, key: &str, contents: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Local storage write lock poisoned"))?;

        let path = self.key_path(key);
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to move {} into place", temp_path.display()))?;

        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    /// Remove the document stored under `key`, if any
    pub fn remove_key(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
