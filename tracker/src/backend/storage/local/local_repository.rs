//! # Local Finance Repository
//!
//! File-backed implementation of [`FinanceRepository`] on top of
//! [`LocalConnection`]. Each collection is one JSON array stored under a
//! namespaced, versioned key.
//!
//! Reads never fail: a missing key yields the first-run seed dataset, and an
//! unreadable or corrupt document is logged and replaced by the seed as well.
//! Writes propagate their errors to the caller.
//!
//! Per-item revision history is not tracked locally; `get_item_history`
//! always returns an empty list.

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::{default_categories, Category, FinanceItem, HistoryEntry, ItemRevision};

use super::connection::{LocalConnection, CATEGORIES_KEY, HISTORY_KEY, ITEMS_KEY};
use super::migration::migrate_legacy_history;
use super::seed::{seed_history, seed_items};
use crate::backend::storage::FinanceRepository;

#[derive(Clone)]
pub struct LocalRepository {
    connection: LocalConnection,
}

impl LocalRepository {
    pub fn new(connection: LocalConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &LocalConnection {
        &self.connection
    }

    /// Read the raw document for `key`, falling back to `None` on I/O errors
    fn read_raw(&self, key: &str) -> Option<String> {
        match self.connection.read_key(key) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Error loading {} from local storage: {:#}", key, e);
                None
            }
        }
    }

    fn load_or_seed<T: DeserializeOwned>(&self, key: &str, seed: fn() -> Vec<T>) -> Vec<T> {
        let Some(raw) = self.read_raw(key) else {
            return seed();
        };
        match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                error!("Error parsing {} from local storage, using defaults: {}", key, e);
                seed()
            }
        }
    }

    fn store<T: Serialize>(&self, key: &str, values: &[T]) -> Result<()> {
        let json = serde_json::to_string(values)?;
        self.connection.write_key(key, &json)
    }

    fn load_history(&self) -> Vec<HistoryEntry> {
        let Some(raw) = self.read_raw(HISTORY_KEY) else {
            return seed_history();
        };
        let mut entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error parsing history from local storage, using defaults: {}", e);
                return seed_history();
            }
        };

        let migrated = migrate_legacy_history(&mut entries);

        let history: Vec<HistoryEntry> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<HistoryEntry>(entry) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Failed to parse history entry: {}. Skipping.", e);
                    None
                }
            })
            .collect();

        if migrated > 0 {
            info!("Migrated {} legacy history entries", migrated);
            if let Err(e) = self.store(HISTORY_KEY, &history) {
                warn!("Failed to persist migrated history: {:#}", e);
            }
        }

        history
    }
}

#[async_trait]
impl FinanceRepository for LocalRepository {
    async fn get_items(&self) -> Result<Vec<FinanceItem>> {
        Ok(self.load_or_seed(ITEMS_KEY, seed_items))
    }

    async fn save_items(&self, items: &[FinanceItem]) -> Result<()> {
        self.store(ITEMS_KEY, items)
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        let mut items = self.load_or_seed(ITEMS_KEY, seed_items);
        items.retain(|item| item.id != id);
        self.store(ITEMS_KEY, &items)
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        Ok(self.load_or_seed(CATEGORIES_KEY, default_categories))
    }

    async fn save_categories(&self, categories: &[Category]) -> Result<()> {
        self.store(CATEGORIES_KEY, categories)
    }

    async fn get_history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.load_history())
    }

    async fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        self.store(HISTORY_KEY, history)
    }

    async fn delete_history_item(&self, id: &str) -> Result<()> {
        let mut history = self.load_history();
        history.retain(|entry| entry.id != id);
        self.store(HISTORY_KEY, &history)
    }

    async fn get_item_history(&self, _item_id: &str) -> Result<Vec<ItemRevision>> {
        Ok(Vec::new())
    }
}
