//! In-memory repository for service tests.
//!
//! Supports failure injection per operation, holding loads open until
//! released, and slowing down writes.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{default_categories, Category, FinanceItem, HistoryEntry, ItemRevision, RevisionType};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::backend::storage::FinanceRepository;

#[derive(Default)]
pub struct MemoryRepository {
    pub items: Mutex<Vec<FinanceItem>>,
    pub categories: Mutex<Vec<Category>>,
    pub history: Mutex<Vec<HistoryEntry>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    load_gate: Mutex<Option<Arc<Semaphore>>>,
    write_delay: Mutex<Option<Duration>>,
}

pub fn item(id: &str, category: &str, amount: f64) -> FinanceItem {
    FinanceItem {
        id: id.to_string(),
        name: format!("Item {}", id),
        amount,
        category: category.to_string(),
    }
}

pub fn entry(id: &str, date: &str, balance: f64) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        date: date.to_string(),
        savings: balance,
        debt: 0.0,
        balance,
        retirement: 0.0,
    }
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Repository holding the default categories and the given items/history
    pub fn with_data(items: Vec<FinanceItem>, history: Vec<HistoryEntry>) -> Arc<Self> {
        let repo = Self::default();
        *repo.items.lock().unwrap() = items;
        *repo.categories.lock().unwrap() = default_categories();
        *repo.history.lock().unwrap() = history;
        Arc::new(repo)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Make `operation` (e.g. `"save_items"`) fail until cleared
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Block every load until `release_loads` is called
    pub fn hold_loads(&self) {
        *self.load_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_loads(&self) {
        if let Some(gate) = self.load_gate.lock().unwrap().take() {
            gate.close();
        }
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    /// Wait until `prefix` has been called at least `count` times
    pub async fn wait_for_calls(&self, prefix: &str, count: usize) {
        for _ in 0..500 {
            if self.call_count(prefix) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("{} was not called {} time(s); calls: {:?}", prefix, count, self.calls());
    }

    fn record(&self, call: String, operation: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(anyhow!("{} failed", operation));
        }
        Ok(())
    }

    async fn before_load(&self) {
        let gate = self.load_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
    }

    async fn before_write(&self) {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl FinanceRepository for MemoryRepository {
    async fn get_items(&self) -> Result<Vec<FinanceItem>> {
        self.record("get_items".to_string(), "get_items")?;
        self.before_load().await;
        Ok(self.items.lock().unwrap().clone())
    }

    async fn save_items(&self, items: &[FinanceItem]) -> Result<()> {
        self.before_write().await;
        self.record(format!("save_items:{}", items.len()), "save_items")?;
        *self.items.lock().unwrap() = items.to_vec();
        Ok(())
    }

    async fn delete_item(&self, id: &str) -> Result<()> {
        self.before_write().await;
        self.record(format!("delete_item:{}", id), "delete_item")?;
        self.items.lock().unwrap().retain(|i| i.id != id);
        Ok(())
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        self.record("get_categories".to_string(), "get_categories")?;
        self.before_load().await;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn save_categories(&self, categories: &[Category]) -> Result<()> {
        self.before_write().await;
        self.record(format!("save_categories:{}", categories.len()), "save_categories")?;
        *self.categories.lock().unwrap() = categories.to_vec();
        Ok(())
    }

    async fn get_history(&self) -> Result<Vec<HistoryEntry>> {
        self.record("get_history".to_string(), "get_history")?;
        self.before_load().await;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        self.before_write().await;
        self.record(format!("save_history:{}", history.len()), "save_history")?;
        *self.history.lock().unwrap() = history.to_vec();
        Ok(())
    }

    async fn delete_history_item(&self, id: &str) -> Result<()> {
        self.before_write().await;
        self.record(format!("delete_history_item:{}", id), "delete_history_item")?;
        self.history.lock().unwrap().retain(|h| h.id != id);
        Ok(())
    }

    async fn get_item_history(&self, item_id: &str) -> Result<Vec<ItemRevision>> {
        self.record(format!("get_item_history:{}", item_id), "get_item_history")?;
        Ok(vec![ItemRevision {
            item_id: item_id.to_string(),
            timestamp: "2025-01-01T00:00:00.000Z".to_string(),
            revision_type: RevisionType::Create,
            name: "Created".to_string(),
            amount: 0.0,
            category: "investments".to_string(),
            raw: serde_json::Value::Null,
        }])
    }
}
