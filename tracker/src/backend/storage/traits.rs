//! # Storage Traits
//!
//! This module defines the repository port that lets the domain layer run
//! against local storage or a remote API without modification.

use anyhow::Result;
use async_trait::async_trait;
use shared::{Category, FinanceItem, HistoryEntry, ItemRevision};

/// Persistence contract for items, categories and history.
///
/// Saves are full replacements of the collection: implementations must
/// overwrite what is stored, never merge.
#[async_trait]
pub trait FinanceRepository: Send + Sync {
    /// Retrieve all items
    async fn get_items(&self) -> Result<Vec<FinanceItem>>;

    /// Replace the stored item set
    async fn save_items(&self, items: &[FinanceItem]) -> Result<()>;

    /// Permanently delete a single item
    async fn delete_item(&self, id: &str) -> Result<()>;

    /// Retrieve categories in display order
    async fn get_categories(&self) -> Result<Vec<Category>>;

    /// Replace the stored category list
    async fn save_categories(&self, categories: &[Category]) -> Result<()>;

    /// Retrieve history snapshots
    async fn get_history(&self) -> Result<Vec<HistoryEntry>>;

    /// Replace the stored history
    async fn save_history(&self, history: &[HistoryEntry]) -> Result<()>;

    /// Delete a single history snapshot
    async fn delete_history_item(&self, id: &str) -> Result<()>;

    /// Retrieve the audit trail of one item. Backends without revision
    /// tracking return an empty list.
    async fn get_item_history(&self, item_id: &str) -> Result<Vec<ItemRevision>>;
}
