//! # Item Revision Log
//!
//! Server-side audit trail of item changes. Items are saved as full
//! replacements, so revisions are derived by diffing each save against what
//! was stored before it:
//!
//! - an id only in the new set is a `create`
//! - an id in both sets whose name, amount or category changed is an `update`
//! - an id only in the old set is a `delete`
//!
//! Explicit deletes are recorded directly. Revisions are stored as one JSON
//! array under [`REVISIONS_KEY`], oldest first. A log that cannot be read
//! is reported as an error and never rewritten.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde_json::Value;
use shared::{FinanceItem, ItemRevision, RevisionType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::backend::storage::local::connection::REVISIONS_KEY;
use crate::backend::storage::LocalConnection;

#[derive(Clone)]
pub struct RevisionLog {
    connection: LocalConnection,
    lock: Arc<Mutex<()>>,
}

fn revision(item: &FinanceItem, revision_type: RevisionType, timestamp: &str) -> ItemRevision {
    ItemRevision {
        item_id: item.id.clone(),
        timestamp: timestamp.to_string(),
        revision_type,
        name: item.name.clone(),
        amount: item.amount,
        category: item.category.clone(),
        raw: serde_json::to_value(item).unwrap_or(Value::Null),
    }
}

fn changed(before: &FinanceItem, after: &FinanceItem) -> bool {
    before.name != after.name || before.amount != after.amount || before.category != after.category
}

/// Revisions implied by replacing `previous` with `next`
pub fn diff_items(previous: &[FinanceItem], next: &[FinanceItem], at: DateTime<Utc>) -> Vec<ItemRevision> {
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let before: HashMap<&str, &FinanceItem> = previous.iter().map(|i| (i.id.as_str(), i)).collect();
    let after: HashMap<&str, &FinanceItem> = next.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut revisions = Vec::new();
    for item in next {
        match before.get(item.id.as_str()) {
            None => revisions.push(revision(item, RevisionType::Create, &timestamp)),
            Some(old) if changed(old, item) => revisions.push(revision(item, RevisionType::Update, &timestamp)),
            Some(_) => {}
        }
    }
    for item in previous {
        if !after.contains_key(item.id.as_str()) {
            revisions.push(revision(item, RevisionType::Delete, &timestamp));
        }
    }
    revisions
}

impl RevisionLog {
    pub fn new(connection: LocalConnection) -> Self {
        Self {
            connection,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn load(&self) -> Result<Vec<ItemRevision>> {
        let Some(raw) = self.connection.read_key(REVISIONS_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).with_context(|| format!("Invalid item revision log {}", REVISIONS_KEY))
    }

    async fn append(&self, revisions: Vec<ItemRevision>) -> Result<usize> {
        if revisions.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        let mut all = self.load()?;
        let count = revisions.len();
        all.extend(revisions);
        self.connection.write_key(REVISIONS_KEY, &serde_json::to_string(&all)?)?;
        debug!("Recorded {} item revision(s)", count);
        Ok(count)
    }

    /// Record the revisions implied by a full-replace save
    pub async fn record_save(&self, previous: &[FinanceItem], next: &[FinanceItem]) -> Result<usize> {
        self.append(diff_items(previous, next, Utc::now())).await
    }

    pub async fn record_delete(&self, item: &FinanceItem) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.append(vec![revision(item, RevisionType::Delete, &timestamp)]).await?;
        Ok(())
    }

    /// Revisions of one item, newest first
    pub async fn history(&self, item_id: &str) -> Result<Vec<ItemRevision>> {
        let _guard = self.lock.lock().await;
        let mut revisions: Vec<ItemRevision> = self.load()?.into_iter().filter(|r| r.item_id == item_id).collect();
        revisions.reverse();
        Ok(revisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::local::test_utils::TestEnvironment;

    fn item(id: &str, name: &str, amount: f64) -> FinanceItem {
        FinanceItem {
            id: id.to_string(),
            name: name.to_string(),
            amount,
            category: "investments".to_string(),
        }
    }

    #[test]
    fn test_diff_detects_create_update_delete() {
        let previous = vec![item("1", "Bonds", 100.0), item("2", "Loan", 50.0), item("3", "Cash", 10.0)];
        let next = vec![item("1", "Bonds", 100.0), item("2", "Loan", 75.0), item("4", "Stocks", 5.0)];

        let revisions = diff_items(&previous, &next, Utc::now());

        let summary: Vec<(&str, RevisionType)> = revisions
            .iter()
            .map(|r| (r.item_id.as_str(), r.revision_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("2", RevisionType::Update),
                ("4", RevisionType::Create),
                ("3", RevisionType::Delete),
            ]
        );
        assert_eq!(revisions[0].amount, 75.0);
        assert_eq!(revisions[2].name, "Cash");
    }

    #[test]
    fn test_identical_saves_produce_nothing() {
        let items = vec![item("1", "Bonds", 100.0)];
        assert!(diff_items(&items, &items, Utc::now()).is_empty());
    }

    #[test]
    fn test_raw_holds_item_json() {
        let revisions = diff_items(&[], &[item("9", "Gold", 12.5)], Utc::now());
        assert_eq!(revisions[0].raw["name"], "Gold");
        assert_eq!(revisions[0].raw["amount"], 12.5);
        assert!(revisions[0].timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_history_is_per_item_and_newest_first() {
        let env = TestEnvironment::new().unwrap();
        let log = RevisionLog::new(env.connection.clone());

        log.record_save(&[], &[item("1", "Bonds", 1.0), item("2", "Loan", 2.0)]).await.unwrap();
        log.record_save(&[item("1", "Bonds", 1.0)], &[item("1", "Bonds", 3.0)]).await.unwrap();
        log.record_delete(&item("2", "Loan", 2.0)).await.unwrap();

        let history = log.history("1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].revision_type, RevisionType::Update);
        assert_eq!(history[1].revision_type, RevisionType::Create);

        let loan = log.history("2").await.unwrap();
        assert_eq!(loan[0].revision_type, RevisionType::Delete);
        assert!(log.history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_log_is_not_overwritten() {
        let env = TestEnvironment::new().unwrap();
        env.connection.write_key(REVISIONS_KEY, "{{{").unwrap();
        let log = RevisionLog::new(env.connection.clone());

        assert!(log.history("1").await.is_err());
        assert!(log.record_delete(&item("1", "Bonds", 1.0)).await.is_err());
        assert!(log.record_save(&[], &[item("2", "Loan", 2.0)]).await.is_err());

        assert_eq!(env.connection.read_key(REVISIONS_KEY).unwrap().as_deref(), Some("{{{"));
    }
}
