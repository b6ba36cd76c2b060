//! Pure finance calculations.
//!
//! Everything in this module is side-effect free apart from reading the wall
//! clock in [`create_snapshot`]. The same functions run on the caller's thread
//! and inside the compute worker.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use shared::{BalanceEffect, Category, ChartPoint, FinanceItem, FinanceTotals, HistoryEntry};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// Label used for chart points whose date cannot be parsed
pub const INVALID_DATE_LABEL: &str = "---";

/// Roll items up into income/expenses/informative buckets.
///
/// Items whose category id does not resolve are skipped. Amounts are summed
/// as-is, so negative amounts reduce their bucket.
pub fn calculate_totals(items: &[FinanceItem], categories: &[Category]) -> FinanceTotals {
    let by_id: HashMap<&str, &Category> = categories.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut income = 0.0;
    let mut expenses = 0.0;
    let mut informative = 0.0;

    for item in items {
        let Some(category) = by_id.get(item.category.as_str()) else {
            continue;
        };
        match category.effect {
            BalanceEffect::Positive => income += item.amount,
            BalanceEffect::Negative => expenses += item.amount,
            BalanceEffect::Informative => informative += item.amount,
        }
    }

    FinanceTotals {
        income,
        expenses,
        balance: income - expenses,
        informative,
    }
}

/// Sum of the amounts of every item filed under `category_id`
pub fn get_category_sum(items: &[FinanceItem], category_id: &str) -> f64 {
    items
        .iter()
        .filter(|item| item.category == category_id)
        .map(|item| item.amount)
        .sum()
}

/// Build a new history entry from totals, stamped with the current time
pub fn create_snapshot(totals: &FinanceTotals) -> HistoryEntry {
    create_snapshot_at(totals, Utc::now())
}

/// Build a new history entry from totals at an explicit timestamp
pub fn create_snapshot_at(totals: &FinanceTotals, timestamp: DateTime<Utc>) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4().to_string(),
        date: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        savings: totals.income,
        debt: totals.expenses,
        balance: totals.balance,
        retirement: totals.informative,
    }
}

/// Reshape newest-first history into an oldest-first chart series
pub fn prepare_chart_data(history: &[HistoryEntry]) -> Vec<ChartPoint> {
    history
        .iter()
        .rev()
        .map(|entry| ChartPoint {
            label: chart_label(&entry.date),
            date: entry.date.clone(),
            balance: entry.balance,
            debt: entry.debt,
            retirement: entry.retirement,
        })
        .collect()
}

/// Parse a history date. Accepts RFC 3339 timestamps and plain `YYYY-MM-DD`.
pub fn parse_entry_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn chart_label(date: &str) -> String {
    match parse_entry_date(date) {
        Some(parsed) => parsed.format("%b").to_string(),
        None => INVALID_DATE_LABEL.to_string(),
    }
}

/// Sort history newest first. Entries with unparseable dates go last,
/// keeping their relative order.
pub fn sort_history_newest_first(history: &mut [HistoryEntry]) {
    history.sort_by(|a, b| {
        match (parse_entry_date(&a.date), parse_entry_date(&b.date)) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}
