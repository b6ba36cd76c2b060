//! Shape migration for history entries written by older versions.
//!
//! Old entries carried `year` and `month` (a month name) instead of an ISO
//! `date`. They are rewritten to the first day of that month at midnight UTC,
//! and the legacy fields are dropped.

use log::warn;
use serde_json::{Map, Value};

const MONTH_NAMES: [[&str; 2]; 12] = [
    ["january", "enero"],
    ["february", "febrero"],
    ["march", "marzo"],
    ["april", "abril"],
    ["may", "mayo"],
    ["june", "junio"],
    ["july", "julio"],
    ["august", "agosto"],
    ["september", "septiembre"],
    ["october", "octubre"],
    ["november", "noviembre"],
    ["december", "diciembre"],
];

/// Parse a month given as a name (full or abbreviated to at least three
/// letters, English or Spanish) or as a number 1-12
pub fn parse_month(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().filter(|m| (1..=12).contains(m)).map(|m| m as u32),
        Value::String(s) => {
            let name = s.trim().trim_end_matches('.').to_lowercase();
            if let Ok(number) = name.parse::<u32>() {
                return (1..=12).contains(&number).then_some(number);
            }
            if name.chars().count() < 3 {
                return None;
            }
            MONTH_NAMES
                .iter()
                .position(|names| names.iter().any(|full| full.starts_with(name.as_str())))
                .map(|index| index as u32 + 1)
        }
        _ => None,
    }
}

fn parse_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Rewrite one legacy entry in place. Returns true if it was migrated.
fn migrate_entry(entry: &mut Map<String, Value>) -> bool {
    if entry.contains_key("date") {
        return false;
    }
    let (Some(year_value), Some(month_value)) = (entry.get("year"), entry.get("month")) else {
        return false;
    };
    let Some(year) = parse_year(year_value) else {
        warn!("Legacy history entry has an unreadable year: {}", year_value);
        return false;
    };
    let month = parse_month(month_value).unwrap_or_else(|| {
        warn!("Legacy history entry has an unknown month {}; using January", month_value);
        1
    });

    let date = format!("{:04}-{:02}-01T00:00:00.000Z", year, month);
    entry.insert("date".to_string(), Value::String(date));
    entry.remove("year");
    entry.remove("month");
    true
}

/// Migrate every legacy entry in a raw history list.
/// Returns the number of entries rewritten.
pub fn migrate_legacy_history(entries: &mut [Value]) -> usize {
    entries
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .map(migrate_entry)
        .filter(|migrated| *migrated)
        .count()
}
