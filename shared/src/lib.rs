use serde::{Deserialize, Serialize};
use std::fmt;

/// How a category's items affect the net balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceEffect {
    /// Increases balance (income, assets)
    Positive,
    /// Decreases balance (debts, expenses)
    Negative,
    /// Tracked but does not affect balance (retirement, pension)
    Informative,
}

impl fmt::Display for BalanceEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceEffect::Positive => write!(f, "POSITIVE"),
            BalanceEffect::Negative => write!(f, "NEGATIVE"),
            BalanceEffect::Informative => write!(f, "INFORMATIVE"),
        }
    }
}

/// A user-editable category that items reference by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identifier used as foreign key by items
    pub id: String,
    /// Display label
    pub name: String,
    pub effect: BalanceEffect,
    /// Optional display hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Category {
    pub fn new(id: &str, name: &str, effect: BalanceEffect, color: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            effect,
            color: color.map(str::to_string),
        }
    }
}

/// The seed category set, in display order
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("investments", "Investments", BalanceEffect::Positive, Some("green")),
        Category::new("liquid_cash", "Liquid Cash", BalanceEffect::Positive, Some("blue")),
        Category::new("pending_payments", "Pending Payments", BalanceEffect::Positive, Some("yellow")),
        Category::new("debt", "Debt", BalanceEffect::Negative, Some("red")),
        Category::new("retirement", "Retirement", BalanceEffect::Informative, Some("purple")),
    ]
}

/// A single categorized monetary line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceItem {
    pub id: String,
    pub name: String,
    /// Signed amount; negative values are contra-entries
    pub amount: f64,
    /// References `Category::id`
    pub category: String,
}

/// Totals derived from items and categories. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinanceTotals {
    /// Sum of POSITIVE categories
    pub income: f64,
    /// Sum of NEGATIVE categories
    pub expenses: f64,
    /// income - expenses
    pub balance: f64,
    /// Sum of INFORMATIVE categories
    pub informative: f64,
}

/// Immutable point-in-time snapshot of totals.
///
/// Field names are fixed by the storage and wire format:
/// income → savings, expenses → debt, informative → retirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// ISO-8601 timestamp
    pub date: String,
    pub savings: f64,
    pub debt: f64,
    pub balance: f64,
    pub retirement: f64,
}

/// Kind of change recorded in an item revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionType {
    Create,
    Update,
    Delete,
}

/// Server-maintained audit record of a single change to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRevision {
    pub item_id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub revision_type: RevisionType,
    pub name: String,
    pub amount: f64,
    pub category: String,
    /// Backend-specific record, opaque to the client
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// One chart-ready point, oldest first when in a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Short month label, or "---" when the date does not parse
    pub label: String,
    pub date: String,
    #[serde(rename = "Balance")]
    pub balance: f64,
    #[serde(rename = "Debt")]
    pub debt: f64,
    #[serde(rename = "Retirement")]
    pub retirement: f64,
}

/// Body of `GET /items` and `POST /items`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsPayload {
    #[serde(default)]
    pub items: Vec<FinanceItem>,
}

/// Body of `GET /history` and `POST /history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPayload {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Body of `GET /items/{id}/history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemHistoryPayload {
    #[serde(default)]
    pub history: Vec<ItemRevision>,
}

/// Body of `GET /categories` and `POST /categories`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoriesPayload {
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Error body returned by the REST server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
