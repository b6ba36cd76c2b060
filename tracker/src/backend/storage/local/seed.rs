//! First-run dataset returned by the local repository when nothing is stored yet.

use shared::{FinanceItem, HistoryEntry};

fn item(id: &str, name: &str, amount: f64, category: &str) -> FinanceItem {
    FinanceItem {
        id: id.to_string(),
        name: name.to_string(),
        amount,
        category: category.to_string(),
    }
}

fn entry(id: &str, date: &str, savings: f64, debt: f64, balance: f64, retirement: f64) -> HistoryEntry {
    HistoryEntry {
        id: id.to_string(),
        date: date.to_string(),
        savings,
        debt,
        balance,
        retirement,
    }
}

pub fn seed_items() -> Vec<FinanceItem> {
    vec![
        item("1", "Bank Loan", 300.0, "debt"),
        item("2", "Credit Card", 11625.0, "debt"),
        item("3", "Store Credit", 8452.0, "debt"),
        item("4", "Nu Account", 192258.0, "investments"),
        item("5", "Stock Market", 24620.41, "investments"),
        item("6", "Crypto", 71835.48, "investments"),
        item("7", "Bonds", 5271.96, "investments"),
        item("8", "Brokerage", 12289.0, "investments"),
        item("9", "Main Bank", 0.0, "liquid_cash"),
        item("10", "Wallet", 550.0, "liquid_cash"),
        item("11", "Vouchers", 657.0, "liquid_cash"),
        item("12", "401k / PPR", 4142.0, "retirement"),
        item("13", "Pension Fund", 751852.36, "retirement"),
    ]
}

/// Newest first
pub fn seed_history() -> Vec<HistoryEntry> {
    vec![
        entry("h28", "2026-01-30T12:00:00Z", 307481.85, 20377.00, 287104.85, 755994.36),
        entry("h27", "2026-01-15T12:00:00Z", 281624.28, 7792.36, 273831.92, 729657.98),
        entry("h26", "2025-12-30T12:00:00Z", 278796.97, 21650.00, 257146.97, 718502.00),
        entry("h25", "2025-12-15T12:00:00Z", 252657.33, 15800.00, 236857.33, 713864.00),
        entry("h24", "2025-12-01T12:00:00Z", 239259.97, 16500.00, 222759.97, 716182.00),
        entry("h23", "2025-11-30T12:00:00Z", 235073.54, 25000.00, 210073.54, 715925.00),
        entry("h22", "2025-11-15T12:00:00Z", 217324.87, 17000.00, 200324.87, 696584.00),
        entry("h21", "2025-10-30T12:00:00Z", 214436.11, 30000.00, 184436.11, 697584.00),
        entry("h20", "2025-10-15T12:00:00Z", 183341.00, 10800.00, 172541.00, 694223.00),
        entry("h19", "2025-09-30T12:00:00Z", 188242.00, 20817.00, 167425.00, 684184.00),
        entry("h18", "2025-07-30T12:00:00Z", 224615.00, 10251.00, 214364.00, 658923.47),
        entry("h17", "2025-06-30T12:00:00Z", 245282.00, 16132.00, 229150.00, 654756.68),
        entry("h16", "2025-05-30T12:00:00Z", 261282.00, 26132.00, 235150.00, 654756.68),
        entry("h15", "2025-04-30T12:00:00Z", 284702.80, 21934.00, 262768.80, 630756.68),
        entry("h14", "2025-03-30T12:00:00Z", 283819.75, 23264.00, 260555.75, 630756.68),
        entry("h13", "2025-02-28T12:00:00Z", 300272.00, 23163.00, 277109.00, 630256.68),
        entry("h12", "2025-02-14T12:00:00Z", 321944.00, 37930.00, 284014.00, 629256.68),
        entry("h11", "2025-01-30T12:00:00Z", 329560.55, 26358.00, 303202.55, 595000.00),
        entry("h10", "2024-12-30T12:00:00Z", 328802.88, 30258.00, 298544.88, 590000.00),
        entry("h9", "2024-12-15T12:00:00Z", 304681.00, 16020.00, 288661.00, 595123.00),
        entry("h8", "2024-11-30T12:00:00Z", 300715.10, 30520.00, 270195.10, 594053.23),
        entry("h7", "2024-11-15T12:00:00Z", 283922.73, 22150.00, 261772.73, 586515.40),
        entry("h6", "2024-10-30T12:00:00Z", 272252.00, 28950.00, 243302.00, 581850.30),
        entry("h5", "2024-09-30T12:00:00Z", 274227.34, 24500.00, 249727.34, 580593.27),
        entry("h4", "2024-08-30T12:00:00Z", 314654.00, 42900.00, 271754.00, 560593.27),
        entry("h3", "2024-07-30T12:00:00Z", 335798.96, 27100.00, 308698.96, 549603.38),
        entry("h2", "2024-06-30T12:00:00Z", 350969.52, 30258.00, 320711.52, 543453.79),
        entry("h1", "2024-05-30T12:00:00Z", 376596.36, 39394.00, 337202.36, 536884.00),
    ]
}
