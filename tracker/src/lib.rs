//! Finance tracker core: categorized items, derived totals, history
//! snapshots, and storage either on local disk or behind an HTTP API.

pub mod backend;
pub mod config;

pub use backend::{create_router, initialize_backend, AppState};
pub use config::AppConfig;
