//! # Backend Module
//!
//! Contains all non-UI logic for the finance tracker.
//!
//! This module brings together:
//! - **Domain**: totals, snapshots, category rules and the data service
//! - **Storage**: the repository port with local and remote adapters
//! - **IO**: the REST server exposing the repository over HTTP
//!
//! ## Architecture
//!
//! ```text
//! CLI / UI
//!     ↓
//! Domain (FinanceDataService, calculator, worker)
//!     ↓
//! Storage (FinanceRepository: local files | remote API)
//!                                              ↑
//!                          IO (REST server over local files)
//! ```

pub mod domain;
pub mod io;
pub mod storage;

use anyhow::Result;
use axum::{
    http::Method,
    middleware,
    routing::{delete, get},
    Router,
};
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::backend::domain::RevisionLog;
use crate::backend::storage::{FinanceRepository, LocalConnection, LocalRepository};
use crate::config::AppConfig;

/// Shared state of the REST server
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn FinanceRepository>,
    /// Item revisions; without it item history falls back to the repository
    pub revisions: Option<RevisionLog>,
    /// Bearer token every request must carry, if set
    pub auth_token: Option<String>,
    /// Serializes item writes so revision diffs see a consistent "before"
    pub item_writes: Arc<Mutex<()>>,
    /// Local storage rewrites a whole document per write; these keep
    /// concurrent requests from losing each other's changes
    pub history_writes: Arc<Mutex<()>>,
    pub category_writes: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(repository: Arc<dyn FinanceRepository>, revisions: Option<RevisionLog>, auth_token: Option<String>) -> Self {
        Self {
            repository,
            revisions,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            item_writes: Arc::new(Mutex::new(())),
            history_writes: Arc::new(Mutex::new(())),
            category_writes: Arc::new(Mutex::new(())),
        }
    }
}

/// Set up local storage and the revision log for the REST server
pub fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!("Setting up local storage");
    let connection = match &config.storage.data_directory {
        Some(dir) => LocalConnection::new(dir)?,
        None => LocalConnection::new_default()?,
    };
    info!("Serving data from {}", connection.base_directory().display());

    let revisions = RevisionLog::new(connection.clone());
    let repository = Arc::new(LocalRepository::new(connection));

    info!("Setting up application state");
    Ok(AppState::new(repository, Some(revisions), config.server.auth_token.clone()))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/items", get(io::list_items).post(io::save_items))
        .route("/items/:id", delete(io::delete_item))
        .route("/items/:id/history", get(io::get_item_history))
        .route("/history", get(io::list_history).post(io::save_history))
        .route("/history/:id", delete(io::delete_history_item))
        .route("/categories", get(io::list_categories).post(io::save_categories))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), io::require_bearer_token))
        .layer(cors)
        .with_state(app_state)
}
