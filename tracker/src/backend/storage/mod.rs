//! # Storage Module
//!
//! Handles persistence of items, categories and history snapshots.
//!
//! The domain layer only sees the [`FinanceRepository`] port. Two adapters
//! implement it:
//!
//! - **local**: JSON documents in the data directory, seeded with example
//!   data on first use
//! - **remote**: the finance HTTP API, authenticated with a bearer token
//!
//! The adapter is chosen once per session from [`StorageConfig`] by
//! [`build_repository`] and handed to the services that need it.

pub mod local;
pub mod remote;
pub mod traits;

use anyhow::Result;
use log::info;
use std::sync::Arc;

pub use local::{LocalConnection, LocalRepository};
pub use remote::{ApiError, AuthSession, RemoteRepository, StaticToken};
pub use traits::FinanceRepository;

use crate::config::{ConfigError, StorageConfig, StorageMode};

/// Build the repository selected by `config`.
///
/// `auth` is only consulted in remote mode.
pub fn build_repository(config: &StorageConfig, auth: Arc<dyn AuthSession>) -> Result<Arc<dyn FinanceRepository>> {
    match config.mode {
        StorageMode::Local => {
            let connection = match &config.data_directory {
                Some(dir) => LocalConnection::new(dir)?,
                None => LocalConnection::new_default()?,
            };
            info!("Using local storage in {}", connection.base_directory().display());
            Ok(Arc::new(LocalRepository::new(connection)))
        }
        StorageMode::Remote => {
            let url = config.api_url.as_deref().ok_or(ConfigError::MissingApiUrl)?;
            Ok(Arc::new(RemoteRepository::new(url, auth)?))
        }
    }
}
