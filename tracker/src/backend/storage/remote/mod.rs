//! Remote storage: the finance HTTP API reached with `reqwest`.

pub mod auth;
pub mod errors;
pub mod remote_repository;

pub use auth::{AuthSession, StaticToken};
pub use errors::ApiError;
pub use remote_repository::RemoteRepository;
