//! Local durable storage: a JSON key-value store in the data directory.

pub mod connection;
pub mod local_repository;
pub mod migration;
pub mod seed;

#[cfg(test)]
pub mod test_utils;

pub use connection::LocalConnection;
pub use local_repository::LocalRepository;
