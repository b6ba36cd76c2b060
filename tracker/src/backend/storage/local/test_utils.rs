//! Test utilities for local storage.
//!
//! RAII-based cleanup: the temporary data directory is removed when the
//! `TestEnvironment` goes out of scope, even if the test panics.

use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

use super::connection::LocalConnection;
use super::local_repository::LocalRepository;

pub struct TestEnvironment {
    /// Kept alive so the directory survives until drop
    _temp_dir: TempDir,
    pub connection: LocalConnection,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("finance_tracker_test")?;
        let base_path = temp_dir.path().to_path_buf();
        let connection = LocalConnection::new(&base_path)?;

        Ok(TestEnvironment {
            _temp_dir: temp_dir,
            connection,
            base_path,
        })
    }

    pub fn repository(&self) -> LocalRepository {
        LocalRepository::new(self.connection.clone())
    }
}
