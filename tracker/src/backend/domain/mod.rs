//! # Domain Module
//!
//! Business logic for the finance tracker, independent of storage and of any
//! user interface.
//!
//! ## Module Organization
//!
//! - **calculator**: totals, snapshots and chart series (pure functions)
//! - **categories**: rules for adding, updating and deleting categories
//! - **worker**: background thread running the calculator
//! - **finance_data_service**: cached state, optimistic writes, derived data
//! - **revision_log**: server-side audit trail of item changes
//!
//! ## Core Concepts
//!
//! - **Balance effect**: whether a category adds to, subtracts from, or is
//!   tracked beside the balance
//! - **Snapshot**: a dated copy of the totals prepended to the history
//! - **Optimistic update**: the cache changes before the repository confirms

pub mod calculator;
pub mod categories;
pub mod finance_data_service;
pub mod revision_log;
pub mod worker;

#[cfg(test)]
pub mod test_utils;

pub use categories::CategoryError;
pub use finance_data_service::{
    DerivedState, FinanceDataService, MutationFailure, ResourceKind, ResourceStatus, SessionGate,
};
pub use revision_log::RevisionLog;
