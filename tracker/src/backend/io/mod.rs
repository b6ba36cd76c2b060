//! # IO Module
//!
//! Interface layer exposing the repository contract over HTTP.
//!
//! The REST server speaks exactly the protocol the remote repository
//! adapter consumes, so a tracker configured for remote storage can point at
//! another tracker running `serve`.

pub mod rest;

pub use rest::*;
