//! Sync layer: HTTP access to a running review server.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{ReviewClient, SyncError};
