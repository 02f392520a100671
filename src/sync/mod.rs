//! Replication of the encounter document through the room metadata store.
//!
//! - `migrations`: raw-JSON schema upgrades
//! - `validate`: untrusted value → typed document
//! - `store`: the room store seam and its implementations
//! - `scheduler`: token-based timers for the debounced writer
//! - `service`: the per-room revision-gated sync loop

pub mod migrations;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod validate;
