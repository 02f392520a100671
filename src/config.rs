//! Session configuration, passed by the host in the start payload.
//!
//! Every field is optional in JSON; missing ones take the defaults below.

use serde::{Deserialize, Serialize};

use crate::sync::service::{DEFAULT_DEBOUNCE_MS, SyncOptions};
use crate::undo::history::{
    DAY_MS, DEFAULT_CAPACITY, DEFAULT_DUPLICATE_WINDOW_MS, DEFAULT_MAX_AGE_MS, DEFAULT_PREFIX, UndoOptions,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Coalescing window for room writes.
    pub debounce_ms: u64,
    pub undo_capacity: usize,
    pub undo_prefix: String,
    pub undo_max_age_ms: u64,
    /// How often stale room histories are swept.
    pub sweep_interval_ms: u64,
    pub duplicate_window_ms: u64,
    /// Fixed shuffle seed; random when absent.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            undo_capacity: DEFAULT_CAPACITY,
            undo_prefix: DEFAULT_PREFIX.to_string(),
            undo_max_age_ms: DEFAULT_MAX_AGE_MS,
            sweep_interval_ms: DAY_MS,
            duplicate_window_ms: DEFAULT_DUPLICATE_WINDOW_MS,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            debounce_ms: self.debounce_ms,
        }
    }

    pub fn undo_options(&self) -> UndoOptions {
        UndoOptions {
            capacity: self.undo_capacity.max(1),
            prefix: self.undo_prefix.clone(),
            max_age_ms: self.undo_max_age_ms,
            duplicate_window_ms: self.duplicate_window_ms,
        }
    }
}
