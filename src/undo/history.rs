//! Per-room checkpoint stack with local persistence.
//!
//! Checkpoints are captured *before* a mutation, so the top of the stack is
//! the state to go back to. Restoring hands back a document with a revision
//! above the current one so the normal sync path treats it as a new change.
//! History is local to this client and never replicated.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;
use crate::game::state::EncounterState;
use crate::sync::migrations::MigrationRegistry;
use crate::sync::validate::parse_document;
use crate::undo::storage::LocalStorage;

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_PREFIX: &str = "swade-undo-";
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_MAX_AGE_MS: u64 = 90 * DAY_MS;
pub const DEFAULT_DUPLICATE_WINDOW_MS: u64 = 50;

/// History sizes tried in turn when a save hits the storage quota.
pub const QUOTA_RETRY_SIZES: [usize; 4] = [15, 10, 5, 2];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub state: EncounterState,
    pub description: String,
    /// Milliseconds since the epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOptions {
    pub capacity: usize,
    pub prefix: String,
    pub max_age_ms: u64,
    pub duplicate_window_ms: u64,
}

impl Default for UndoOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            prefix: DEFAULT_PREFIX.to_string(),
            max_age_ms: DEFAULT_MAX_AGE_MS,
            duplicate_window_ms: DEFAULT_DUPLICATE_WINDOW_MS,
        }
    }
}

/// Why `capture_checkpoint` did or did not push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Captured,
    /// Same revision as the top checkpoint: the last action changed nothing.
    Unchanged,
    /// Same description within the duplicate window.
    Duplicate,
}

pub struct UndoHistory<L: LocalStorage> {
    storage: L,
    options: UndoOptions,
    room_id: Option<String>,
    checkpoints: Vec<Checkpoint>,
    registry: MigrationRegistry,
}

impl<L: LocalStorage> UndoHistory<L> {
    pub fn new(storage: L, options: UndoOptions) -> Self {
        Self {
            storage,
            options,
            room_id: None,
            checkpoints: Vec::new(),
            registry: MigrationRegistry::default(),
        }
    }

    fn storage_key(&self) -> String {
        format!("{}{}", self.options.prefix, self.room_id.as_deref().unwrap_or("default"))
    }

    /// Switch to `room_id`, load its saved history, and sweep stale rooms.
    pub fn initialize_with_room(&mut self, room_id: &str, now_ms: u64) {
        self.room_id = Some(room_id.to_string());
        self.checkpoints = self.load();
        info!(
            "[undo] initialized for room {} with {} checkpoints",
            room_id,
            self.checkpoints.len()
        );
        self.sweep(now_ms);
    }

    fn load(&self) -> Vec<Checkpoint> {
        let Some(raw) = self.storage.get(&self.storage_key()) else {
            return Vec::new();
        };
        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) | Err(_) => {
                warn!("[undo] stored history unreadable; starting empty");
                return Vec::new();
            }
        };
        // saved states may predate the current schema
        entries
            .into_iter()
            .filter_map(|entry| {
                let description = entry.get("description")?.as_str()?.to_string();
                let timestamp = entry.get("timestamp")?.as_u64()?;
                let state = parse_document(entry.get("state")?, &self.registry)
                    .map_err(|e| warn!("[undo] dropping checkpoint {:?}: {}", description, e))
                    .ok()?;
                Some(Checkpoint {
                    state,
                    description,
                    timestamp,
                })
            })
            .collect()
    }

    /// Push a snapshot of `doc` unless the last action was a no-op or this
    /// is a rapid duplicate of the previous capture.
    pub fn capture_checkpoint(&mut self, doc: &EncounterState, description: &str, now_ms: u64) -> Capture {
        if let Some(top) = self.checkpoints.last() {
            if top.state.revision == doc.revision {
                debug!("[undo] skipping checkpoint: no state changes");
                return Capture::Unchanged;
            }
            if top.description == description && now_ms.saturating_sub(top.timestamp) < self.options.duplicate_window_ms {
                debug!("[undo] skipping checkpoint: rapid duplicate");
                return Capture::Duplicate;
            }
        }

        self.checkpoints.push(Checkpoint {
            state: doc.clone(),
            description: description.to_string(),
            timestamp: now_ms,
        });
        if self.checkpoints.len() > self.options.capacity {
            let excess = self.checkpoints.len() - self.options.capacity;
            self.checkpoints.drain(..excess);
        }
        self.save();
        debug!("[undo] captured checkpoint: {} (revision {})", description, doc.revision);
        Capture::Captured
    }

    /// Pop the top checkpoint and return its state re-stamped at
    /// `current_revision + 1`.
    pub fn perform_undo(&mut self, current_revision: u64) -> Option<EncounterState> {
        let checkpoint = self.checkpoints.pop()?;
        let mut state = checkpoint.state;
        info!(
            "[undo] restoring to: {} (revision {} -> {})",
            checkpoint.description,
            state.revision,
            current_revision + 1
        );
        state.revision = current_revision + 1;
        self.save();
        Some(state)
    }

    pub fn can_undo(&self) -> bool {
        !self.checkpoints.is_empty()
    }

    /// Description of the checkpoint an undo would restore.
    pub fn undo_description(&self) -> Option<&str> {
        self.checkpoints.last().map(|c| c.description.as_str())
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn clear(&mut self) {
        self.checkpoints.clear();
        self.save();
        info!("[undo] cleared all checkpoints");
    }

    /// Persist the stack, shrinking it when the storage quota is hit.
    fn save(&mut self) {
        if self.room_id.is_none() {
            return;
        }
        let key = self.storage_key();
        match self.write(&key) {
            Ok(()) => {}
            Err(StorageError::QuotaExceeded) => {
                warn!("[undo] storage quota exceeded, reducing checkpoint count");
                for size in QUOTA_RETRY_SIZES {
                    if self.checkpoints.len() > size {
                        let excess = self.checkpoints.len() - size;
                        self.checkpoints.drain(..excess);
                    }
                    match self.write(&key) {
                        Ok(()) => {
                            info!("[undo] reduced to {} checkpoints to fit storage", self.checkpoints.len());
                            return;
                        }
                        Err(err) => debug!("[undo] retry with {} checkpoints failed: {}", size, err),
                    }
                }
                error!("[undo] cannot save even minimal checkpoints, clearing history");
                self.checkpoints.clear();
            }
            Err(err) => error!("[undo] failed to save checkpoints: {}", err),
        }
    }

    fn write(&mut self, key: &str) -> Result<(), StorageError> {
        let data = serde_json::to_string(&self.checkpoints).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        self.storage.set(key, &data)
    }

    /// Remove other rooms' histories that are empty, unreadable, or whose
    /// newest checkpoint is older than the retention window. Returns the
    /// number of rooms removed.
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let current = self.storage_key();
        let stale: Vec<String> = self
            .storage
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&self.options.prefix) && *key != current)
            .filter(|key| {
                let newest = self
                    .storage
                    .get(key)
                    .and_then(|raw| serde_json::from_str::<Vec<Value>>(&raw).ok())
                    .and_then(|entries| entries.last().and_then(|c| c.get("timestamp")).and_then(Value::as_u64));
                match newest {
                    Some(ts) => now_ms.saturating_sub(ts) > self.options.max_age_ms,
                    None => true,
                }
            })
            .collect();

        for key in &stale {
            self.storage.remove(key);
        }
        if !stale.is_empty() {
            info!("[undo] cleaned up {} old room entries", stale.len());
        }
        stale.len()
    }

    pub fn storage(&self) -> &L {
        &self.storage
    }
}
