//! Revision-gated replication of the encounter document.
//!
//! Outbound: every committed change bumps `revision` and (re)arms a debounce
//! timer; when it fires the document is written only if it is strictly
//! newer than what the room already holds. Inbound: a validated, migrated
//! document replaces the local one only when its revision is strictly
//! greater. Concurrent edits resolve last-writer-wins by revision; the
//! losing edit is dropped without notice.

use log::{debug, error, info, warn};
use rand::Rng;
use serde_json::Value;

use crate::error::{EngineError, StoreError, ValidationError};
use crate::game::commands::{Command, apply};
use crate::game::state::{EncounterState, initialize_empty_state};
use crate::sync::migrations::MigrationRegistry;
use crate::sync::scheduler::{CancelToken, Scheduler};
use crate::sync::store::RoomStore;
use crate::sync::validate::{check_structure, parse_document};

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub debounce_ms: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// What `start` found in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Loaded,
    Created,
    /// The stored value was not a state document at all and was replaced.
    Replaced(ValidationError),
    /// The stored document has the right shape but this build cannot read
    /// it. The room is left alone; the local copy starts empty at the
    /// stored revision, so only a later local edit will overwrite it.
    Unreadable { revision: u64, error: ValidationError },
}

/// What a debounced flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Written { revision: u64 },
    /// The room already holds this revision or a newer one.
    Skipped { local: u64, remote: u64 },
    Failed(StoreError),
}

/// What happened to a change notification from the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Applied { revision: u64 },
    /// Incoming revision not newer than local: an echo or a late delivery.
    Stale { incoming: u64, local: u64 },
    Invalid(ValidationError),
    /// The key was removed from the room.
    Absent,
    /// The service is not running.
    Ignored,
}

impl Inbound {
    pub fn label(&self) -> &'static str {
        match self {
            Inbound::Applied { .. } => "applied",
            Inbound::Stale { .. } => "stale",
            Inbound::Invalid(_) => "invalid",
            Inbound::Absent => "absent",
            Inbound::Ignored => "ignored",
        }
    }
}

/// One room's replication session.
pub struct SyncService<S: RoomStore, T: Scheduler> {
    store: S,
    scheduler: T,
    options: SyncOptions,
    registry: MigrationRegistry,
    doc: EncounterState,
    pending: Option<CancelToken>,
    running: bool,
}

impl<S: RoomStore, T: Scheduler> SyncService<S, T> {
    pub fn new(store: S, scheduler: T, options: SyncOptions) -> Self {
        Self::with_registry(store, scheduler, options, MigrationRegistry::default())
    }

    pub fn with_registry(store: S, scheduler: T, options: SyncOptions, registry: MigrationRegistry) -> Self {
        Self {
            store,
            scheduler,
            options,
            registry,
            doc: EncounterState::default(),
            pending: None,
            running: false,
        }
    }

    /// Load the room's document, creating one when the room is empty or
    /// holds something that is not a state document.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<StartOutcome, StoreError> {
        let outcome = match self.store.read()? {
            Some(raw) => match check_structure(&raw) {
                Err(err) => {
                    warn!("[sync] stored state invalid ({}); initializing a fresh one", err);
                    self.initialize(rng)?;
                    StartOutcome::Replaced(err)
                }
                Ok(()) => match parse_document(&raw, &self.registry) {
                    Ok(doc) => {
                        self.doc = doc;
                        StartOutcome::Loaded
                    }
                    Err(error) => {
                        let revision = stored_revision(&raw);
                        warn!("[sync] cannot read stored revision {} ({}); room left untouched", revision, error);
                        self.doc = initialize_empty_state(rng);
                        self.doc.revision = revision;
                        StartOutcome::Unreadable { revision, error }
                    }
                },
            },
            None => {
                self.initialize(rng)?;
                StartOutcome::Created
            }
        };
        self.running = true;
        info!("[sync] started at revision {} ({:?})", self.doc.revision, outcome);
        Ok(outcome)
    }

    fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), StoreError> {
        self.doc = initialize_empty_state(rng);
        let value = to_value(&self.doc)?;
        self.store.write(value)
    }

    /// Cancel any pending write and stop reacting to the room.
    pub fn stop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
        self.running = false;
        debug!("[sync] stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn document(&self) -> &EncounterState {
        &self.doc
    }

    /// Apply an engine command and queue the result for writing.
    pub fn dispatch<R: Rng + ?Sized>(&mut self, cmd: &Command, rng: &mut R) -> Result<&EncounterState, EngineError> {
        let next = apply(&self.doc, cmd, rng)?;
        self.install(next);
        Ok(&self.doc)
    }

    /// Adopt a whole document as a local change (undo restores go through
    /// here). The revision is raised above the current one when needed.
    pub fn commit(&mut self, mut doc: EncounterState) -> &EncounterState {
        if doc.revision <= self.doc.revision {
            doc.revision = self.doc.revision + 1;
        }
        self.install(doc);
        &self.doc
    }

    fn install(&mut self, doc: EncounterState) {
        self.doc = doc;
        if self.running {
            self.arm_debounce();
        }
    }

    /// Reset the debounce window; only the latest document gets written.
    fn arm_debounce(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
        self.pending = Some(self.scheduler.schedule(self.options.debounce_ms));
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }

    /// A timer fired. Returns the flush result if the token was ours.
    pub fn on_timer(&mut self, token: CancelToken) -> Option<FlushOutcome> {
        if self.pending != Some(token) {
            return None;
        }
        self.pending = None;
        Some(self.flush())
    }

    /// Write the local document if it is newer than the room's copy. A
    /// stored value that is not a state document does not gate the write.
    pub fn flush(&mut self) -> FlushOutcome {
        let local = self.doc.revision;
        let remote = match self.store.read() {
            Ok(value) => value
                .filter(|raw| check_structure(raw).is_ok())
                .map(|raw| stored_revision(&raw)),
            Err(err) => {
                error!("[sync] failed to read room state: {}", err);
                return FlushOutcome::Failed(err);
            }
        };
        if let Some(remote) = remote.filter(|r| local <= *r) {
            debug!("[sync] skip write: local revision {} <= stored {}", local, remote);
            return FlushOutcome::Skipped { local, remote };
        }

        let result = to_value(&self.doc).and_then(|value| self.store.write(value));
        match result {
            Ok(()) => {
                debug!(
                    "[sync] wrote revision {} (round {}, phase {}, {} rows, {} remaining)",
                    local,
                    self.doc.round,
                    self.doc.phase,
                    self.doc.rows.len(),
                    self.doc.deck.remaining.len()
                );
                FlushOutcome::Written { revision: local }
            }
            Err(err) => {
                error!("[sync] failed to write room state: {}", err);
                FlushOutcome::Failed(err)
            }
        }
    }

    /// Remove the room key, returning the room to "never initialized".
    /// The local document is kept; a pending write is dropped.
    pub fn clear_room(&mut self) -> Result<(), StoreError> {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
        self.store.clear()?;
        info!("[sync] cleared room state");
        Ok(())
    }

    /// Handle a change notification carrying the room's current value.
    pub fn handle_remote_change(&mut self, raw: Option<Value>) -> Inbound {
        if !self.running {
            return Inbound::Ignored;
        }
        let Some(raw) = raw else {
            debug!("[sync] no state data in room");
            return Inbound::Absent;
        };
        let incoming = match parse_document(&raw, &self.registry) {
            Ok(doc) => doc,
            Err(err) => {
                warn!("[sync] ignoring invalid room state: {}", err);
                return Inbound::Invalid(err);
            }
        };
        let local = self.doc.revision;
        if incoming.revision <= local {
            debug!("[sync] stale update: incoming {} <= local {}", incoming.revision, local);
            return Inbound::Stale {
                incoming: incoming.revision,
                local,
            };
        }
        let revision = incoming.revision;
        self.doc = incoming;
        info!("[sync] applied remote revision {}", revision);
        Inbound::Applied { revision }
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn scheduler(&self) -> &T {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut T {
        &mut self.scheduler
    }
}

fn stored_revision(value: &Value) -> u64 {
    value.get("revision").and_then(Value::as_u64).unwrap_or(0)
}

fn to_value(doc: &EncounterState) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::Serialize(e.to_string()))
}
