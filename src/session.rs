//! Room session: the sync service, the undo history and the shuffle RNG for
//! one room, bundled behind `start()` / `stop()`.
//!
//! The browser build keeps exactly one session in a `thread_local!` slot
//! for the lifetime of the worker; tests build sessions directly.

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::game::commands::{Command, apply};
use crate::game::state::EncounterState;
use crate::game::view::{EncounterView, Role, encounter_view};
use crate::sync::scheduler::{CancelToken, QueuedScheduler, ScheduleRequest, Scheduler};
use crate::sync::service::{FlushOutcome, Inbound, StartOutcome, SyncService};
use crate::sync::store::{BridgeStore, Outgoing, RoomStore};
use crate::undo::history::{Capture, UndoHistory};
use crate::undo::storage::{LocalStorage, MemoryStorage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoStatus {
    pub can_undo: bool,
    pub description: Option<String>,
    pub count: usize,
}

/// What a fired timer turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    Flushed(FlushOutcome),
    Swept(usize),
    /// Cancelled, already fired, or not ours.
    Ignored,
}

pub struct Session<S: RoomStore, L: LocalStorage> {
    room_id: String,
    sync: SyncService<S, QueuedScheduler>,
    undo: UndoHistory<L>,
    rng: ChaCha8Rng,
    config: SessionConfig,
    sweep_timer: Option<CancelToken>,
}

impl<S: RoomStore, L: LocalStorage> Session<S, L> {
    pub fn new(room_id: &str, store: S, storage: L, config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };
        Self {
            room_id: room_id.to_string(),
            sync: SyncService::new(store, QueuedScheduler::new(), config.sync_options()),
            undo: UndoHistory::new(storage, config.undo_options()),
            rng,
            config,
            sweep_timer: None,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Load undo history, sweep stale rooms, then load or create the room
    /// document. Arms the recurring sweep timer.
    pub fn start(&mut self, now_ms: u64) -> Result<StartOutcome, SessionError> {
        self.undo.initialize_with_room(&self.room_id, now_ms);
        let outcome = self.sync.start(&mut self.rng)?;
        self.arm_sweep();
        info!("[session] room {} started", self.room_id);
        Ok(outcome)
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.sweep_timer.take() {
            self.sync.scheduler_mut().cancel(token);
        }
        self.sync.stop();
        info!("[session] room {} stopped", self.room_id);
    }

    pub fn is_running(&self) -> bool {
        self.sync.is_running()
    }

    fn arm_sweep(&mut self) {
        self.sweep_timer = Some(self.sync.scheduler_mut().schedule(self.config.sweep_interval_ms));
    }

    pub fn document(&self) -> &EncounterState {
        self.sync.document()
    }

    /// Checkpoint the current document, then apply `cmd`. Nothing is
    /// checkpointed when the command fails.
    pub fn execute(&mut self, cmd: &Command, description: Option<&str>, now_ms: u64) -> Result<&EncounterState, SessionError> {
        if !self.is_running() {
            return Err(SessionError::NotStarted);
        }
        let next = apply(self.sync.document(), cmd, &mut self.rng)?;
        let description = description.map_or_else(|| cmd.describe(), str::to_string);
        if self.undo.capture_checkpoint(self.sync.document(), &description, now_ms) == Capture::Captured {
            debug!("[session] checkpoint before {}", description);
        }
        Ok(self.sync.commit(next))
    }

    /// Restore the most recent checkpoint as a new local change.
    pub fn undo(&mut self) -> Result<Option<&EncounterState>, SessionError> {
        if !self.is_running() {
            return Err(SessionError::NotStarted);
        }
        let current = self.sync.document().revision;
        Ok(match self.undo.perform_undo(current) {
            Some(state) => Some(self.sync.commit(state)),
            None => None,
        })
    }

    pub fn undo_status(&self) -> UndoStatus {
        UndoStatus {
            can_undo: self.undo.can_undo(),
            description: self.undo.undo_description().map(str::to_string),
            count: self.undo.len(),
        }
    }

    pub fn clear_history(&mut self) {
        self.undo.clear();
    }

    /// The host reports that timer `token` fired.
    pub fn on_timer(&mut self, token: CancelToken, now_ms: u64) -> TimerOutcome {
        if !self.sync.scheduler_mut().fire(token) {
            return TimerOutcome::Ignored;
        }
        if self.sweep_timer == Some(token) {
            let removed = self.undo.sweep(now_ms);
            self.arm_sweep();
            return TimerOutcome::Swept(removed);
        }
        match self.sync.on_timer(token) {
            Some(flush) => TimerOutcome::Flushed(flush),
            None => TimerOutcome::Ignored,
        }
    }

    /// Remove the room key. Other clients see the key disappear.
    pub fn clear_room(&mut self) -> Result<(), SessionError> {
        Ok(self.sync.clear_room()?)
    }

    /// Change notification from the room.
    pub fn receive(&mut self, raw: Option<Value>) -> Inbound {
        self.sync.handle_remote_change(raw)
    }

    pub fn view(&self, role: Role) -> EncounterView {
        encounter_view(self.sync.document(), role)
    }

    /// Timer requests and cancellations the host has not seen yet.
    pub fn take_timer_effects(&mut self) -> (Vec<ScheduleRequest>, Vec<CancelToken>) {
        let effects = self.sync.scheduler_mut().take_effects();
        (effects.schedule, effects.cancel)
    }

    pub fn sync(&self) -> &SyncService<S, QueuedScheduler> {
        &self.sync
    }
}

// ── Host bridge ────────────────────────────────────────────────────

/// Work the host must carry out after a request. Cancellations are applied
/// before new schedules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Effects {
    pub schedule: Vec<ScheduleRequest>,
    pub cancel: Vec<CancelToken>,
    /// Documents to write to the room key, oldest first.
    pub writes: Vec<Value>,
    /// Remove the room key before applying `writes`.
    pub clear: bool,
}

impl Effects {
    /// Fold in the leftovers of an older, stopped session.
    pub fn absorb(&mut self, older: Effects) {
        self.cancel.extend(older.cancel);
        let mut writes = older.writes;
        writes.append(&mut self.writes);
        self.writes = writes;
        self.clear |= older.clear;
    }
}

impl<L: LocalStorage> Session<BridgeStore, L> {
    /// Change notification forwarded by the host's room listener.
    pub fn receive_from_host(&mut self, raw: Option<Value>) -> Inbound {
        self.sync.store_mut().observe(raw.clone());
        self.receive(raw)
    }

    /// Drain the pending room writes only.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        self.sync.store_mut().drain_outbox()
    }

    /// Collect every pending timer change and room write.
    pub fn take_effects(&mut self) -> Effects {
        let (schedule, cancel) = self.take_timer_effects();
        let mut effects = Effects {
            schedule,
            cancel,
            ..Effects::default()
        };
        for out in self.drain_outbox() {
            match out {
                Outgoing::Write(doc) => effects.writes.push(doc),
                Outgoing::Clear => {
                    effects.writes.clear();
                    effects.clear = true;
                }
            }
        }
        effects
    }
}

pub type HostSession = Session<BridgeStore, Box<dyn LocalStorage>>;

thread_local! {
    static SESSION: RefCell<Option<HostSession>> = const { RefCell::new(None) };
}

/// Durable storage for the host build: `localStorage` in the browser,
/// memory elsewhere or when the browser refuses.
pub fn host_storage() -> Box<dyn LocalStorage> {
    #[cfg(target_arch = "wasm32")]
    {
        match crate::undo::storage::BrowserStorage::local() {
            Ok(storage) => return Box::new(storage),
            Err(err) => log::warn!("[session] localStorage unavailable ({}); undo history is session-only", err),
        }
    }
    Box::new(MemoryStorage::new())
}

/// Put `session` in the host slot. Returns the session it displaced,
/// still running; the caller stops it and forwards its effects.
pub fn install_session(session: HostSession) -> Option<HostSession> {
    SESSION.with(|slot| slot.borrow_mut().replace(session))
}

/// Remove the host session, if any.
pub fn take_session() -> Option<HostSession> {
    SESSION.with(|slot| slot.borrow_mut().take())
}

/// Run `f` against the host session.
pub fn with_session<F, R>(f: F) -> Result<R, SessionError>
where
    F: FnOnce(&mut HostSession) -> R,
{
    SESSION.with(|slot| match slot.borrow_mut().as_mut() {
        Some(session) => Ok(f(session)),
        None => Err(SessionError::NotStarted),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{ParticipantType, Phase};
    use crate::sync::store::MemoryRoom;
    use crate::undo::history::DAY_MS;

    const NOW: u64 = 1_700_000_000_000;

    fn config() -> SessionConfig {
        SessionConfig {
            seed: Some(17),
            ..SessionConfig::default()
        }
    }

    fn add(name: &str) -> Command {
        Command::CreateParticipant {
            name: name.into(),
            kind: ParticipantType::Pc,
            token_ids: Vec::new(),
            deal_now: false,
        }
    }

    fn started() -> Session<MemoryRoom, MemoryStorage> {
        let mut s = Session::new("room-1", MemoryRoom::new(), MemoryStorage::new(), config());
        s.start(NOW).unwrap();
        s
    }

    #[test]
    fn execute_requires_start() {
        let mut s = Session::new("room-1", MemoryRoom::new(), MemoryStorage::new(), config());
        assert_eq!(s.execute(&add("A"), None, NOW).unwrap_err(), SessionError::NotStarted);
    }

    #[test]
    fn execute_checkpoints_then_undo_restores() {
        let mut s = started();
        s.execute(&add("A"), None, NOW).unwrap();
        s.execute(&Command::DealRound, None, NOW + 100).unwrap();
        assert_eq!(s.document().phase, Phase::CardsDealt);
        assert_eq!(s.undo_status().description.as_deref(), Some("Deal round"));

        let restored = s.undo().unwrap().unwrap();
        assert_eq!(restored.phase, Phase::Setup);
        assert_eq!(restored.rows.len(), 1);
        assert_eq!(restored.revision, 3);
        assert_eq!(s.undo_status().count, 1);
    }

    #[test]
    fn failed_command_leaves_no_checkpoint() {
        let mut s = started();
        assert!(s.execute(&Command::StartRound, None, NOW).is_err());
        assert!(!s.undo_status().can_undo);
        assert_eq!(s.document().revision, 0);
    }

    #[test]
    fn custom_description_is_used() {
        let mut s = started();
        s.execute(&add("A"), Some("Add the hero"), NOW).unwrap();
        assert_eq!(s.undo_status().description.as_deref(), Some("Add the hero"));
    }

    #[test]
    fn timers_route_to_flush_and_sweep() {
        let mut s = started();
        let (requests, _) = s.take_timer_effects();
        let sweep = requests[0];
        assert_eq!(sweep.delay_ms, DAY_MS);

        s.execute(&add("A"), None, NOW).unwrap();
        let (requests, _) = s.take_timer_effects();
        let flush = requests[0].token;
        assert!(matches!(
            s.on_timer(flush, NOW + 50),
            TimerOutcome::Flushed(FlushOutcome::Written { revision: 1 })
        ));
        assert_eq!(s.on_timer(flush, NOW + 60), TimerOutcome::Ignored);

        assert_eq!(s.on_timer(sweep.token, NOW + DAY_MS), TimerOutcome::Swept(0));
        // re-armed
        let (requests, _) = s.take_timer_effects();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn replaced_session_ignores_old_timers() {
        let mut old = started();
        let (old_requests, _) = old.take_timer_effects();
        old.stop();

        let mut fresh = started();
        let (requests, _) = fresh.take_timer_effects();
        assert_ne!(requests[0].token, old_requests[0].token);
        assert_eq!(fresh.on_timer(old_requests[0].token, NOW + DAY_MS), TimerOutcome::Ignored);
        // the fresh sweep timer is still armed
        assert_eq!(fresh.on_timer(requests[0].token, NOW + DAY_MS), TimerOutcome::Swept(0));
    }

    #[test]
    fn stop_cancels_everything() {
        let mut s = started();
        s.execute(&add("A"), None, NOW).unwrap();
        s.take_timer_effects();
        s.stop();
        let (_, cancelled) = s.take_timer_effects();
        assert_eq!(cancelled.len(), 2);
        assert!(!s.is_running());
    }

    #[test]
    fn bridge_effects_carry_writes() {
        let mut s: Session<BridgeStore, MemoryStorage> =
            Session::new("room-9", BridgeStore::new(None), MemoryStorage::new(), config());
        s.start(NOW).unwrap();
        let effects = s.take_effects();
        assert_eq!(effects.writes.len(), 1);
        assert_eq!(effects.schedule.len(), 1);
        assert!(s.take_effects().writes.is_empty());
    }

    #[test]
    fn host_slot_lifecycle() {
        assert!(take_session().is_none());
        assert_eq!(with_session(|s| s.room_id().to_string()), Err(SessionError::NotStarted));
        let session: HostSession = Session::new("host", BridgeStore::new(None), host_storage(), config());
        assert!(install_session(session).is_none());
        assert_eq!(with_session(|s| s.room_id().to_string()), Ok("host".to_string()));
        let next: HostSession = Session::new("next", BridgeStore::new(None), host_storage(), config());
        assert_eq!(install_session(next).map(|old| old.room_id().to_string()).as_deref(), Some("host"));
        assert!(take_session().is_some());
    }
}
