//! Error types shared by the engine, the sync layer and the undo store.
//!
//! Nothing here is fatal to the host: every failure leaves the in-memory
//! document in its last valid form and is surfaced as a logged `Result`.

use thiserror::Error;

use crate::game::cards::CardId;
use crate::game::state::Phase;

/// Failure of a single engine command. The document is never modified when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("could not deal to everyone: the deck is out of cards")]
    InsufficientCards,
    #[error("participant `{0}` not found")]
    UnknownParticipant(String),
    #[error("`{operation}` is not allowed during phase `{phase}`")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },
    #[error("card {card} is not a candidate of participant `{participant}`")]
    NotACandidate { participant: String, card: CardId },
    #[error("no participant is active")]
    NoActiveParticipant,
}

/// An inbound or persisted document that could not be turned into a typed
/// `EncounterState`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("document is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("document is malformed: {0}")]
    Malformed(String),
}

/// Failure talking to the room metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("room store unavailable: {0}")]
    Unavailable(String),
    #[error("could not serialize document: {0}")]
    Serialize(String),
}

/// Failure talking to durable local storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("local storage quota exceeded")]
    QuotaExceeded,
    #[error("local storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to the route layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no room session is running")]
    NotStarted,
    #[error("invalid request: {0}")]
    BadRequest(String),
}
