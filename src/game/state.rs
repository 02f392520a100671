//! Encounter document: the single replicated value per room.
//!
//! Everything here derives Serialize/Deserialize with camelCase field names,
//! matching the JSON stored in the room metadata key. The participant
//! sequence order IS the initiative order; nothing re-sorts at read time.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::cards::CardId;
use crate::game::deck::Deck;

/// Schema version stamped onto every document this build writes.
pub const CURRENT_STATE_VERSION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    CardsDealt,
    InRound,
    BetweenRounds,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::CardsDealt => "cards_dealt",
            Phase::InRound => "in_round",
            Phase::BetweenRounds => "between_rounds",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant kind. The derived `Ord` (PC < NPC < GROUP) is the tie-break
/// priority used when ordering rows without a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParticipantType {
    #[serde(rename = "PC")]
    Pc,
    #[serde(rename = "NPC")]
    Npc,
    #[serde(rename = "GROUP")]
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParticipantType,
    /// Opaque scene item ids linked to this row.
    #[serde(default)]
    pub token_ids: Vec<String>,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub on_hold: bool,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_card_id: Option<CardId>,
    /// Cards drawn this round; contains the keeper once one is chosen.
    #[serde(default)]
    pub candidate_ids: Vec<CardId>,
    #[serde(default)]
    pub drew_this_round: bool,
}

impl ParticipantRow {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ParticipantType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            token_ids: Vec::new(),
            inactive: false,
            on_hold: false,
            revealed: kind == ParticipantType::Pc,
            current_card_id: None,
            candidate_ids: Vec::new(),
            drew_this_round: false,
        }
    }

    /// Drop this round's card fields (keeper, candidates, draw flag).
    pub fn clear_round_fields(&mut self) {
        self.current_card_id = None;
        self.candidate_ids.clear();
        self.drew_this_round = false;
    }

    pub fn holds_joker(&self) -> bool {
        self.current_card_id.is_some_and(CardId::is_joker)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub active_row_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_hide_npc")]
    pub hide_npc_from_players: bool,
}

fn default_hide_npc() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hide_npc_from_players: default_hide_npc(),
        }
    }
}

/// The root document replicated through the room store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterState {
    pub version: u32,
    pub round: u32,
    pub phase: Phase,
    pub deck: Deck,
    pub rows: Vec<ParticipantRow>,
    #[serde(default)]
    pub turn: Turn,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub revision: u64,
}

impl Default for EncounterState {
    /// Unshuffled placeholder held before a room session has started.
    fn default() -> Self {
        Self {
            version: CURRENT_STATE_VERSION,
            round: 0,
            phase: Phase::Setup,
            deck: Deck::default(),
            rows: Vec::new(),
            turn: Turn::default(),
            settings: Settings::default(),
            revision: 0,
        }
    }
}

/// A fresh room document: shuffled deck, no participants, revision 0.
pub fn initialize_empty_state<R: Rng + ?Sized>(rng: &mut R) -> EncounterState {
    EncounterState {
        deck: Deck::shuffled(rng),
        ..EncounterState::default()
    }
}

impl EncounterState {
    pub fn row(&self, id: &str) -> Option<&ParticipantRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn row_mut(&mut self, id: &str) -> Option<&mut ParticipantRow> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn row_index(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    /// Index of the row `turn.activeRowId` points at, if it still exists.
    pub fn active_index(&self) -> Option<usize> {
        self.turn.active_row_id.as_deref().and_then(|id| self.row_index(id))
    }

    pub fn active_row(&self) -> Option<&ParticipantRow> {
        self.active_index().map(|idx| &self.rows[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::DECK_SIZE;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    #[test]
    fn empty_state_is_setup_with_full_deck() {
        let state = initialize_empty_state(&mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(state.version, CURRENT_STATE_VERSION);
        assert_eq!(state.round, 0);
        assert_eq!(state.phase, Phase::Setup);
        assert_eq!(state.revision, 0);
        assert_eq!(state.deck.remaining.len(), DECK_SIZE);
        assert!(state.rows.is_empty());
        assert!(state.turn.active_row_id.is_none());
        assert!(state.settings.hide_npc_from_players);
    }

    #[test]
    fn document_serializes_camel_case() {
        let mut state = EncounterState::default();
        state.rows.push(ParticipantRow::new("p-1", "Hero", ParticipantType::Pc));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["phase"], "setup");
        assert_eq!(value["turn"]["activeRowId"], serde_json::Value::Null);
        assert_eq!(value["settings"]["hideNpcFromPlayers"], true);
        assert_eq!(value["deck"]["inPlay"], json!([]));
        assert_eq!(value["deck"]["reshuffleAfterRound"], false);
        assert_eq!(value["rows"][0]["type"], "PC");
        assert_eq!(value["rows"][0]["onHold"], false);
        assert!(value["rows"][0].get("currentCardId").is_none());
    }

    #[test]
    fn row_defaults_fill_missing_fields() {
        let row: ParticipantRow = serde_json::from_value(json!({
            "id": "p-2",
            "name": "Goblins",
            "type": "GROUP",
            "currentCardId": "KD"
        }))
        .unwrap();
        assert_eq!(row.kind, ParticipantType::Group);
        assert!(!row.on_hold);
        assert!(row.candidate_ids.is_empty());
        assert_eq!(row.current_card_id, CardId::parse("KD"));
    }

    #[test]
    fn phase_strings_match_serde() {
        for phase in [Phase::Setup, Phase::CardsDealt, Phase::InRound, Phase::BetweenRounds] {
            let text = serde_json::to_value(phase).unwrap();
            assert_eq!(text, phase.as_str());
        }
    }

    #[test]
    fn type_priority_is_pc_npc_group() {
        assert!(ParticipantType::Pc < ParticipantType::Npc);
        assert!(ParticipantType::Npc < ParticipantType::Group);
    }

    #[test]
    fn npc_rows_start_hidden() {
        assert!(ParticipantRow::new("a", "A", ParticipantType::Pc).revealed);
        assert!(!ParticipantRow::new("b", "B", ParticipantType::Npc).revealed);
    }

    #[test]
    fn active_row_lookup() {
        let mut state = EncounterState::default();
        state.rows.push(ParticipantRow::new("p-1", "A", ParticipantType::Pc));
        state.rows.push(ParticipantRow::new("p-2", "B", ParticipantType::Npc));
        assert!(state.active_row().is_none());
        state.turn.active_row_id = Some("p-2".into());
        assert_eq!(state.active_index(), Some(1));
        state.turn.active_row_id = Some("gone".into());
        assert!(state.active_row().is_none());
    }
}
