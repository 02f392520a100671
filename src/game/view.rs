//! Read-only derived views of the encounter for rendering.
//!
//! Nothing here re-sorts: rows appear in stored sequence order.

use serde::{Deserialize, Serialize};

use crate::game::cards::CardId;
use crate::game::deck::DeckCounts;
use crate::game::ordering::score;
use crate::game::state::{EncounterState, ParticipantRow, ParticipantType, Phase};
use crate::game::turns::{next_participant, previous_participant};

/// Who is looking. Players do not see hidden NPC rows while privacy is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Gm,
    Player,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "gm" => Some(Role::Gm),
            "player" => Some(Role::Player),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: CardId,
    pub label: &'static str,
    pub score: i32,
}

impl From<CardId> for CardView {
    fn from(id: CardId) -> Self {
        Self {
            id,
            label: id.label(),
            score: score(Some(id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParticipantType,
    pub token_ids: Vec<String>,
    pub inactive: bool,
    pub on_hold: bool,
    pub revealed: bool,
    pub is_active: bool,
    pub card: Option<CardView>,
    pub candidates: Vec<CardView>,
    pub drew_this_round: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub participants: usize,
    pub active_participants: usize,
    pub with_cards: usize,
    pub on_hold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterView {
    pub round: u32,
    pub phase: Phase,
    pub revision: u64,
    pub hide_npc_from_players: bool,
    pub rows: Vec<RowView>,
    pub deck: DeckCounts,
    pub reshuffle_pending: bool,
    pub active_id: Option<String>,
    pub next_id: Option<String>,
    pub previous_id: Option<String>,
    /// Rows that could take a card: not inactive, not on hold.
    pub eligible_ids: Vec<String>,
    /// Eligible rows still without a keeper card.
    pub needs_card_ids: Vec<String>,
    /// Rows with more than one candidate awaiting a keeper choice.
    pub choosing_ids: Vec<String>,
    pub summary: GameSummary,
}

fn visible_to(row: &ParticipantRow, role: Role, hide_npc: bool) -> bool {
    match role {
        Role::Gm => true,
        Role::Player => !hide_npc || row.kind == ParticipantType::Pc || row.revealed,
    }
}

fn is_eligible(row: &ParticipantRow) -> bool {
    !row.inactive && !row.on_hold
}

/// Project `doc` for `role`.
pub fn encounter_view(doc: &EncounterState, role: Role) -> EncounterView {
    let hide_npc = doc.settings.hide_npc_from_players;
    let active_id = doc.active_row().map(|r| r.id.clone());
    let visible: Vec<&ParticipantRow> = doc
        .rows
        .iter()
        .filter(|r| visible_to(r, role, hide_npc))
        .collect();

    let ids_where = |pred: &dyn Fn(&ParticipantRow) -> bool| -> Vec<String> {
        visible.iter().filter(|r| pred(r)).map(|r| r.id.clone()).collect()
    };
    // navigation targets hidden from this role are not exposed
    let shown = |row: Option<&ParticipantRow>| {
        row.filter(|r| visible_to(r, role, hide_npc)).map(|r| r.id.clone())
    };

    let rows = visible
        .iter()
        .map(|r| RowView {
            id: r.id.clone(),
            name: r.name.clone(),
            kind: r.kind,
            token_ids: r.token_ids.clone(),
            inactive: r.inactive,
            on_hold: r.on_hold,
            revealed: r.revealed,
            is_active: active_id.as_deref() == Some(r.id.as_str()),
            card: r.current_card_id.map(CardView::from),
            candidates: r.candidate_ids.iter().copied().map(CardView::from).collect(),
            drew_this_round: r.drew_this_round,
        })
        .collect();

    EncounterView {
        round: doc.round,
        phase: doc.phase,
        revision: doc.revision,
        hide_npc_from_players: hide_npc,
        rows,
        deck: doc.deck.counts(),
        reshuffle_pending: doc.deck.reshuffle_after_round,
        active_id: shown(doc.active_row()),
        next_id: shown(next_participant(doc)),
        previous_id: shown(previous_participant(doc)),
        eligible_ids: ids_where(&is_eligible),
        needs_card_ids: ids_where(&|r| is_eligible(r) && r.current_card_id.is_none()),
        choosing_ids: ids_where(&|r| r.candidate_ids.len() > 1),
        summary: GameSummary {
            participants: visible.len(),
            active_participants: visible.iter().filter(|r| !r.inactive).count(),
            with_cards: visible.iter().filter(|r| r.current_card_id.is_some()).count(),
            on_hold: visible.iter().filter(|r| r.on_hold).count(),
        },
    }
}
