//! Turn state machine: round phases, hold / Act Now, and turn navigation.
//!
//! Phases run setup → cards_dealt → in_round → between_rounds → cards_dealt,
//! with `end_initiative` returning to setup from anywhere. Every function
//! here mutates a working copy of the document; callers discard the copy
//! when an `Err` comes back, so a failed operation never leaves a partial
//! change behind.

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::game::ordering::sort_participants_by_initiative;
use crate::game::state::{EncounterState, ParticipantRow, ParticipantType, Phase};

/// Where an Act Now row lands relative to the active row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Interrupt: the moved row becomes active immediately.
    Before,
    /// Queue: the moved row acts once the current turn ends.
    After,
}

fn require_phase(
    doc: &EncounterState,
    operation: &'static str,
    allowed: &[Phase],
) -> Result<(), EngineError> {
    if allowed.contains(&doc.phase) {
        Ok(())
    } else {
        Err(EngineError::InvalidPhase {
            operation,
            phase: doc.phase,
        })
    }
}

pub(crate) fn row_mut<'a>(
    doc: &'a mut EncounterState,
    id: &str,
) -> Result<&'a mut ParticipantRow, EngineError> {
    doc.row_mut(id)
        .ok_or_else(|| EngineError::UnknownParticipant(id.to_string()))
}

/// A row takes part in a deal unless it is on hold or an inactive group.
pub fn is_deal_eligible(row: &ParticipantRow) -> bool {
    !row.on_hold && !(row.inactive && row.kind == ParticipantType::Group)
}

// ── Round phases ───────────────────────────────────────────────────

/// Deal one card to every eligible row, then sort into initiative order.
///
/// Returns how many cards were dealt. When nothing was dealt the phase and
/// round are left alone.
pub fn deal_round<R: Rng + ?Sized>(doc: &mut EncounterState, rng: &mut R) -> Result<usize, EngineError> {
    require_phase(doc, "dealRound", &[Phase::Setup, Phase::BetweenRounds])?;

    let mut dropped = Vec::new();
    for row in &mut doc.rows {
        let kept = if row.on_hold { row.current_card_id } else { None };
        dropped.extend(row.candidate_ids.drain(..).chain(row.current_card_id).filter(|c| Some(*c) != kept));
        row.current_card_id = kept;
        row.drew_this_round = false;
    }
    for card in dropped {
        if doc.deck.in_play.contains(&card) {
            doc.deck.discard(card);
        }
    }

    let mut dealt = 0;
    for idx in 0..doc.rows.len() {
        if !is_deal_eligible(&doc.rows[idx]) {
            continue;
        }
        let card = doc.deck.deal_single_card(rng)?;
        let row = &mut doc.rows[idx];
        row.current_card_id = Some(card);
        row.candidate_ids = vec![card];
        row.drew_this_round = true;
        dealt += 1;
    }

    sort_participants_by_initiative(&mut doc.rows);

    if dealt > 0 {
        doc.phase = Phase::CardsDealt;
        doc.round += 1;
        info!("[turns] round {} dealt: {} cards", doc.round, dealt);
    } else {
        debug!("[turns] deal round: no eligible participants");
    }
    Ok(dealt)
}

/// Begin play: the first row in sequence becomes active and is revealed.
pub fn start_round(doc: &mut EncounterState) -> Result<(), EngineError> {
    require_phase(doc, "startRound", &[Phase::CardsDealt])?;
    doc.phase = Phase::InRound;
    doc.turn.active_row_id = doc.rows.first().map(|r| r.id.clone());
    if let Some(first) = doc.rows.first_mut() {
        first.revealed = true;
    }
    Ok(())
}

/// Close the round: discard everything in play, clear row cards, and
/// rebuild the deck if a Joker came up.
pub fn end_round<R: Rng + ?Sized>(doc: &mut EncounterState, rng: &mut R) -> Result<(), EngineError> {
    require_phase(doc, "endRound", &[Phase::InRound])?;
    doc.deck.discard_all_in_play();
    for row in &mut doc.rows {
        row.clear_round_fields();
    }
    doc.turn.active_row_id = None;
    if doc.deck.reshuffle_after_round {
        doc.deck.reshuffle_discard_and_remaining(rng);
    }
    doc.phase = Phase::BetweenRounds;
    info!("[turns] round {} ended", doc.round);
    Ok(())
}

/// Leave combat. Keeps the roster, rebuilds the deck, returns to setup.
pub fn end_initiative<R: Rng + ?Sized>(doc: &mut EncounterState, rng: &mut R) {
    let hide = doc.settings.hide_npc_from_players;
    for row in &mut doc.rows {
        row.clear_round_fields();
        row.on_hold = false;
        row.revealed = row.kind == ParticipantType::Pc || !hide;
    }
    doc.deck.rebuild(rng);
    doc.round = 0;
    doc.phase = Phase::Setup;
    doc.turn.active_row_id = None;
    info!("[turns] initiative ended");
}

// ── Hold / Act Now ─────────────────────────────────────────────────

pub fn set_hold(doc: &mut EncounterState, id: &str, value: bool) -> Result<(), EngineError> {
    row_mut(doc, id)?.on_hold = value;
    Ok(())
}

/// Failed hold roll: the row loses its hold and its card, but keeps its place.
pub fn lose_hold(doc: &mut EncounterState, id: &str) -> Result<(), EngineError> {
    let row = row_mut(doc, id)?;
    row.on_hold = false;
    let cards = std::mem::take(&mut row.candidate_ids);
    let keeper = row.current_card_id.take();
    row.drew_this_round = false;
    for card in keeper.into_iter().chain(cards) {
        if doc.deck.in_play.contains(&card) {
            doc.deck.discard(card);
        }
    }
    Ok(())
}

/// Move a row next to the active row. `Before` also makes it active.
pub fn insert_act_now(doc: &mut EncounterState, id: &str, placement: Placement) -> Result<(), EngineError> {
    let from = doc
        .row_index(id)
        .ok_or_else(|| EngineError::UnknownParticipant(id.to_string()))?;
    let active_id = doc
        .active_row()
        .map(|r| r.id.clone())
        .ok_or(EngineError::NoActiveParticipant)?;

    if active_id != id {
        let row = doc.rows.remove(from);
        // active index shifts once the moved row is out of the sequence
        let active = doc.row_index(&active_id).ok_or(EngineError::NoActiveParticipant)?;
        let at = match placement {
            Placement::Before => active,
            Placement::After => active + 1,
        };
        doc.rows.insert(at, row);
    }

    if placement == Placement::Before {
        doc.turn.active_row_id = Some(id.to_string());
    }
    let row = row_mut(doc, id)?;
    row.on_hold = false;
    row.revealed = true;
    debug!("[turns] {} acts now ({:?})", row.name, placement);
    Ok(())
}

// ── Navigation ─────────────────────────────────────────────────────

/// Row after the active one; the first row when nothing is active.
/// `None` past the end of the sequence.
pub fn next_participant(doc: &EncounterState) -> Option<&ParticipantRow> {
    match doc.active_index() {
        None => doc.rows.first(),
        Some(idx) => doc.rows.get(idx + 1),
    }
}

/// Row before the active one. `None` at the start or when nothing is active.
pub fn previous_participant(doc: &EncounterState) -> Option<&ParticipantRow> {
    doc.active_index()
        .and_then(|idx| idx.checked_sub(1))
        .map(|idx| &doc.rows[idx])
}

/// Point the turn at `id` (or clear it). An activated row is revealed.
pub fn set_active(doc: &mut EncounterState, id: Option<&str>) -> Result<(), EngineError> {
    if let Some(id) = id {
        let row = row_mut(doc, id)?;
        if !row.revealed {
            row.revealed = true;
            debug!("[turns] auto-revealed {} on activation", row.name);
        }
    }
    doc.turn.active_row_id = id.map(str::to_string);
    Ok(())
}

pub fn next_turn(doc: &mut EncounterState) -> Result<(), EngineError> {
    let next = next_participant(doc)
        .map(|r| r.id.clone())
        .ok_or(EngineError::NoActiveParticipant)?;
    set_active(doc, Some(&next))
}

pub fn previous_turn(doc: &mut EncounterState) -> Result<(), EngineError> {
    let prev = previous_participant(doc)
        .map(|r| r.id.clone())
        .ok_or(EngineError::NoActiveParticipant)?;
    set_active(doc, Some(&prev))
}
