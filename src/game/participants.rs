//! Roster and per-row card operations: candidate draws, keeper selection,
//! late joiners, and the plain field setters.

use log::{debug, info, warn};
use rand::{Rng, RngCore};

use crate::error::EngineError;
use crate::game::cards::CardId;
use crate::game::ordering::sort_participants_by_initiative;
use crate::game::state::{EncounterState, ParticipantRow, ParticipantType, Phase};
use crate::game::turns::row_mut;

/// Re-sort unless a round is being played out; mid-round order is physical.
fn resort_outside_round(doc: &mut EncounterState) {
    if doc.phase != Phase::InRound {
        sort_participants_by_initiative(&mut doc.rows);
    }
}

/// Move each of `cards` still in play to the discard pile.
fn discard_cards(doc: &mut EncounterState, cards: impl IntoIterator<Item = CardId>) {
    for card in cards {
        if doc.deck.in_play.contains(&card) {
            doc.deck.discard(card);
        }
    }
}

// ── Card operations ────────────────────────────────────────────────

/// Draw one more candidate card for a row.
pub fn draw_candidate<R: Rng + ?Sized>(doc: &mut EncounterState, id: &str, rng: &mut R) -> Result<CardId, EngineError> {
    if doc.row(id).is_none() {
        return Err(EngineError::UnknownParticipant(id.to_string()));
    }
    let card = doc.deck.deal_single_card(rng)?;
    let row = row_mut(doc, id)?;
    row.candidate_ids.push(card);
    row.drew_this_round = true;
    debug!("[turns] {} drew candidate {} ({} candidates)", row.name, card, row.candidate_ids.len());
    Ok(card)
}

/// Commit `card` as the row's keeper and discard the other candidates.
pub fn select_keeper(doc: &mut EncounterState, id: &str, card: CardId) -> Result<(), EngineError> {
    let row = row_mut(doc, id)?;
    if !row.candidate_ids.contains(&card) {
        return Err(EngineError::NotACandidate {
            participant: id.to_string(),
            card,
        });
    }
    let others: Vec<CardId> = row.candidate_ids.iter().copied().filter(|c| *c != card).collect();
    row.current_card_id = Some(card);
    row.candidate_ids = vec![card];
    info!("[turns] {} kept {}", row.name, card);
    discard_cards(doc, others);
    resort_outside_round(doc);
    Ok(())
}

/// Discard every card the row holds and clear its card fields.
pub fn clear_participant_card(doc: &mut EncounterState, id: &str) -> Result<(), EngineError> {
    let row = row_mut(doc, id)?;
    let mut cards = std::mem::take(&mut row.candidate_ids);
    cards.extend(row.current_card_id.take());
    row.drew_this_round = false;
    discard_cards(doc, cards);
    Ok(())
}

/// Discard a card by id. Rows referencing it drop it; a card that is not in
/// play leaves the document unchanged.
pub fn discard_card(doc: &mut EncounterState, card: CardId) {
    if !doc.deck.discard(card) {
        return;
    }
    for row in &mut doc.rows {
        row.candidate_ids.retain(|c| *c != card);
        if row.current_card_id == Some(card) {
            row.current_card_id = None;
        }
    }
}

/// Merge the discard pile into the remaining stack and shuffle.
pub fn shuffle_deck<R: Rng + ?Sized>(doc: &mut EncounterState, rng: &mut R) {
    doc.deck.reshuffle_discard_and_remaining(rng);
}

// ── Roster ─────────────────────────────────────────────────────────

/// Parameters for a new participant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub name: String,
    pub kind: ParticipantType,
    pub token_ids: Vec<String>,
    /// Draw immediately when a round is already dealt or running.
    pub deal_now: bool,
}

fn generate_id<R: Rng + ?Sized>(doc: &EncounterState, rng: &mut R) -> String {
    loop {
        let id = format!("p-{:012x}", rng.next_u64() & 0xffff_ffff_ffff);
        if doc.row(&id).is_none() {
            return id;
        }
    }
}

/// Add a row. Returns its generated id.
pub fn create_participant<R: Rng + ?Sized>(
    doc: &mut EncounterState,
    new: NewParticipant,
    rng: &mut R,
) -> Result<String, EngineError> {
    let id = generate_id(doc, rng);
    let mut row = ParticipantRow::new(id.clone(), new.name, new.kind);
    row.token_ids = new.token_ids;
    row.revealed = new.kind == ParticipantType::Pc || !doc.settings.hide_npc_from_players;

    let late_joiner = new.deal_now && matches!(doc.phase, Phase::CardsDealt | Phase::InRound);
    if late_joiner {
        let card = doc.deck.deal_single_card(rng)?;
        row.current_card_id = Some(card);
        row.candidate_ids = vec![card];
        row.drew_this_round = true;
        info!("[turns] late joiner {} drew {}", row.name, card);
    }
    info!("[turns] created participant {} ({:?}) as {}", row.name, row.kind, id);
    doc.rows.push(row);
    if late_joiner {
        resort_outside_round(doc);
    }
    Ok(id)
}

/// Remove a row, discarding its cards and clearing the turn if it was active.
pub fn remove_participant(doc: &mut EncounterState, id: &str) -> Result<(), EngineError> {
    let idx = doc
        .row_index(id)
        .ok_or_else(|| EngineError::UnknownParticipant(id.to_string()))?;
    let row = doc.rows.remove(idx);
    discard_cards(doc, row.candidate_ids.iter().copied().chain(row.current_card_id));
    if doc.turn.active_row_id.as_deref() == Some(id) {
        doc.turn.active_row_id = None;
    }
    info!("[turns] removed participant {}", row.name);
    Ok(())
}

pub fn rename(doc: &mut EncounterState, id: &str, name: &str) -> Result<(), EngineError> {
    row_mut(doc, id)?.name = name.to_string();
    Ok(())
}

pub fn set_type(doc: &mut EncounterState, id: &str, kind: ParticipantType) -> Result<(), EngineError> {
    row_mut(doc, id)?.kind = kind;
    Ok(())
}

pub fn set_revealed(doc: &mut EncounterState, id: &str, value: bool) -> Result<(), EngineError> {
    row_mut(doc, id)?.revealed = value;
    Ok(())
}

pub fn set_inactive(doc: &mut EncounterState, id: &str, value: bool) -> Result<(), EngineError> {
    row_mut(doc, id)?.inactive = value;
    Ok(())
}

pub fn set_privacy(doc: &mut EncounterState, hide_npc_from_players: bool) {
    doc.settings.hide_npc_from_players = hide_npc_from_players;
    if !hide_npc_from_players {
        let hidden = doc.rows.iter().filter(|r| !r.revealed).count();
        if hidden > 0 {
            warn!("[turns] privacy disabled with {} hidden rows; reveal them individually", hidden);
        }
    }
}
