//! Engine commands: a closed set of named operations dispatched to small
//! functions over a working copy of the document.
//!
//! `apply` never touches the caller's document. On success it returns the
//! next document with `revision` bumped by one; on failure the caller keeps
//! what it had.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::game::cards::CardId;
use crate::game::participants::{self, NewParticipant};
use crate::game::state::{EncounterState, ParticipantType, initialize_empty_state};
use crate::game::turns::{self, Placement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    // Round flow
    DealRound,
    StartRound,
    EndRound,
    EndInitiative,

    // Cards
    DrawCandidate {
        participant_id: String,
    },
    SelectKeeper {
        participant_id: String,
        card_id: CardId,
    },
    ClearParticipantCard {
        participant_id: String,
    },
    DiscardCard {
        card_id: CardId,
    },
    ShuffleDeck,

    // Hold and turn
    SetHold {
        participant_id: String,
        value: bool,
    },
    LoseHold {
        participant_id: String,
    },
    InsertActNow {
        participant_id: String,
        placement: Placement,
    },
    SetActive {
        #[serde(default)]
        participant_id: Option<String>,
    },
    NextTurn,
    PreviousTurn,

    // Participants
    CreateParticipant {
        name: String,
        #[serde(rename = "participantType")]
        kind: ParticipantType,
        #[serde(default)]
        token_ids: Vec<String>,
        #[serde(default)]
        deal_now: bool,
    },
    RemoveParticipant {
        participant_id: String,
    },
    Rename {
        participant_id: String,
        name: String,
    },
    SetType {
        participant_id: String,
        #[serde(rename = "participantType")]
        kind: ParticipantType,
    },
    SetRevealed {
        participant_id: String,
        value: bool,
    },
    SetInactive {
        participant_id: String,
        value: bool,
    },

    // Settings and system
    SetPrivacy {
        hide_npc_from_players: bool,
    },
    Reset,
}

impl Command {
    /// Default human-readable label, used for undo checkpoints.
    pub fn describe(&self) -> String {
        match self {
            Command::DealRound => "Deal round".into(),
            Command::StartRound => "Start round".into(),
            Command::EndRound => "End round".into(),
            Command::EndInitiative => "End initiative".into(),
            Command::DrawCandidate { .. } => "Draw card".into(),
            Command::SelectKeeper { card_id, .. } => format!("Keep {}", card_id.label()),
            Command::ClearParticipantCard { .. } => "Clear card".into(),
            Command::DiscardCard { card_id } => format!("Discard {}", card_id.label()),
            Command::ShuffleDeck => "Shuffle deck".into(),
            Command::SetHold { value: true, .. } => "Hold".into(),
            Command::SetHold { value: false, .. } => "Release hold".into(),
            Command::LoseHold { .. } => "Lose hold".into(),
            Command::InsertActNow { placement, .. } => match placement {
                Placement::Before => "Act now (before)".into(),
                Placement::After => "Act now (after)".into(),
            },
            Command::SetActive { .. } => "Set active".into(),
            Command::NextTurn => "Next turn".into(),
            Command::PreviousTurn => "Previous turn".into(),
            Command::CreateParticipant { name, .. } => format!("Add {}", name),
            Command::RemoveParticipant { .. } => "Remove participant".into(),
            Command::Rename { name, .. } => format!("Rename to {}", name),
            Command::SetType { .. } => "Change type".into(),
            Command::SetRevealed { value: true, .. } => "Reveal".into(),
            Command::SetRevealed { value: false, .. } => "Hide".into(),
            Command::SetInactive { .. } => "Toggle inactive".into(),
            Command::SetPrivacy { .. } => "Privacy".into(),
            Command::Reset => "Reset encounter".into(),
        }
    }
}

/// Run `cmd` against a copy of `doc`.
pub fn apply<R: Rng + ?Sized>(doc: &EncounterState, cmd: &Command, rng: &mut R) -> Result<EncounterState, EngineError> {
    let mut next = match cmd {
        Command::Reset => initialize_empty_state(rng),
        _ => doc.clone(),
    };
    match cmd {
        Command::DealRound => {
            turns::deal_round(&mut next, rng)?;
        }
        Command::StartRound => turns::start_round(&mut next)?,
        Command::EndRound => turns::end_round(&mut next, rng)?,
        Command::EndInitiative => turns::end_initiative(&mut next, rng),

        Command::DrawCandidate { participant_id } => {
            participants::draw_candidate(&mut next, participant_id, rng)?;
        }
        Command::SelectKeeper {
            participant_id,
            card_id,
        } => participants::select_keeper(&mut next, participant_id, *card_id)?,
        Command::ClearParticipantCard { participant_id } => {
            participants::clear_participant_card(&mut next, participant_id)?
        }
        Command::DiscardCard { card_id } => participants::discard_card(&mut next, *card_id),
        Command::ShuffleDeck => participants::shuffle_deck(&mut next, rng),

        Command::SetHold {
            participant_id,
            value,
        } => turns::set_hold(&mut next, participant_id, *value)?,
        Command::LoseHold { participant_id } => turns::lose_hold(&mut next, participant_id)?,
        Command::InsertActNow {
            participant_id,
            placement,
        } => turns::insert_act_now(&mut next, participant_id, *placement)?,
        Command::SetActive { participant_id } => turns::set_active(&mut next, participant_id.as_deref())?,
        Command::NextTurn => turns::next_turn(&mut next)?,
        Command::PreviousTurn => turns::previous_turn(&mut next)?,

        Command::CreateParticipant {
            name,
            kind,
            token_ids,
            deal_now,
        } => {
            let new = NewParticipant {
                name: name.clone(),
                kind: *kind,
                token_ids: token_ids.clone(),
                deal_now: *deal_now,
            };
            participants::create_participant(&mut next, new, rng)?;
        }
        Command::RemoveParticipant { participant_id } => {
            participants::remove_participant(&mut next, participant_id)?
        }
        Command::Rename {
            participant_id,
            name,
        } => participants::rename(&mut next, participant_id, name)?,
        Command::SetType {
            participant_id,
            kind,
        } => participants::set_type(&mut next, participant_id, *kind)?,
        Command::SetRevealed {
            participant_id,
            value,
        } => participants::set_revealed(&mut next, participant_id, *value)?,
        Command::SetInactive {
            participant_id,
            value,
        } => participants::set_inactive(&mut next, participant_id, *value)?,

        Command::SetPrivacy {
            hide_npc_from_players,
        } => participants::set_privacy(&mut next, *hide_npc_from_players),
        Command::Reset => debug!("[turns] encounter reset"),
    }
    next.revision = doc.revision + 1;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::DECK_SIZE;
    use crate::game::state::Phase;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(5)
    }

    fn add(doc: &EncounterState, name: &str, r: &mut ChaCha8Rng) -> EncounterState {
        let cmd = Command::CreateParticipant {
            name: name.into(),
            kind: ParticipantType::Pc,
            token_ids: Vec::new(),
            deal_now: false,
        };
        apply(doc, &cmd, r).unwrap()
    }

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: Command = serde_json::from_value(json!({"type": "dealRound"})).unwrap();
        assert_eq!(cmd, Command::DealRound);

        let cmd: Command = serde_json::from_value(json!({
            "type": "insertActNow", "participantId": "p-1", "placement": "before"
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::InsertActNow {
                participant_id: "p-1".into(),
                placement: Placement::Before
            }
        );

        let cmd: Command = serde_json::from_value(json!({
            "type": "createParticipant", "name": "Orc", "participantType": "NPC"
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::CreateParticipant {
                name: "Orc".into(),
                kind: ParticipantType::Npc,
                token_ids: Vec::new(),
                deal_now: false
            }
        );

        let cmd: Command = serde_json::from_value(json!({
            "type": "selectKeeper", "participantId": "p-1", "cardId": "JK-B"
        }))
        .unwrap();
        assert_eq!(cmd.describe(), "Keep Black Joker");
    }

    #[test]
    fn every_success_bumps_revision_by_one() {
        let mut r = rng();
        let doc = initialize_empty_state(&mut r);
        let doc = add(&doc, "A", &mut r);
        assert_eq!(doc.revision, 1);
        let doc = apply(&doc, &Command::DealRound, &mut r).unwrap();
        assert_eq!(doc.revision, 2);
        let doc = apply(&doc, &Command::StartRound, &mut r).unwrap();
        assert_eq!(doc.revision, 3);
        assert_eq!(doc.phase, Phase::InRound);
    }

    #[test]
    fn failure_leaves_input_untouched() {
        let mut r = rng();
        let doc = initialize_empty_state(&mut r);
        let before = doc.clone();
        let err = apply(&doc, &Command::StartRound, &mut r).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPhase { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn empty_deal_still_bumps_revision() {
        let mut r = rng();
        let doc = initialize_empty_state(&mut r);
        let next = apply(&doc, &Command::DealRound, &mut r).unwrap();
        assert_eq!(next.phase, Phase::Setup);
        assert_eq!(next.revision, doc.revision + 1);
    }

    #[test]
    fn reset_is_fresh_but_newer() {
        let mut r = rng();
        let doc = add(&initialize_empty_state(&mut r), "A", &mut r);
        let doc = apply(&doc, &Command::DealRound, &mut r).unwrap();
        let reset = apply(&doc, &Command::Reset, &mut r).unwrap();
        assert!(reset.rows.is_empty());
        assert_eq!(reset.deck.remaining.len(), DECK_SIZE);
        assert_eq!(reset.phase, Phase::Setup);
        assert_eq!(reset.revision, doc.revision + 1);
    }

    #[test]
    fn set_active_null_parses() {
        let cmd: Command = serde_json::from_value(json!({"type": "setActive", "participantId": null})).unwrap();
        assert_eq!(cmd, Command::SetActive { participant_id: None });
        let cmd: Command = serde_json::from_value(json!({"type": "setActive"})).unwrap();
        assert_eq!(cmd, Command::SetActive { participant_id: None });
    }
}
