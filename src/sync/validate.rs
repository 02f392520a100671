//! Untrusted document parsing: structural check, migration, typed decode.

use log::warn;
use serde_json::Value;

use crate::error::ValidationError;
use crate::game::state::EncounterState;
use crate::sync::migrations::MigrationRegistry;

/// Top-level fields every stored document must carry, whatever its version.
pub const REQUIRED_FIELDS: [&str; 4] = ["round", "phase", "deck", "rows"];

/// Cheap shape check run before migration.
pub fn check_structure(raw: &Value) -> Result<(), ValidationError> {
    let Value::Object(map) = raw else {
        return Err(ValidationError::NotAnObject);
    };
    match REQUIRED_FIELDS.iter().find(|f| !map.contains_key(**f)) {
        Some(missing) => Err(ValidationError::MissingField(*missing)),
        None => Ok(()),
    }
}

/// Turn a stored value of any schema version into a typed document.
pub fn parse_document(raw: &Value, registry: &MigrationRegistry) -> Result<EncounterState, ValidationError> {
    check_structure(raw)?;
    let Value::Object(map) = raw else {
        return Err(ValidationError::NotAnObject);
    };
    let mut map = map.clone();
    registry.migrate(&mut map);

    let doc: EncounterState =
        serde_json::from_value(Value::Object(map)).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    if !doc.deck.is_conserved() {
        warn!("[sync] document revision {} does not hold a complete deck", doc.revision);
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{CURRENT_STATE_VERSION, Phase};
    use serde_json::json;

    #[test]
    fn rejects_non_objects() {
        let registry = MigrationRegistry::default();
        assert_eq!(parse_document(&json!([1, 2]), &registry), Err(ValidationError::NotAnObject));
        assert_eq!(parse_document(&json!(null), &registry), Err(ValidationError::NotAnObject));
    }

    #[test]
    fn reports_first_missing_field() {
        let raw = json!({"round": 0, "phase": "setup", "rows": []});
        assert_eq!(check_structure(&raw), Err(ValidationError::MissingField("deck")));
    }

    #[test]
    fn bad_values_are_malformed() {
        let raw = json!({"version": 4, "round": 0, "phase": "lunch", "deck": {"remaining": []}, "rows": []});
        assert!(matches!(
            parse_document(&raw, &MigrationRegistry::default()),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_card_ids_are_malformed() {
        let raw = json!({"version": 4, "round": 0, "phase": "setup", "deck": {"remaining": ["ZZ"]}, "rows": []});
        assert!(matches!(
            parse_document(&raw, &MigrationRegistry::default()),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn legacy_document_parses_after_migration() {
        let raw = json!({
            "round": 1,
            "phase": "cards_dealt",
            "cards": {},
            "deck": {"remaining": ["2C", "3C"], "discard": []},
            "rows": {
                "p-1": {"id": "p-1", "name": "Hero", "type": "PC", "currentCardId": "AS", "candidateIds": ["AS"]}
            },
            "turn": {"activeRowId": null}
        });
        let doc = parse_document(&raw, &MigrationRegistry::default()).unwrap();
        assert_eq!(doc.version, CURRENT_STATE_VERSION);
        assert_eq!(doc.revision, 0);
        assert_eq!(doc.phase, Phase::CardsDealt);
        assert_eq!(doc.rows.len(), 1);
        assert!(doc.deck.in_play.is_empty());
        assert!(doc.settings.hide_npc_from_players);
    }
}
