//! Schema migrations for stored encounter documents.
//!
//! Steps operate on the raw JSON object before any typed parse. Each step
//! is registered under the version it produces and upgrades a document
//! from `version - 1`. Missing steps are skipped with a warning, so a gap
//! in the registry lets an un-transformed document through that step.

use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::game::ordering::sort_participants_by_initiative;
use crate::game::state::{CURRENT_STATE_VERSION, ParticipantRow};

pub type RawDocument = Map<String, Value>;
pub type MigrationFn = fn(&mut RawDocument);

/// Version assumed for documents that predate the `version` field.
pub const LEGACY_VERSION: u32 = 1;

/// Ordered set of migration steps up to a target version.
#[derive(Clone)]
pub struct MigrationRegistry {
    steps: BTreeMap<u32, MigrationFn>,
    target: u32,
}

impl Default for MigrationRegistry {
    /// Every step this build knows, targeting [`CURRENT_STATE_VERSION`].
    fn default() -> Self {
        Self::empty(CURRENT_STATE_VERSION)
            .with_step(2, add_in_play_pile)
            .with_step(3, drop_inline_card_table)
            .with_step(4, rows_map_to_sequence)
    }
}

impl MigrationRegistry {
    pub fn empty(target: u32) -> Self {
        Self {
            steps: BTreeMap::new(),
            target,
        }
    }

    /// Register `step` as the upgrade to `version`.
    pub fn with_step(mut self, version: u32, step: MigrationFn) -> Self {
        self.steps.insert(version, step);
        self
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Upgrade `doc` in place to the target version.
    pub fn migrate(&self, doc: &mut RawDocument) {
        let start = stored_version(doc);
        debug!("[migration] state version {}, target {}", start, self.target);

        if start > self.target {
            warn!(
                "[migration] document version {} is newer than this build ({}); stamping anyway",
                start, self.target
            );
        }

        for version in (start + 1)..=self.target {
            match self.steps.get(&version) {
                Some(step) => {
                    debug!("[migration] applying migration to version {}", version);
                    step(doc);
                }
                None => warn!("[migration] no migration defined for version {}", version),
            }
        }

        doc.insert("version".into(), Value::from(self.target));
        if !doc.get("revision").is_some_and(Value::is_u64) {
            doc.insert("revision".into(), Value::from(0u64));
            debug!("[migration] added missing revision field");
        }
        if start < self.target {
            info!("[migration] upgraded state from v{} to v{}", start, self.target);
        }
    }
}

/// Stored `version`, or [`LEGACY_VERSION`] when absent or not a positive integer.
pub fn stored_version(doc: &RawDocument) -> u32 {
    doc.get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(LEGACY_VERSION)
}

// ── Steps ──────────────────────────────────────────────────────────

/// v2: the deck gained an `inPlay` pile.
fn add_in_play_pile(doc: &mut RawDocument) {
    if let Some(Value::Object(deck)) = doc.get_mut("deck") {
        deck.entry("inPlay").or_insert_with(|| Value::Array(Vec::new()));
    }
}

/// v3: card metadata comes from the static catalog, not the document.
fn drop_inline_card_table(doc: &mut RawDocument) {
    doc.remove("cards");
}

/// v4: rows became an ordered sequence; the `turn.actNow` overlay is gone.
fn rows_map_to_sequence(doc: &mut RawDocument) {
    if let Some(Value::Object(turn)) = doc.get_mut("turn") {
        turn.remove("actNow");
    }

    let Some(Value::Object(map)) = doc.get("rows") else {
        return;
    };
    let values: Vec<Value> = map.values().cloned().collect();
    let typed: Result<Vec<ParticipantRow>, _> = values
        .iter()
        .cloned()
        .map(serde_json::from_value::<ParticipantRow>)
        .collect();

    let sequence = match typed {
        Ok(mut rows) => {
            sort_participants_by_initiative(&mut rows);
            rows.iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect()
        }
        Err(err) => {
            warn!("[migration] rows not typed ({}); keeping stored order", err);
            values
        }
    };
    doc.insert("rows".into(), Value::Array(sequence));
}
