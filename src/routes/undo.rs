//! `/api/undo*` routes.

use serde_json::json;

use crate::error::SessionError;
use crate::game::view::Role;
use crate::routes::util::{ok_response, session_error_response};
use crate::session;

// ── POST /api/undo ─────────────────────────────────────────────────

/// Restore the last checkpoint. `restored` is false when there was none.
pub fn handle_undo_post(_body: &str) -> String {
    let result = session::with_session(|s| {
        let restored = s.undo()?.is_some();
        Ok::<_, SessionError>((restored, s.view(Role::Gm), s.undo_status(), s.take_effects()))
    })
    .and_then(|inner| inner);
    match result {
        Ok((restored, view, status, effects)) => ok_response(&json!({
            "restored": restored,
            "view": view,
            "undo": status,
            "effects": effects,
        })),
        Err(err) => session_error_response(&err),
    }
}

// ── GET /api/undo/status ───────────────────────────────────────────

pub fn handle_status_get(_query: &str) -> String {
    match session::with_session(|s| s.undo_status()) {
        Ok(status) => ok_response(&json!({ "undo": status })),
        Err(err) => session_error_response(&err),
    }
}

// ── POST /api/undo/clear ───────────────────────────────────────────

pub fn handle_clear_post(_body: &str) -> String {
    match session::with_session(|s| {
        s.clear_history();
        s.undo_status()
    }) {
        Ok(status) => ok_response(&json!({ "undo": status })),
        Err(err) => session_error_response(&err),
    }
}
