//! `/api/session/*` routes: open and close the room session.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::game::view::Role;
use crate::routes::util::{error_response, ok_response, parse_json_body, session_error_response};
use crate::session::{self, Effects, HostSession, Session};
use crate::sync::service::StartOutcome;
use crate::sync::store::BridgeStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    room_id: String,
    /// The room key's current value, `null` when the room is empty.
    #[serde(default)]
    stored: Option<Value>,
    #[serde(default)]
    config: SessionConfig,
    now_ms: u64,
}

// ── POST /api/session/start ────────────────────────────────────────

/// Body: `{"roomId", "stored", "config", "nowMs"}`.
/// Replaces any running session; its cancellations and pending writes are
/// folded into the returned effects.
pub fn handle_start_post(body: &str) -> String {
    let req: StartRequest = match parse_json_body(body) {
        Ok(req) => req,
        Err(err) => return session_error_response(&err),
    };
    if req.room_id.trim().is_empty() {
        return error_response(400, "Missing roomId");
    }

    let mut fresh: HostSession = Session::new(&req.room_id, BridgeStore::new(req.stored), session::host_storage(), req.config);
    let outcome = match fresh.start(req.now_ms) {
        Ok(outcome) => outcome,
        Err(err) => return session_error_response(&err),
    };
    let mut effects = fresh.take_effects();
    let view = fresh.view(Role::Gm);
    if let Some(mut old) = session::install_session(fresh) {
        old.stop();
        effects.absorb(old.take_effects());
    }

    let (label, reason) = match &outcome {
        StartOutcome::Loaded => ("loaded", None),
        StartOutcome::Created => ("created", None),
        StartOutcome::Replaced(err) => ("replaced", Some(err.to_string())),
        StartOutcome::Unreadable { error, .. } => ("unreadable", Some(error.to_string())),
    };
    ok_response(&json!({
        "outcome": label,
        "reason": reason,
        "view": view,
        "effects": effects,
    }))
}

// ── POST /api/session/stop ─────────────────────────────────────────

pub fn handle_stop_post(_body: &str) -> String {
    match session::take_session() {
        Some(mut old) => {
            old.stop();
            let effects: Effects = old.take_effects();
            ok_response(&json!({ "effects": effects }))
        }
        None => session_error_response(&SessionError::NotStarted),
    }
}

// ── GET /api/session/status ────────────────────────────────────────

pub fn handle_status_get(_query: &str) -> String {
    let status = session::with_session(|s| {
        json!({
            "running": s.is_running(),
            "roomId": s.room_id(),
            "revision": s.document().revision,
            "pendingWrite": s.sync().has_pending_write(),
            "undo": s.undo_status(),
        })
    });
    match status {
        Ok(status) => ok_response(&status),
        Err(SessionError::NotStarted) => ok_response(&json!({ "running": false })),
        Err(err) => session_error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn start_requires_room_and_clock() {
        let body = parse(&handle_start_post(r#"{"roomId":"  ","nowMs":1}"#));
        assert_eq!(body["status"], 400);
        let body = parse(&handle_start_post(r#"{"roomId":"r"}"#));
        assert_eq!(body["status"], 400);
    }

    #[test]
    fn start_then_stop() {
        session::take_session();
        let body = parse(&handle_start_post(r#"{"roomId":"r1","stored":null,"nowMs":1000,"config":{"seed":3}}"#));
        assert_eq!(body["ok"], true);
        assert_eq!(body["outcome"], "created");
        assert_eq!(body["effects"]["writes"].as_array().unwrap().len(), 1);
        assert_eq!(body["view"]["phase"], "setup");

        let status = parse(&handle_status_get(""));
        assert_eq!(status["running"], true);
        assert_eq!(status["roomId"], "r1");

        let stopped = parse(&handle_stop_post(""));
        assert_eq!(stopped["ok"], true);
        assert_eq!(stopped["effects"]["cancel"].as_array().unwrap().len(), 1);

        let again = parse(&handle_stop_post(""));
        assert_eq!(again["status"], 409);
        assert_eq!(parse(&handle_status_get(""))["running"], false);
    }

    #[test]
    fn restart_replaces_previous_session() {
        session::take_session();
        handle_start_post(r#"{"roomId":"a","nowMs":1}"#);
        let body = parse(&handle_start_post(r#"{"roomId":"b","nowMs":2}"#));
        // the old sweep timer gets cancelled
        assert_eq!(body["effects"]["cancel"].as_array().unwrap().len(), 1);
        assert_eq!(parse(&handle_status_get(""))["roomId"], "b");
        session::take_session();
    }

    #[test]
    fn start_replaces_garbage_in_room() {
        session::take_session();
        let body = parse(&handle_start_post(r#"{"roomId":"g","stored":[1,2],"nowMs":1}"#));
        assert_eq!(body["outcome"], "replaced");
        assert!(body["reason"].as_str().is_some());
        session::take_session();
    }

    #[test]
    fn start_leaves_undecodable_room_alone() {
        session::take_session();
        let stored = r#"{"version":4,"revision":12,"round":1,"phase":"setup","deck":{"remaining":[]},"rows":[{"id":"p-1","name":"Ally","type":"ALLY"}]}"#;
        let body = parse(&handle_start_post(&format!(r#"{{"roomId":"u","stored":{stored},"nowMs":1}}"#)));
        assert_eq!(body["outcome"], "unreadable");
        assert!(body["effects"]["writes"].as_array().unwrap().is_empty());
        assert_eq!(parse(&handle_status_get(""))["revision"], 12);
        session::take_session();
    }
}
