//! `/api/sync/*` routes: the host's room listener and timers report in here.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::SessionError;
use crate::game::view::Role;
use crate::routes::util::{ok_response, parse_json_body, session_error_response};
use crate::session::{self, TimerOutcome};
use crate::sync::scheduler::CancelToken;
use crate::sync::service::{FlushOutcome, Inbound};

#[derive(Debug, Deserialize)]
struct InboundRequest {
    /// The room key's new value; `null` when it was removed.
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimerRequest {
    token: CancelToken,
    now_ms: u64,
}

// ── POST /api/sync/inbound ─────────────────────────────────────────

/// Body: `{"value": <room document or null>}`.
pub fn handle_inbound_post(body: &str) -> String {
    let req: InboundRequest = match parse_json_body(body) {
        Ok(req) => req,
        Err(err) => return session_error_response(&err),
    };
    let result = session::with_session(|s| {
        let inbound = s.receive_from_host(req.value);
        (inbound, s.view(Role::Gm), s.take_effects())
    });
    match result {
        Ok((inbound, view, effects)) => {
            let detail = match &inbound {
                Inbound::Applied { revision } => json!({ "revision": revision }),
                Inbound::Stale { incoming, local } => json!({ "incoming": incoming, "local": local }),
                Inbound::Invalid(err) => json!({ "reason": err.to_string() }),
                Inbound::Absent | Inbound::Ignored => Value::Null,
            };
            ok_response(&json!({
                "result": inbound.label(),
                "detail": detail,
                "view": view,
                "effects": effects,
            }))
        }
        Err(err) => session_error_response(&err),
    }
}

// ── POST /api/sync/timer ───────────────────────────────────────────

/// Body: `{"token": N, "nowMs": T}`; sent when a scheduled timer fires.
pub fn handle_timer_post(body: &str) -> String {
    let req: TimerRequest = match parse_json_body(body) {
        Ok(req) => req,
        Err(err) => return session_error_response(&err),
    };
    let result = session::with_session(|s| {
        let outcome = s.on_timer(req.token, req.now_ms);
        (outcome, s.take_effects())
    });
    match result {
        Ok((outcome, effects)) => {
            let (label, detail) = match outcome {
                TimerOutcome::Flushed(FlushOutcome::Written { revision }) => ("written", json!({ "revision": revision })),
                TimerOutcome::Flushed(FlushOutcome::Skipped { local, remote }) => {
                    ("skipped", json!({ "local": local, "remote": remote }))
                }
                TimerOutcome::Flushed(FlushOutcome::Failed(err)) => ("failed", json!({ "reason": err.to_string() })),
                TimerOutcome::Swept(removed) => ("swept", json!({ "removed": removed })),
                TimerOutcome::Ignored => ("ignored", Value::Null),
            };
            ok_response(&json!({ "result": label, "detail": detail, "effects": effects }))
        }
        Err(err) => session_error_response(&err),
    }
}

// ── POST /api/sync/clear ───────────────────────────────────────────

/// Remove the room key; the response effects carry `clear: true`.
pub fn handle_clear_post(_body: &str) -> String {
    let result = session::with_session(|s| {
        s.clear_room()?;
        Ok::<_, SessionError>(s.take_effects())
    })
    .and_then(|inner| inner);
    match result {
        Ok(effects) => ok_response(&json!({ "effects": effects })),
        Err(err) => session_error_response(&err),
    }
}

// ── GET /api/sync/outbox ───────────────────────────────────────────

/// Pending effects without doing anything else.
pub fn handle_outbox_get(_query: &str) -> String {
    match session::with_session(|s| s.take_effects()) {
        Ok(effects) => ok_response(&json!({ "effects": effects })),
        Err(err) => session_error_response(&err),
    }
}
