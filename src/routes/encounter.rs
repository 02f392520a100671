//! `/api/encounter/*` routes: read the tracker and run commands.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::SessionError;
use crate::game::cards::CardId;
use crate::game::commands::Command;
use crate::game::ordering::score;
use crate::game::view::Role;
use crate::routes::util::{get_param, ok_response, parse_json_body, parse_query, session_error_response};
use crate::session;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandRequest {
    command: Command,
    /// Undo label; defaults to the command's own description.
    #[serde(default)]
    description: Option<String>,
    now_ms: u64,
    #[serde(default)]
    role: Option<String>,
}

fn role_param(raw: Option<&str>) -> Result<Role, SessionError> {
    match raw {
        None | Some("") => Ok(Role::Gm),
        Some(r) => Role::parse(r).ok_or_else(|| SessionError::BadRequest(format!("unknown role `{r}`"))),
    }
}

// ── GET /api/encounter/view ────────────────────────────────────────

/// Handle GET /api/encounter/view?role={gm|player}
pub fn handle_view_get(query: &str) -> String {
    let params = parse_query(query);
    let role = match role_param(get_param(&params, "role")) {
        Ok(role) => role,
        Err(err) => return session_error_response(&err),
    };
    match session::with_session(|s| s.view(role)) {
        Ok(view) => ok_response(&json!({ "view": view })),
        Err(err) => session_error_response(&err),
    }
}

// ── POST /api/encounter/command ────────────────────────────────────

/// Body: `{"command": {"type": "dealRound", ...}, "description"?, "nowMs", "role"?}`.
/// Returns the updated view plus whatever the host must schedule or write.
pub fn handle_command_post(body: &str) -> String {
    let req: CommandRequest = match parse_json_body(body) {
        Ok(req) => req,
        Err(err) => return session_error_response(&err),
    };
    let role = match role_param(req.role.as_deref()) {
        Ok(role) => role,
        Err(err) => return session_error_response(&err),
    };
    let result = session::with_session(|s| {
        s.execute(&req.command, req.description.as_deref(), req.now_ms)
            .map(|_| ())?;
        Ok::<_, SessionError>((s.view(role), s.take_effects()))
    })
    .and_then(|inner| inner);

    match result {
        Ok((view, effects)) => ok_response(&json!({
            "command": req.command.describe(),
            "view": view,
            "effects": effects,
        })),
        Err(err) => session_error_response(&err),
    }
}

// ── GET /api/encounter/cards ───────────────────────────────────────

#[derive(Debug, Serialize)]
struct CatalogEntry {
    id: CardId,
    label: &'static str,
    score: i32,
    joker: bool,
}

/// The full 54-card catalog in deck order.
pub fn handle_cards_get(_query: &str) -> String {
    let cards: Vec<CatalogEntry> = CardId::all()
        .map(|id| CatalogEntry {
            id,
            label: id.label(),
            score: score(Some(id)),
            joker: id.is_joker(),
        })
        .collect();
    ok_response(&json!({ "cards": cards }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::session::handle_start_post;
    use serde_json::Value;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    fn start() {
        session::take_session();
        handle_start_post(r#"{"roomId":"enc","nowMs":1000,"config":{"seed":9}}"#);
    }

    fn command(cmd: &str) -> Value {
        parse(&handle_command_post(&format!(r#"{{"command":{cmd},"nowMs":2000}}"#)))
    }

    #[test]
    fn view_requires_session() {
        session::take_session();
        assert_eq!(parse(&handle_view_get("?role=gm"))["status"], 409);
    }

    #[test]
    fn bad_role_is_rejected() {
        start();
        assert_eq!(parse(&handle_view_get("?role=dm"))["status"], 400);
        session::take_session();
    }

    #[test]
    fn command_round_trip() {
        start();
        let body = command(r#"{"type":"createParticipant","name":"Ayla","participantType":"PC"}"#);
        assert_eq!(body["ok"], true);
        assert_eq!(body["view"]["rows"].as_array().unwrap().len(), 1);
        assert_eq!(body["effects"]["schedule"].as_array().unwrap().len(), 1);

        let body = command(r#"{"type":"dealRound"}"#);
        assert_eq!(body["view"]["phase"], "cards_dealt");
        assert_eq!(body["command"], "Deal round");
        session::take_session();
    }

    #[test]
    fn engine_errors_are_422() {
        start();
        let body = command(r#"{"type":"nextTurn"}"#);
        assert_eq!(body["ok"], false);
        assert_eq!(body["status"], 422);
        session::take_session();
    }

    #[test]
    fn malformed_command_is_400() {
        start();
        let body = command(r#"{"type":"flipTable"}"#);
        assert_eq!(body["status"], 400);
        session::take_session();
    }

    #[test]
    fn player_view_hides_npcs() {
        start();
        command(r#"{"type":"createParticipant","name":"Orc","participantType":"NPC"}"#);
        let gm = parse(&handle_view_get("?role=gm"));
        let player = parse(&handle_view_get("?role=player"));
        assert_eq!(gm["view"]["rows"].as_array().unwrap().len(), 1);
        assert!(player["view"]["rows"].as_array().unwrap().is_empty());
        session::take_session();
    }

    #[test]
    fn catalog_lists_every_card() {
        let body = parse(&handle_cards_get(""));
        let cards = body["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 54);
        assert_eq!(cards.iter().filter(|c| c["joker"] == true).count(), 2);
    }
}
