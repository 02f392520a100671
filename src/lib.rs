//! SWADE card-initiative tracker, compiled to WASM and run in a Web Worker.
//!
//! Exports `handle_request(method, path, query, body)` for the worker bridge.
//! Routing uses `matchit`. The engine is pure: the host owns the room key,
//! the timers and the clock, and every response lists the effects it must
//! carry out (timers to set or cancel, room writes).

use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod game;
pub mod logging;
pub mod routes;
pub mod session;
pub mod sync;
pub mod undo;

/// Install the console logger at `level` (`error`..`trace`, default `info`).
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    logging::init(logging::parse_level(level));
}

/// Process an HTTP-like request and return a JSON string.
///
/// # Arguments
/// * `method`: HTTP method (`GET` or `POST`)
/// * `path`:   URL path (e.g. `/api/encounter/view`)
/// * `query`:  Query string (e.g. `?role=player`)
/// * `body`:   JSON request body. Empty string for GET requests.
#[wasm_bindgen]
pub fn handle_request(method: &str, path: &str, query: &str, body: &str) -> String {
    let mut router = matchit::Router::new();

    // Session lifecycle
    router.insert("/api/session/start", "session_start").ok();
    router.insert("/api/session/stop", "session_stop").ok();
    router.insert("/api/session/status", "session_status").ok();

    // Encounter
    router.insert("/api/encounter/view", "encounter_view").ok();
    router.insert("/api/encounter/command", "encounter_command").ok();
    router.insert("/api/encounter/cards", "encounter_cards").ok();

    // Host callbacks
    router.insert("/api/sync/inbound", "sync_inbound").ok();
    router.insert("/api/sync/timer", "sync_timer").ok();
    router.insert("/api/sync/outbox", "sync_outbox").ok();
    router.insert("/api/sync/clear", "sync_clear").ok();

    // Local undo
    router.insert("/api/undo", "undo").ok();
    router.insert("/api/undo/status", "undo_status").ok();
    router.insert("/api/undo/clear", "undo_clear").ok();

    match router.at(path) {
        Ok(matched) => match (*matched.value, method) {
            ("session_start", "POST") => routes::session::handle_start_post(body),
            ("session_stop", "POST") => routes::session::handle_stop_post(body),
            ("session_status", "GET") => routes::session::handle_status_get(query),

            ("encounter_view", "GET") => routes::encounter::handle_view_get(query),
            ("encounter_command", "POST") => routes::encounter::handle_command_post(body),
            ("encounter_cards", "GET") => routes::encounter::handle_cards_get(query),

            ("sync_inbound", "POST") => routes::sync::handle_inbound_post(body),
            ("sync_timer", "POST") => routes::sync::handle_timer_post(body),
            ("sync_outbox", "GET") => routes::sync::handle_outbox_get(query),
            ("sync_clear", "POST") => routes::sync::handle_clear_post(body),

            ("undo", "POST") => routes::undo::handle_undo_post(body),
            ("undo_status", "GET") => routes::undo::handle_status_get(query),
            ("undo_clear", "POST") => routes::undo::handle_clear_post(body),

            _ => method_not_allowed(),
        },
        Err(_) => not_found(),
    }
}

fn not_found() -> String {
    routes::util::error_response(404, "route not found")
}

fn method_not_allowed() -> String {
    routes::util::error_response(405, "method not allowed")
}
