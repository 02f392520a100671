//! Shared request parsing and JSON response helpers for route handlers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::SessionError;

/// Parse `key=value&key2=value2` pairs.
pub fn parse_pairs(input: &str) -> Vec<(String, String)> {
    if input.is_empty() {
        return Vec::new();
    }
    input
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let val = parts.next().unwrap_or("");
            Some((percent_decode(key), percent_decode(val)))
        })
        .collect()
}

/// Percent-decode a URL-encoded value.
pub fn percent_decode(input: &str) -> String {
    let mut bytes = Vec::with_capacity(input.len());
    let mut chars = input.bytes();
    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars.next().unwrap_or(b'0');
            let lo = chars.next().unwrap_or(b'0');
            let hex = [hi, lo];
            if let Ok(s) = core::str::from_utf8(&hex) {
                if let Ok(val) = u8::from_str_radix(s, 16) {
                    bytes.push(val);
                    continue;
                }
            }
            bytes.extend_from_slice(&[b'%', hi, lo]);
        } else if b == b'+' {
            bytes.push(b' ');
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse a query string into key-value pairs.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let q = query.strip_prefix('?').unwrap_or(query);
    parse_pairs(q)
}

/// Helper to get a value by key from a list of key-value pairs.
pub fn get_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Decode a JSON request body. An empty body reads as `{}`.
pub fn parse_json_body<T: DeserializeOwned>(body: &str) -> Result<T, SessionError> {
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|e| SessionError::BadRequest(e.to_string()))
}

// ── Responses ──────────────────────────────────────────────────────

/// `{"ok": true, ...payload}`.
pub fn ok_response<T: Serialize>(payload: &T) -> String {
    let mut value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => return error_response(500, &e.to_string()),
    };
    match value.as_object_mut() {
        Some(map) => {
            map.insert("ok".into(), Value::Bool(true));
        }
        None => value = json!({ "ok": true, "data": value }),
    }
    value.to_string()
}

/// `{"ok": false, "status": N, "error": "..."}`.
pub fn error_response(status: u16, message: &str) -> String {
    json!({ "ok": false, "status": status, "error": message }).to_string()
}

pub fn status_of(err: &SessionError) -> u16 {
    match err {
        SessionError::BadRequest(_) => 400,
        SessionError::NotStarted => 409,
        SessionError::Engine(_) => 422,
        SessionError::Store(_) => 503,
    }
}

pub fn session_error_response(err: &SessionError) -> String {
    error_response(status_of(err), &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde::Deserialize;

    #[test]
    fn parse_pairs_works() {
        let pairs = parse_pairs("role=gm&room=abc&flag");
        assert_eq!(pairs.len(), 3);
        assert_eq!(get_param(&pairs, "role"), Some("gm"));
        assert_eq!(get_param(&pairs, "flag"), Some(""));
    }

    #[test]
    fn parse_pairs_empty() {
        assert!(parse_pairs("").is_empty());
    }

    #[test]
    fn percent_decode_plus_as_space() {
        assert_eq!(percent_decode("hello+world"), "hello world");
    }

    #[test]
    fn percent_decode_multibyte() {
        assert_eq!(percent_decode("A%E2%99%A0"), "A♠");
    }

    #[test]
    fn parse_query_strips_prefix() {
        let pairs = parse_query("?role=player");
        assert_eq!(get_param(&pairs, "role"), Some("player"));
    }

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default)]
        n: u32,
    }

    #[test]
    fn empty_json_body_is_empty_object() {
        let probe: Probe = parse_json_body("  ").unwrap();
        assert_eq!(probe.n, 0);
        assert!(matches!(parse_json_body::<Probe>("{"), Err(SessionError::BadRequest(_))));
    }

    #[test]
    fn responses_carry_ok_flag() {
        let body: Value = serde_json::from_str(&ok_response(&json!({ "x": 1 }))).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["x"], 1);

        let wrapped: Value = serde_json::from_str(&ok_response(&3)).unwrap();
        assert_eq!(wrapped["data"], 3);

        let err = SessionError::Engine(EngineError::NoActiveParticipant);
        let body: Value = serde_json::from_str(&session_error_response(&err)).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["status"], 422);
    }
}
