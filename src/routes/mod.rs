//! Route handlers. Each takes the raw query or body and returns a JSON
//! string: `{"ok": true, ...}` on success, `{"ok": false, "status", "error"}`
//! otherwise.

pub mod encounter;
pub mod session;
pub mod sync;
pub mod undo;
pub mod util;
