//! Local undo: a bounded per-room checkpoint stack kept in durable local
//! storage. Never replicated; restores re-enter through the sync service.

pub mod history;
pub mod storage;
