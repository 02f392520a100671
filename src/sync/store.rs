//! Room metadata store: the shared key holding the encounter document.
//!
//! The engine never talks to the hosting platform directly. [`RoomStore`] is
//! the seam; [`BridgeStore`] backs it in the browser by mirroring the host's
//! value and queueing writes for the host to forward, and [`MemoryRoom`]
//! backs it in tests as a room shared by several in-process clients.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::StoreError;

pub trait RoomStore {
    /// Current stored value; `None` when the room was never initialized.
    fn read(&self) -> Result<Option<Value>, StoreError>;
    fn write(&mut self, doc: Value) -> Result<(), StoreError>;
    /// Remove the key entirely.
    fn clear(&mut self) -> Result<(), StoreError>;
}

// ── MemoryRoom ─────────────────────────────────────────────────────

#[derive(Default)]
struct RoomInner {
    value: Option<Value>,
    fail_writes: bool,
    next_subscriber: u64,
    subscribers: Vec<(u64, VecDeque<Option<Value>>)>,
}

impl RoomInner {
    fn notify(&mut self) {
        let value = self.value.clone();
        for (_, queue) in &mut self.subscribers {
            queue.push_back(value.clone());
        }
    }
}

/// In-process room. Clones share the same stored value, like several
/// clients connected to one room.
#[derive(Clone, Default)]
pub struct MemoryRoom {
    inner: Rc<RefCell<RoomInner>>,
}

impl MemoryRoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving change notifications. Every write (including the
    /// subscriber's own) is queued on the returned feed until drained.
    pub fn subscribe(&self) -> ChangeFeed {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push((id, VecDeque::new()));
        ChangeFeed {
            room: Rc::clone(&self.inner),
            id,
        }
    }

    /// Make subsequent writes fail, simulating an unreachable store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    /// Put a raw value in place without notifying anyone.
    pub fn seed(&self, value: Value) {
        self.inner.borrow_mut().value = Some(value);
    }

    pub fn snapshot(&self) -> Option<Value> {
        self.inner.borrow().value.clone()
    }

    pub fn stored_revision(&self) -> Option<u64> {
        self.snapshot()
            .and_then(|v| v.get("revision").and_then(Value::as_u64))
    }
}

impl RoomStore for MemoryRoom {
    fn read(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshot())
    }

    fn write(&mut self, doc: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(StoreError::Unavailable("room store rejected the write".into()));
        }
        inner.value = Some(doc);
        inner.notify();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.value = None;
        inner.notify();
        Ok(())
    }
}

/// Queue of change notifications for one subscriber. Dropping the feed
/// unsubscribes.
pub struct ChangeFeed {
    room: Rc<RefCell<RoomInner>>,
    id: u64,
}

impl ChangeFeed {
    /// Take every notification received since the last drain, oldest first.
    pub fn drain(&self) -> Vec<Option<Value>> {
        let mut inner = self.room.borrow_mut();
        inner
            .subscribers
            .iter_mut()
            .find(|(id, _)| *id == self.id)
            .map(|(_, queue)| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        let id = self.id;
        self.room.borrow_mut().subscribers.retain(|(sub, _)| *sub != id);
    }
}

// ── BridgeStore ────────────────────────────────────────────────────

/// A pending operation the host must apply to the real room store.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Write(Value),
    Clear,
}

/// Browser-side store: reads come from a mirror of the last value the host
/// reported; writes update the mirror and wait in an outbox.
#[derive(Debug, Default)]
pub struct BridgeStore {
    mirror: Option<Value>,
    outbox: Vec<Outgoing>,
}

impl BridgeStore {
    pub fn new(initial: Option<Value>) -> Self {
        Self {
            mirror: initial,
            outbox: Vec::new(),
        }
    }

    /// Record a value the host saw in the room (from its change listener).
    pub fn observe(&mut self, value: Option<Value>) {
        self.mirror = value;
    }

    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

impl RoomStore for BridgeStore {
    fn read(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.mirror.clone())
    }

    fn write(&mut self, doc: Value) -> Result<(), StoreError> {
        self.mirror = Some(doc.clone());
        self.outbox.push(Outgoing::Write(doc));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.mirror = None;
        self.outbox.push(Outgoing::Clear);
        Ok(())
    }
}
