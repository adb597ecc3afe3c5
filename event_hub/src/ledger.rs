//! Event Ledger - the bounded, newest-first store of accepted events.
//!
//! The ledger is the only shared mutable state in the hub. Every operation
//! takes the same lock, and none of them does more than a linear pass over
//! at most `capacity` events.

use parking_lot::RwLock;
use std::collections::VecDeque;

use game_events::Event;

/// Default number of events retained.
pub const LEDGER_CAPACITY: usize = 100;

/// Result of appending an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The event was stored at the front of the ledger.
    Appended,
    /// An event with the same id is already retained; the new one was dropped.
    Duplicate,
}

/// Bounded, insertion-ordered event store.
///
/// Events are kept newest-first. Once the ledger is full, each append evicts
/// the oldest event regardless of kind.
#[derive(Debug)]
pub struct EventLedger {
    capacity: usize,
    events: RwLock<VecDeque<Event>>,
}

impl EventLedger {
    /// Create a ledger holding at most [`LEDGER_CAPACITY`] events.
    pub fn new() -> Self {
        Self::with_capacity(LEDGER_CAPACITY)
    }

    /// Create a ledger with a custom capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Insert an event at the front, evicting from the tail past capacity.
    ///
    /// An event whose id is already retained is not stored (first write wins).
    pub fn append(&self, event: Event) -> AppendOutcome {
        let mut events = self.events.write();

        if events.iter().any(|e| e.id == event.id) {
            tracing::warn!(event_id = %event.id, "duplicate event id, keeping the first copy");
            return AppendOutcome::Duplicate;
        }

        tracing::info!(
            event_id = %event.id,
            kind = %event.kind(),
            "added event to ledger"
        );
        events.push_front(event);
        events.truncate(self.capacity);
        AppendOutcome::Appended
    }

    /// Independent newest-first copy of all retained events.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.read().iter().cloned().collect()
    }

    /// Remove every event. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut events = self.events.write();
        let cleared = events.len();
        events.clear();
        cleared
    }

    /// Flag the matching event as ignored. Returns whether it was found.
    ///
    /// The event stays in the ledger and in snapshots.
    pub fn mark_ignored(&self, id: &str) -> bool {
        let mut events = self.events.write();
        match events.iter_mut().find(|e| e.id.as_str() == id) {
            Some(event) => {
                event.ignored = true;
                true
            }
            None => false,
        }
    }

    /// Get a copy of the event with the given id.
    pub fn get(&self, id: &str) -> Option<Event> {
        self.events
            .read()
            .iter()
            .find(|e| e.id.as_str() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new()
    }
}
