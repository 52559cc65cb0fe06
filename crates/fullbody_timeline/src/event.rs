// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger events and the producer/consumer queue that carries them.
//!
//! Events are pushed from whatever context recognizes a trigger and drained
//! once per tick by the scheduler.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of an entity in the external system.
///
/// Zero is reserved and never names a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Whether this id can name an entity
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// An occurrence the scheduler reacts to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Event tag, looked up in the snapshot's event map
    pub tag: String,
    /// Entity that raised the event
    pub entity: EntityId,
    /// Reserved retry counter; never consumed by the scheduler
    pub retries: u8,
}

impl TriggerEvent {
    /// Create an event for an entity
    pub fn new(tag: impl Into<String>, entity: EntityId) -> Self {
        Self {
            tag: tag.into(),
            entity,
            retries: 0,
        }
    }

    /// An event needs a tag and a real entity
    pub fn is_valid(&self) -> bool {
        !self.tag.is_empty() && self.entity.is_valid()
    }
}

/// Unbounded FIFO of trigger events shared between producers and the scheduler
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: Mutex<Vec<TriggerEvent>>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&self, event: TriggerEvent) {
        self.queue.lock().push(event);
    }

    /// Take the whole backlog in arrival order, leaving the queue empty
    pub fn drain(&self) -> Vec<TriggerEvent> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Drop everything queued
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
