//! Ownership-change notifications and their listener fan-out.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};

use crate::chunk_id::ChunkId;
use crate::ids::EntityId;

/// What happened to an entity's ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipChangeKind {
    /// A transfer between chunks started.
    Handoff,
    /// A chunk became the owner (registration, or the end of a handoff).
    Claim,
    /// A chunk gave the entity up without a successor.
    Release,
}

/// Notification payload delivered to ownership listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipChangeEvent {
    /// Kind of change.
    pub kind: OwnershipChangeKind,
    /// Affected entity.
    pub entity_id: EntityId,
    /// Previous owner, if any.
    pub from_chunk: Option<ChunkId>,
    /// New owner, if any.
    pub to_chunk: Option<ChunkId>,
    /// Milliseconds timestamp of the change.
    pub timestamp: u64,
}

/// Handle returned by [`OwnershipListeners::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

type Listener = Box<dyn Fn(&OwnershipChangeEvent) + Send + Sync>;

/// Ordered set of ownership listeners.
///
/// Listeners run synchronously in registration order. A listener that panics
/// is logged and skipped; the remaining listeners still receive the event.
/// Listeners run while the registry is borrowed and must not call back into it.
#[derive(Default)]
pub struct OwnershipListeners {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl OwnershipListeners {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its handle.
    pub fn add<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&OwnershipChangeEvent) + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` if the handle was unknown.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `event` to every listener. Returns how many panicked.
    pub fn emit(&self, event: &OwnershipChangeEvent) -> usize {
        let mut failures = 0;
        for (id, listener) in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                failures += 1;
                tracing::error!(
                    listener = id.0,
                    entity = %event.entity_id,
                    kind = ?event.kind,
                    "ownership listener panicked"
                );
            }
        }
        failures
    }
}

impl std::fmt::Debug for OwnershipListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
