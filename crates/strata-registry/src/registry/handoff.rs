//! Time-windowed ownership handoff between chunks.
//!
//! A handoff first makes the entity visible from the destination while the
//! source keeps ownership, then after `handoff_overlap_time_ms` moves
//! ownership and drops every overlap record for the entity. There is one
//! pending handoff per entity; a new call for the same entity replaces it.

use super::{ChunkRegistry, chunk_entry};
use crate::chunk_id::ChunkId;
use crate::handoff::{HandoffPhase, HandoffTimer, PendingHandoff};
use crate::ids::EntityId;
use crate::ownership::OwnershipChangeKind;

impl ChunkRegistry {
    /// Starts moving an entity from `from_chunk` to `to_chunk`.
    ///
    /// Returns `None` without side effects if `from_chunk` does not exist or
    /// does not own the entity. The caller (or
    /// [`process_due_handoffs`](Self::process_due_handoffs)) is responsible
    /// for calling [`complete_handoff`](Self::complete_handoff) once
    /// `completes_at` is reached.
    pub fn handoff_entity(
        &mut self,
        from_chunk: ChunkId,
        to_chunk: ChunkId,
        entity_id: &EntityId,
    ) -> Option<&PendingHandoff> {
        let now = self.now();
        let Some(snapshot) = self
            .chunks
            .get(&from_chunk)
            .and_then(|chunk| chunk.entities.get(entity_id))
            .cloned()
        else {
            tracing::debug!(entity = %entity_id, from = %from_chunk, "handoff ignored: source does not own entity");
            return None;
        };

        let pending = PendingHandoff {
            entity_id: entity_id.clone(),
            from_chunk,
            to_chunk,
            start_time: now,
            completes_at: now.saturating_add(self.config.handoff_overlap_time_ms),
            phase: HandoffPhase::Pending,
            entity: snapshot,
            timer: None,
        };
        if let Some(mut replaced) = self.pending_handoffs.insert(entity_id.clone(), pending) {
            replaced.cancel_timer();
            tracing::debug!(entity = %entity_id, previous_to = %replaced.to_chunk, "pending handoff replaced");
        }

        self.add_to_overlap_zone(entity_id, from_chunk, to_chunk);
        if let Some(pending) = self.pending_handoffs.get_mut(entity_id) {
            pending.phase = HandoffPhase::Transitioning;
        }

        tracing::debug!(entity = %entity_id, from = %from_chunk, to = %to_chunk, "handoff started");
        self.emit(
            OwnershipChangeKind::Handoff,
            entity_id,
            Some(from_chunk),
            Some(to_chunk),
        );
        self.pending_handoffs.get(entity_id)
    }

    /// Stores the completion task of a pending handoff so it can be cancelled
    /// when the handoff is replaced or the registry is cleared.
    ///
    /// Cancels `timer` and returns `false` if no handoff is pending.
    pub fn attach_handoff_timer(&mut self, entity_id: &EntityId, timer: HandoffTimer) -> bool {
        match self.pending_handoffs.get_mut(entity_id) {
            Some(pending) if pending.phase != HandoffPhase::Complete => {
                pending.cancel_timer();
                pending.timer = Some(timer);
                true
            }
            _ => {
                timer.cancel();
                false
            }
        }
    }

    /// Finishes a pending handoff: the destination (created `Cold` if needed)
    /// becomes the owner, both chunks are marked dirty, and all overlap
    /// records for the entity are dropped.
    ///
    /// No-op returning `false` if nothing is pending, so duplicate timers are
    /// harmless. A handoff whose entity now belongs to a chunk other than the
    /// source is dropped without effect.
    pub fn complete_handoff(&mut self, entity_id: &EntityId) -> bool {
        let now = self.now();
        let mut pending = match self.pending_handoffs.remove(entity_id) {
            Some(pending) if pending.phase != HandoffPhase::Complete => pending,
            Some(pending) => {
                self.pending_handoffs.insert(entity_id.clone(), pending);
                return false;
            }
            None => return false,
        };
        let (from_chunk, to_chunk) = (pending.from_chunk, pending.to_chunk);

        // Re-registered elsewhere during the window: the handoff is stale.
        if let Some(&owner) = self.entity_chunk_map.get(entity_id)
            && owner != from_chunk
        {
            tracing::debug!(entity = %entity_id, from = %from_chunk, to = %to_chunk, owner = %owner, "stale handoff dropped");
            return false;
        }

        let live = self.chunks.get_mut(&from_chunk).and_then(|source| {
            source.is_dirty = true;
            source.last_update = now;
            source.entities.remove(entity_id)
        });
        // The completion task may be the one running this call.
        pending.timer = None;
        pending.phase = HandoffPhase::Complete;
        let entity = match live {
            Some(entity) => entity,
            None => {
                tracing::warn!(entity = %entity_id, from = %from_chunk, "source lost entity during handoff, using snapshot");
                pending.entity
            }
        };

        let destination = chunk_entry(&mut self.chunks, to_chunk, now);
        destination.entities.insert(entity_id.clone(), entity);
        destination.is_dirty = true;
        destination.last_update = now;
        self.entity_chunk_map.insert(entity_id.clone(), to_chunk);

        let cleared = self.clear_overlap_records(entity_id);
        self.assert_single_owner(entity_id);
        tracing::debug!(entity = %entity_id, from = %from_chunk, to = %to_chunk, cleared, "handoff complete");
        self.emit(
            OwnershipChangeKind::Claim,
            entity_id,
            Some(from_chunk),
            Some(to_chunk),
        );
        true
    }

    /// Completes every handoff whose window has elapsed. For hosts that drive
    /// the registry from a synchronous tick instead of spawned timers.
    ///
    /// Returns the number of handoffs completed.
    pub fn process_due_handoffs(&mut self) -> usize {
        let now = self.now();
        let due: Vec<EntityId> = self
            .pending_handoffs
            .values()
            .filter(|pending| pending.is_due(now))
            .map(|pending| pending.entity_id.clone())
            .collect();
        due.iter()
            .filter(|entity_id| self.complete_handoff(entity_id))
            .count()
    }

    /// The pending handoff of an entity, if any.
    pub fn pending_handoff(&self, entity_id: &EntityId) -> Option<&PendingHandoff> {
        self.pending_handoffs.get(entity_id)
    }

    /// Number of handoffs waiting for completion.
    pub fn pending_handoff_count(&self) -> usize {
        self.pending_handoffs.len()
    }
}
