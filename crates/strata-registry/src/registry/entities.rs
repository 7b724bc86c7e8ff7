//! Entity ownership, mutation, and the overlap index.
//!
//! The overlap index serves two purposes: static border visibility (an owned
//! entity near an edge is visible from the neighbor across it) and handoff
//! visibility (the source records that an entity in transfer overlaps into
//! the destination). Overlap never implies ownership.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{ChunkRegistry, chunk_entry};
use crate::chunk_id::ChunkId;
use crate::entity::{Entity, EntityUpdate};
use crate::handoff::HandoffPhase;
use crate::ids::EntityId;
use crate::overlap;
use crate::ownership::OwnershipChangeKind;

/// Forgets that `chunk_id` holds an overlap record for `entity_id`.
fn release_holder(
    holders: &mut FxHashMap<EntityId, FxHashSet<ChunkId>>,
    entity_id: &EntityId,
    chunk_id: ChunkId,
) {
    if let Some(chunks) = holders.get_mut(entity_id) {
        chunks.remove(&chunk_id);
        if chunks.is_empty() {
            holders.remove(entity_id);
        }
    }
}

impl ChunkRegistry {
    /// Places an entity in a chunk as its owner and recomputes its border overlap.
    ///
    /// Marks the chunk dirty but not the entity: a newly registered entity is
    /// assumed to be persisted already by whoever created it.
    pub fn register_entity(&mut self, chunk_id: ChunkId, entity: Entity) {
        let now = self.now();
        let entity_id = entity.id.clone();
        if let Some(previous) = self.entity_chunk_map.get(&entity_id) {
            debug_assert_eq!(
                *previous, chunk_id,
                "entity {entity_id} registered in {chunk_id} while owned by {previous}"
            );
        }

        let chunk = chunk_entry(&mut self.chunks, chunk_id, now);
        chunk.entities.insert(entity_id.clone(), entity);
        chunk.is_dirty = true;
        chunk.last_update = now;
        self.entity_chunk_map.insert(entity_id.clone(), chunk_id);

        self.refresh_border_overlap(chunk_id, &entity_id);
        self.assert_single_owner(&entity_id);
        self.emit(OwnershipChangeKind::Claim, &entity_id, None, Some(chunk_id));
    }

    /// Removes an entity from its owning chunk, the reverse index, and the
    /// chunk's overlap records. Returns `None` if the chunk does not own it.
    pub fn unregister_entity(&mut self, chunk_id: ChunkId, entity_id: &EntityId) -> Option<Entity> {
        let now = self.now();
        let chunk = self.chunks.get_mut(&chunk_id)?;
        let entity = chunk.entities.remove(entity_id)?;
        chunk.overlap_entities.remove(entity_id);
        chunk.last_update = now;
        release_holder(&mut self.overlap_holders, entity_id, chunk_id);

        if self.entity_chunk_map.get(entity_id) == Some(&chunk_id) {
            self.entity_chunk_map.remove(entity_id);
        }
        self.emit(OwnershipChangeKind::Release, entity_id, Some(chunk_id), None);
        Some(entity)
    }

    /// Merges `updates` into an owned entity and marks it and its chunk dirty.
    ///
    /// A position change recomputes border overlap. Returns `false` if the
    /// chunk does not own the entity.
    pub fn update_entity(&mut self, chunk_id: ChunkId, entity_id: &EntityId, updates: EntityUpdate) -> bool {
        let now = self.now();
        let moved = updates.position.is_some();
        let Some(chunk) = self.chunks.get_mut(&chunk_id) else {
            return false;
        };
        let Some(entity) = chunk.entities.get_mut(entity_id) else {
            return false;
        };
        updates.apply_to(entity);
        entity.is_dirty = true;
        chunk.is_dirty = true;
        chunk.last_update = now;

        if moved {
            self.refresh_border_overlap(chunk_id, entity_id);
        }
        true
    }

    /// Owner and data of an entity, via the reverse index.
    ///
    /// Returns `None` for unknown ids and for stale index entries.
    pub fn find_entity(&self, entity_id: &EntityId) -> Option<(ChunkId, &Entity)> {
        let chunk_id = *self.entity_chunk_map.get(entity_id)?;
        let entity = self.chunks.get(&chunk_id)?.entities.get(entity_id)?;
        Some((chunk_id, entity))
    }

    /// The chunk that owns an entity.
    pub fn owner_of(&self, entity_id: &EntityId) -> Option<ChunkId> {
        self.find_entity(entity_id).map(|(chunk_id, _)| chunk_id)
    }

    /// Entities owned by a chunk; empty for unknown chunks.
    pub fn entities_in_chunk(&self, chunk_id: ChunkId) -> Vec<&Entity> {
        self.chunks
            .get(&chunk_id)
            .map(|chunk| chunk.entities.values().collect())
            .unwrap_or_default()
    }

    /// Owned entities plus every entity a neighbor records as overlapping into
    /// this chunk.
    pub fn get_visible_entities(&self, chunk_id: ChunkId) -> Vec<&Entity> {
        let mut visible = self.entities_in_chunk(chunk_id);

        for neighbor_id in chunk_id.neighbors() {
            let Some(neighbor) = self.chunks.get(&neighbor_id) else {
                continue;
            };
            for (entity_id, targets) in &neighbor.overlap_entities {
                if targets.contains(&chunk_id)
                    && let Some(entity) = neighbor.entities.get(entity_id)
                {
                    visible.push(entity);
                }
            }
        }
        visible
    }

    /// Chunks whose subscribers must hear about an entity update: the owner
    /// first, then its overlap targets sorted.
    pub fn get_chunks_for_entity(&self, chunk_id: ChunkId, entity_id: &EntityId) -> Vec<ChunkId> {
        let mut targets: Vec<ChunkId> = self
            .chunks
            .get(&chunk_id)
            .and_then(|chunk| chunk.overlap_targets(entity_id))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        targets.sort();

        let mut chunks = Vec::with_capacity(targets.len() + 1);
        chunks.push(chunk_id);
        chunks.extend(targets);
        chunks
    }

    /// Records on `from_chunk` that the entity is also visible from `to_chunk`.
    ///
    /// Returns `false` if `from_chunk` does not exist.
    pub fn add_to_overlap_zone(&mut self, entity_id: &EntityId, from_chunk: ChunkId, to_chunk: ChunkId) -> bool {
        let Some(chunk) = self.chunks.get_mut(&from_chunk) else {
            return false;
        };
        chunk
            .overlap_entities
            .entry(entity_id.clone())
            .or_default()
            .insert(to_chunk);
        self.overlap_holders
            .entry(entity_id.clone())
            .or_default()
            .insert(from_chunk);
        true
    }

    /// Rebuilds the border overlap record of an owned entity.
    ///
    /// Previous entries are replaced. An in-flight handoff out of this chunk
    /// keeps its destination in the record until completion.
    fn refresh_border_overlap(&mut self, chunk_id: ChunkId, entity_id: &EntityId) {
        let chunk_size = self.config.chunk_size;
        let margin = self.config.overlap_margin;
        let Some(chunk) = self.chunks.get_mut(&chunk_id) else {
            return;
        };
        let Some(entity) = chunk.entities.get(entity_id) else {
            return;
        };

        let mut targets: FxHashSet<ChunkId> =
            overlap::border_neighbors(chunk_id, &entity.position, chunk_size, margin)
                .into_iter()
                .collect();
        if let Some(pending) = self.pending_handoffs.get(entity_id)
            && pending.from_chunk == chunk_id
            && pending.phase == HandoffPhase::Transitioning
        {
            targets.insert(pending.to_chunk);
        }

        tracing::trace!(chunk = %chunk_id, entity = %entity_id, targets = targets.len(), "border overlap recomputed");
        if targets.is_empty() {
            chunk.overlap_entities.remove(entity_id);
            release_holder(&mut self.overlap_holders, entity_id, chunk_id);
        } else {
            chunk.overlap_entities.insert(entity_id.clone(), targets);
            self.overlap_holders
                .entry(entity_id.clone())
                .or_default()
                .insert(chunk_id);
        }
    }

    /// Removes every overlap record held for an entity, in any chunk.
    ///
    /// Returns the number of records removed.
    pub(super) fn clear_overlap_records(&mut self, entity_id: &EntityId) -> usize {
        let Some(holders) = self.overlap_holders.remove(entity_id) else {
            return 0;
        };
        holders
            .into_iter()
            .filter(|chunk_id| {
                self.chunks
                    .get_mut(chunk_id)
                    .is_some_and(|chunk| chunk.overlap_entities.remove(entity_id).is_some())
            })
            .count()
    }

    /// Chunks holding an overlap record for the entity, sorted.
    pub fn overlap_holders(&self, entity_id: &EntityId) -> Vec<ChunkId> {
        let mut ids: Vec<ChunkId> = self
            .overlap_holders
            .get(entity_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}
