//! Dirty tracking and the persistence handshake.
//!
//! The persistence collaborator polls [`ChunkRegistry::get_dirty_entities`],
//! writes the entities, then acknowledges with
//! [`ChunkRegistry::mark_entities_persisted`].

use super::ChunkRegistry;
use crate::chunk_id::ChunkId;
use crate::entity::Entity;
use crate::ids::EntityId;

/// Dirty entities of one chunk, copied out for writing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyChunk {
    /// Owning chunk.
    pub chunk_id: ChunkId,
    /// Entities with `is_dirty` set, sorted by id.
    pub entities: Vec<Entity>,
}

impl DirtyChunk {
    /// Ids of the contained entities, for the acknowledgement.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|entity| entity.id.clone()).collect()
    }
}

impl ChunkRegistry {
    /// Dirty entities grouped by dirty chunk, sorted by chunk id.
    ///
    /// Only entities with their own dirty flag are returned, and a chunk with
    /// none is skipped even if the chunk itself is dirty.
    pub fn get_dirty_entities(&self) -> Vec<DirtyChunk> {
        let mut dirty: Vec<DirtyChunk> = self
            .chunks
            .values()
            .filter(|chunk| chunk.is_dirty)
            .filter_map(|chunk| {
                let mut entities: Vec<Entity> = chunk
                    .entities
                    .values()
                    .filter(|entity| entity.is_dirty)
                    .cloned()
                    .collect();
                if entities.is_empty() {
                    return None;
                }
                entities.sort_by(|a, b| a.id.cmp(&b.id));
                Some(DirtyChunk {
                    chunk_id: chunk.id,
                    entities,
                })
            })
            .collect();
        dirty.sort_by_key(|batch| batch.chunk_id);
        dirty
    }

    /// Clears the dirty flag of the named entities and stamps `last_saved`.
    ///
    /// The chunk stays dirty while any of its entities is still dirty.
    /// Unknown chunks and ids are ignored. Returns the number of entities
    /// marked.
    pub fn mark_entities_persisted(&mut self, chunk_id: ChunkId, entity_ids: &[EntityId]) -> usize {
        let now = self.now();
        let Some(chunk) = self.chunks.get_mut(&chunk_id) else {
            return 0;
        };

        let mut marked = 0;
        for entity_id in entity_ids {
            if let Some(entity) = chunk.entities.get_mut(entity_id) {
                entity.is_dirty = false;
                entity.last_saved = Some(now);
                marked += 1;
            }
        }
        chunk.is_dirty = chunk.entities.values().any(|entity| entity.is_dirty);
        marked
    }
}
