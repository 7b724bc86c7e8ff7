//! The chunk entity registry.
//!
//! [`ChunkRegistry`] partitions the world into a grid of [`Chunk`]s and keeps
//! four indices in step:
//!
//! - chunk records keyed by [`ChunkId`] (lifecycle, subscribers, owned
//!   entities, overlap records),
//! - `entity_chunk_map`, the single source of truth for ownership,
//! - `player_subscriptions`, the reverse lookup used on disconnect,
//! - `overlap_holders`, which chunks hold an overlap record for an entity.
//!
//! Every mutator assumes serialized invocation. Wrap the registry in one
//! mutex or actor (see [`RegistryService`](crate::RegistryService)) when more
//! than one task drives it.

mod entities;
mod handoff;
mod lifecycle;
mod persistence;

pub use persistence::DirtyChunk;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_config::RegistryConfig;

use crate::chunk::{Chunk, ChunkState};
use crate::chunk_id::ChunkId;
use crate::clock::{Clock, SystemClock};
use crate::handoff::PendingHandoff;
use crate::ids::{EntityId, PlayerId};
use crate::ownership::{ListenerId, OwnershipChangeEvent, OwnershipChangeKind, OwnershipListeners};
use crate::stats::RegistryStats;

/// Server-side registry of chunks, their players, and the entities they own.
pub struct ChunkRegistry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    chunks: FxHashMap<ChunkId, Chunk>,
    entity_chunk_map: FxHashMap<EntityId, ChunkId>,
    player_subscriptions: FxHashMap<PlayerId, FxHashSet<ChunkId>>,
    overlap_holders: FxHashMap<EntityId, FxHashSet<ChunkId>>,
    pending_handoffs: FxHashMap<EntityId, PendingHandoff>,
    listeners: OwnershipListeners,
}

/// Looks up a chunk, creating it `Cold` on first use.
fn chunk_entry(chunks: &mut FxHashMap<ChunkId, Chunk>, id: ChunkId, now: u64) -> &mut Chunk {
    chunks.entry(id).or_insert_with(|| {
        tracing::trace!(chunk = %id, "chunk created");
        Chunk::new(id, now)
    })
}

impl ChunkRegistry {
    /// Creates an empty registry stamped by the wall clock.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty registry with an explicit time source.
    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            chunks: FxHashMap::default(),
            entity_chunk_map: FxHashMap::default(),
            player_subscriptions: FxHashMap::default(),
            overlap_holders: FxHashMap::default(),
            pending_handoffs: FxHashMap::default(),
            listeners: OwnershipListeners::new(),
        }
    }

    /// Grid geometry and timing windows.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current registry time in milliseconds.
    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Returns the chunk, creating it `Cold` if it does not exist yet.
    ///
    /// Idempotent: repeated calls return the same record.
    pub fn get_or_create_chunk(&mut self, id: ChunkId) -> &Chunk {
        let now = self.now();
        chunk_entry(&mut self.chunks, id, now)
    }

    /// The chunk record, if it exists.
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    /// Whether the chunk has been created.
    pub fn chunk_exists(&self, id: ChunkId) -> bool {
        self.chunks.contains_key(&id)
    }

    /// Iterates all chunk records in arbitrary order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Ids of chunks currently in `state`, sorted.
    pub fn chunks_in_state(&self, state: ChunkState) -> Vec<ChunkId> {
        let mut ids: Vec<ChunkId> = self
            .chunks
            .values()
            .filter(|chunk| chunk.state == state)
            .map(|chunk| chunk.id)
            .collect();
        ids.sort();
        ids
    }

    /// The chunk that contains a world-space position.
    pub fn chunk_id_for_position(&self, position: &[f64; 3]) -> ChunkId {
        ChunkId::from_world_position(position, self.config.chunk_size)
    }

    // -----------------------------------------------------------------------
    // Ownership notifications
    // -----------------------------------------------------------------------

    /// Registers a listener for ownership changes.
    ///
    /// Listeners run synchronously while the registry is borrowed; they must
    /// not call back into it.
    pub fn on_ownership_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&OwnershipChangeEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    /// Unregisters an ownership listener.
    pub fn remove_ownership_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn emit(
        &self,
        kind: OwnershipChangeKind,
        entity_id: &EntityId,
        from_chunk: Option<ChunkId>,
        to_chunk: Option<ChunkId>,
    ) {
        if self.listeners.is_empty() {
            return;
        }
        self.listeners.emit(&OwnershipChangeEvent {
            kind,
            entity_id: entity_id.clone(),
            from_chunk,
            to_chunk,
            timestamp: self.now(),
        });
    }

    /// Checks that at most one chunk owns the entity and that the reverse
    /// index agrees. Debug builds only.
    fn assert_single_owner(&self, entity_id: &EntityId) {
        if cfg!(debug_assertions) {
            let owners = self
                .chunks
                .values()
                .filter(|chunk| chunk.owns(entity_id))
                .count();
            debug_assert!(owners <= 1, "entity {entity_id} owned by {owners} chunks");
            if let Some(owner) = self.entity_chunk_map.get(entity_id) {
                debug_assert!(
                    self.chunks.get(owner).is_some_and(|chunk| chunk.owns(entity_id)),
                    "reverse index maps {entity_id} to {owner}, which does not own it"
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observability / admin
    // -----------------------------------------------------------------------

    /// Aggregate counts for dashboards.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for chunk in self.chunks.values() {
            stats.count_state(chunk.state);
            stats.total_subscriptions += chunk.subscribers.len();
            stats.overlap_records += chunk.overlap_entities.len();
        }
        stats.total_players = self.player_subscriptions.len();
        stats.total_entities = self.entity_chunk_map.len();
        stats.pending_handoffs = self.pending_handoffs.len();
        stats
    }

    /// Drops every chunk, index and pending handoff. Listeners stay registered.
    pub fn clear(&mut self) {
        for pending in self.pending_handoffs.values_mut() {
            pending.cancel_timer();
        }
        self.chunks.clear();
        self.entity_chunk_map.clear();
        self.player_subscriptions.clear();
        self.overlap_holders.clear();
        self.pending_handoffs.clear();
        tracing::debug!("chunk registry cleared");
    }
}

impl std::fmt::Debug for ChunkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRegistry")
            .field("config", &self.config)
            .field("chunks", &self.chunks.len())
            .field("entities", &self.entity_chunk_map.len())
            .field("pending_handoffs", &self.pending_handoffs.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}
