//! Aggregate counters for dashboards.

use serde::Serialize;

use crate::chunk::ChunkState;

/// Snapshot of registry sizes, produced by [`ChunkRegistry::stats`](crate::ChunkRegistry::stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Chunks known to the registry.
    pub total_chunks: usize,
    /// Chunks in `Cold`.
    pub cold: usize,
    /// Chunks in `Warm`.
    pub warm: usize,
    /// Chunks in `Hot`.
    pub hot: usize,
    /// Chunks in `Cooling`.
    pub cooling: usize,
    /// (chunk, player) subscription pairs.
    pub total_subscriptions: usize,
    /// Players with at least one subscription.
    pub total_players: usize,
    /// Owned entities.
    pub total_entities: usize,
    /// Overlap records across all chunks.
    pub overlap_records: usize,
    /// Handoffs waiting for completion.
    pub pending_handoffs: usize,
}

impl RegistryStats {
    /// Counts one chunk in its state bucket.
    pub(crate) fn count_state(&mut self, state: ChunkState) {
        self.total_chunks += 1;
        match state {
            ChunkState::Cold => self.cold += 1,
            ChunkState::Warm => self.warm += 1,
            ChunkState::Hot => self.hot += 1,
            ChunkState::Cooling => self.cooling += 1,
        }
    }
}
