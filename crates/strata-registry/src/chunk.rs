//! Per-chunk record: lifecycle state, interested and present players, owned
//! entities, and the overlap index.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::chunk_id::ChunkId;
use crate::entity::Entity;
use crate::ids::{EntityId, PlayerId, SocketId};

/// Lifecycle of a chunk.
///
/// `Cold` chunks live on disk only, `Warm` chunks are loaded with nobody
/// inside, `Hot` chunks have a player present, and `Cooling` chunks are in the
/// grace period before demotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkState {
    /// Disk-only.
    #[default]
    Cold,
    /// Loaded, players interested, nobody present.
    Warm,
    /// Someone is physically present.
    Hot,
    /// Grace period before demotion.
    Cooling,
}

/// A player's interest in one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscribed player.
    pub player_id: PlayerId,
    /// Connection that receives the chunk's updates.
    pub socket_id: SocketId,
    /// Milliseconds timestamp of the first subscription.
    pub subscribed_at: u64,
    /// Player position when the subscription was last refreshed.
    pub position: [f64; 3],
    /// Detail level the client asked for.
    pub lod_level: Option<u8>,
}

/// Registry record for one chunk.
///
/// Created lazily and never destroyed individually; only
/// [`ChunkRegistry::clear`](crate::ChunkRegistry::clear) drops chunks.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Grid id.
    pub id: ChunkId,
    /// Lifecycle state.
    pub state: ChunkState,
    /// Interested players.
    pub subscribers: FxHashMap<PlayerId, Subscription>,
    /// Players physically inside the chunk.
    pub present_players: FxHashSet<PlayerId>,
    /// Entities this chunk owns.
    pub entities: FxHashMap<EntityId, Entity>,
    /// Owned entities that are also visible from the listed neighbor chunks.
    pub overlap_entities: FxHashMap<EntityId, FxHashSet<ChunkId>>,
    /// Milliseconds timestamp of the last mutation.
    pub last_update: u64,
    /// When the chunk entered `Cooling`.
    pub cooling_start: Option<u64>,
    /// Structure or entity data changed since the last persistence sweep.
    pub is_dirty: bool,
}

impl Chunk {
    /// A fresh `Cold` chunk.
    pub fn new(id: ChunkId, now: u64) -> Self {
        Self {
            id,
            state: ChunkState::Cold,
            subscribers: FxHashMap::default(),
            present_players: FxHashSet::default(),
            entities: FxHashMap::default(),
            overlap_entities: FxHashMap::default(),
            last_update: now,
            cooling_start: None,
            is_dirty: false,
        }
    }

    /// Grid X coordinate.
    pub fn x(&self) -> i32 {
        self.id.x
    }

    /// Grid Z coordinate.
    pub fn z(&self) -> i32 {
        self.id.z
    }

    /// Whether this chunk owns the entity.
    pub fn owns(&self, entity_id: &EntityId) -> bool {
        self.entities.contains_key(entity_id)
    }

    /// Neighbor chunks the entity is recorded as overlapping into.
    pub fn overlap_targets(&self, entity_id: &EntityId) -> Option<&FxHashSet<ChunkId>> {
        self.overlap_entities.get(entity_id)
    }

    /// Moves the chunk to `next`, stamping or clearing the cooling start.
    pub(crate) fn transition(&mut self, next: ChunkState, now: u64) {
        if self.state == next {
            return;
        }
        tracing::debug!(chunk = %self.id, from = ?self.state, to = ?next, "chunk state change");
        self.state = next;
        self.cooling_start = (next == ChunkState::Cooling).then_some(now);
        self.last_update = now;
    }
}
