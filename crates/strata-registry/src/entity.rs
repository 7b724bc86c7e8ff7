//! World entities owned by chunks, and the patch type used to mutate them.

use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Identity rotation quaternion `[x, y, z, w]`.
pub const IDENTITY_ROTATION: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

/// How long an entity outlives the session that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceTier {
    /// Written to storage and restored on restart.
    #[default]
    Permanent,
    /// Kept while the world process runs, dropped on restart.
    Session,
    /// Never persisted.
    Transient,
}

/// A world object placed in a chunk.
///
/// Positions are world-space meters `[x, y, z]` with `y` as height; the
/// owning chunk is derived from `x` and `z` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique entity id.
    pub id: EntityId,
    /// Asset the client renders for this entity.
    pub asset_id: String,
    /// World-space position in meters.
    pub position: [f64; 3],
    /// Orientation quaternion `[x, y, z, w]`.
    pub rotation: [f64; 4],
    /// Uniform scale factor.
    pub scale: f64,
    /// Persistence class.
    pub persistence_tier: PersistenceTier,
    /// Whether the entity comes back after being destroyed.
    pub respawnable: bool,
    /// Free-form category (e.g. "tree", "npc").
    pub entity_type: String,
    /// Opaque per-type data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Changed since the last persistence sweep.
    #[serde(default)]
    pub is_dirty: bool,
    /// Milliseconds timestamp of the last successful persist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<u64>,
}

impl Entity {
    /// Creates an entity with identity rotation, unit scale and the default tier.
    pub fn new(id: impl Into<EntityId>, asset_id: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            id: id.into(),
            asset_id: asset_id.into(),
            position,
            rotation: IDENTITY_ROTATION,
            scale: 1.0,
            persistence_tier: PersistenceTier::default(),
            respawnable: false,
            entity_type: String::new(),
            metadata: None,
            is_dirty: false,
            last_saved: None,
        }
    }

    /// Sets the entity type.
    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    /// Sets the persistence tier.
    pub fn with_tier(mut self, tier: PersistenceTier) -> Self {
        self.persistence_tier = tier;
        self
    }
}

/// Field-wise patch for [`Entity`]. `None` leaves a field unchanged; the id
/// and the persistence bookkeeping cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityUpdate {
    /// New asset.
    pub asset_id: Option<String>,
    /// New world-space position.
    pub position: Option<[f64; 3]>,
    /// New rotation.
    pub rotation: Option<[f64; 4]>,
    /// New scale.
    pub scale: Option<f64>,
    /// New persistence tier.
    pub persistence_tier: Option<PersistenceTier>,
    /// New respawn flag.
    pub respawnable: Option<bool>,
    /// New entity type.
    pub entity_type: Option<String>,
    /// Replacement metadata.
    pub metadata: Option<serde_json::Value>,
}

impl EntityUpdate {
    /// A patch that only moves the entity.
    pub fn position(position: [f64; 3]) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Shallow-merges the patch into `entity`.
    pub(crate) fn apply_to(self, entity: &mut Entity) {
        if let Some(asset_id) = self.asset_id {
            entity.asset_id = asset_id;
        }
        if let Some(position) = self.position {
            entity.position = position;
        }
        if let Some(rotation) = self.rotation {
            entity.rotation = rotation;
        }
        if let Some(scale) = self.scale {
            entity.scale = scale;
        }
        if let Some(tier) = self.persistence_tier {
            entity.persistence_tier = tier;
        }
        if let Some(respawnable) = self.respawnable {
            entity.respawnable = respawnable;
        }
        if let Some(entity_type) = self.entity_type {
            entity.entity_type = entity_type;
        }
        if let Some(metadata) = self.metadata {
            entity.metadata = Some(metadata);
        }
    }
}
