//! Chunk entity registry for a multiplayer world server.
//!
//! The world's horizontal plane is cut into square chunks. For each chunk the
//! registry tracks a lifecycle state (`Cold`, `Warm`, `Hot`, `Cooling`), the
//! players subscribed to and present in it, and the entities it owns. Every
//! entity has exactly one owning chunk; entities near a border are also
//! visible from the neighbors across it through the overlap index. Moving an
//! entity between chunks goes through a time-windowed handoff during which
//! both chunks see it.
//!
//! # Usage
//!
//! ```no_run
//! use strata_registry::{ChunkId, ChunkRegistry, Entity, RegistryConfig};
//!
//! let mut registry = ChunkRegistry::new(RegistryConfig::default());
//! let chunk = registry.chunk_id_for_position(&[10.0, 0.0, 10.0]);
//! registry.register_entity(chunk, Entity::new("tree-1", "oak", [10.0, 0.0, 10.0]));
//! assert_eq!(registry.owner_of(&"tree-1".into()), Some(ChunkId::new(0, 0)));
//! ```
//!
//! The registry itself is not synchronized. [`RegistryService`] wraps it in
//! a tokio mutex and drives handoff timers, the cooling sweep and periodic
//! persistence.

pub mod chunk;
pub mod chunk_id;
pub mod clock;
pub mod entity;
pub mod error;
pub mod handoff;
pub mod ids;
pub mod overlap;
pub mod ownership;
pub mod registry;
pub mod service;
pub mod sink;
pub mod stats;

pub use chunk::{Chunk, ChunkState, Subscription};
pub use chunk_id::ChunkId;
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use entity::{Entity, EntityUpdate, PersistenceTier};
pub use error::{ChunkIdParseError, PersistError};
pub use handoff::{HandoffPhase, HandoffTimer, PendingHandoff};
pub use ids::{EntityId, PlayerId, SocketId};
pub use ownership::{ListenerId, OwnershipChangeEvent, OwnershipChangeKind};
pub use registry::{ChunkRegistry, DirtyChunk};
pub use service::{FlushReport, RegistryService};
pub use sink::PersistenceSink;
pub use stats::RegistryStats;
pub use strata_config::RegistryConfig;

#[cfg(test)]
mod registry_tests;
