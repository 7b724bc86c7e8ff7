//! Interface of the storage collaborator that receives dirty entities.

use crate::chunk_id::ChunkId;
use crate::entity::Entity;
use crate::error::PersistError;

/// Writes a chunk's dirty entities to durable storage.
///
/// Called on the blocking thread pool without the registry lock held, so
/// implementations may do synchronous I/O. On `Err` the entities stay dirty
/// and are offered again on the next flush.
pub trait PersistenceSink: Send + Sync {
    /// Persists `entities`, all owned by `chunk_id`.
    fn persist(&self, chunk_id: ChunkId, entities: &[Entity]) -> Result<(), PersistError>;
}
