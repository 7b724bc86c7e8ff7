//! Records of in-flight ownership transfers.

use tokio::task::AbortHandle;

use crate::chunk_id::ChunkId;
use crate::entity::Entity;
use crate::ids::EntityId;

/// Progress of a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoffPhase {
    /// Recorded, destination not yet linked.
    Pending,
    /// Visible from the destination, still owned by the source.
    Transitioning,
    /// Ownership moved. Complete records are removed immediately.
    Complete,
}

/// Cancellable completion task for one handoff.
///
/// Dropping the timer leaves the task running; only [`cancel`](Self::cancel)
/// stops it.
#[derive(Debug)]
pub struct HandoffTimer {
    handle: AbortHandle,
}

impl HandoffTimer {
    /// Wraps the abort handle of a spawned completion task.
    pub fn new(handle: AbortHandle) -> Self {
        Self { handle }
    }

    /// Stops the completion task if it has not run yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the completion task has finished or been aborted.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// A transfer of `entity_id` from `from_chunk` to `to_chunk`, keyed by entity.
#[derive(Debug)]
pub struct PendingHandoff {
    /// Entity being transferred.
    pub entity_id: EntityId,
    /// Current owner.
    pub from_chunk: ChunkId,
    /// Owner after completion.
    pub to_chunk: ChunkId,
    /// Milliseconds timestamp of the handoff call.
    pub start_time: u64,
    /// Milliseconds timestamp at which the handoff is due to complete.
    pub completes_at: u64,
    /// Progress.
    pub phase: HandoffPhase,
    /// Deep copy of the entity taken when the handoff started.
    pub entity: Entity,
    /// Completion task, when an async host scheduled one.
    pub timer: Option<HandoffTimer>,
}

impl PendingHandoff {
    /// Whether the handoff is due at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.phase != HandoffPhase::Complete && now >= self.completes_at
    }

    /// Cancels the attached completion task, if any.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
