//! Async host for a [`ChunkRegistry`].
//!
//! The registry has no internal locking, so the service keeps it behind a
//! single [`tokio::sync::Mutex`]. Handoff completion is scheduled here as a
//! spawned sleep whose abort handle is stored with the pending handoff; the
//! cooling sweep, persistence flush and stats reporter run on fixed
//! intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::chunk_id::ChunkId;
use crate::handoff::HandoffTimer;
use crate::ids::EntityId;
use crate::registry::ChunkRegistry;
use crate::sink::PersistenceSink;

/// Outcome of one [`RegistryService::flush_dirty`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Chunks whose batch was written.
    pub chunks_written: usize,
    /// Entities acknowledged as persisted.
    pub entities_written: usize,
    /// Chunks whose write failed and stay dirty.
    pub chunks_failed: usize,
}

/// Shared handle to the one registry of a world process.
#[derive(Clone)]
pub struct RegistryService {
    registry: Arc<Mutex<ChunkRegistry>>,
}

impl RegistryService {
    /// Takes ownership of a registry.
    pub fn new(registry: ChunkRegistry) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
        }
    }

    /// Exclusive access to the registry for synchronous operations.
    pub async fn lock(&self) -> MutexGuard<'_, ChunkRegistry> {
        self.registry.lock().await
    }

    /// Starts a handoff and schedules its completion after the configured
    /// overlap window.
    ///
    /// Returns `false` if the source chunk does not own the entity.
    pub async fn handoff_entity(&self, from_chunk: ChunkId, to_chunk: ChunkId, entity_id: &EntityId) -> bool {
        let mut registry = self.registry.lock().await;
        let delay = registry.config().handoff_overlap_time();
        if registry
            .handoff_entity(from_chunk, to_chunk, entity_id)
            .is_none()
        {
            return false;
        }

        // The deadline is fixed here, not when the task is first polled. The
        // task cannot reach the lock before the timer is attached below.
        let deadline = tokio::time::sleep(delay);
        let shared = Arc::clone(&self.registry);
        let id = entity_id.clone();
        let task = tokio::spawn(async move {
            deadline.await;
            shared.lock().await.complete_handoff(&id);
        });
        registry.attach_handoff_timer(entity_id, HandoffTimer::new(task.abort_handle()));
        true
    }

    /// Runs the persistence handshake once against `sink`.
    ///
    /// Each write runs on the blocking pool with the registry unlocked. An
    /// entity is acknowledged only if it is still owned by the same chunk and
    /// unchanged since it was copied out, so edits made while the sink was
    /// writing stay dirty.
    pub async fn flush_dirty<S>(&self, sink: &Arc<S>) -> FlushReport
    where
        S: PersistenceSink + ?Sized + 'static,
    {
        let batches = self.registry.lock().await.get_dirty_entities();
        let mut report = FlushReport::default();

        for batch in batches {
            let chunk_id = batch.chunk_id;
            let writer = Arc::clone(sink);
            let written = tokio::task::spawn_blocking(move || {
                writer.persist(batch.chunk_id, &batch.entities).map(|()| batch)
            })
            .await;
            let batch = match written {
                Ok(Ok(batch)) => batch,
                Ok(Err(err)) => {
                    tracing::warn!(chunk = %chunk_id, error = %err, "persisting chunk failed");
                    report.chunks_failed += 1;
                    continue;
                }
                Err(err) => {
                    tracing::error!(chunk = %chunk_id, error = %err, "persistence task failed");
                    report.chunks_failed += 1;
                    continue;
                }
            };

            let mut registry = self.registry.lock().await;
            let unchanged: Vec<EntityId> = batch
                .entities
                .iter()
                .filter(|written| {
                    registry
                        .find_entity(&written.id)
                        .is_some_and(|(owner, current)| owner == batch.chunk_id && current == *written)
                })
                .map(|written| written.id.clone())
                .collect();
            report.entities_written += registry.mark_entities_persisted(batch.chunk_id, &unchanged);
            report.chunks_written += 1;
        }

        if report.chunks_written > 0 || report.chunks_failed > 0 {
            tracing::debug!(
                chunks = report.chunks_written,
                entities = report.entities_written,
                failed = report.chunks_failed,
                "dirty entities flushed"
            );
        }
        report
    }

    /// Spawns the cooling sweep on a fixed interval.
    pub fn spawn_cooling_sweep(&self, period: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let changed = registry.lock().await.process_cooling_chunks();
                for (chunk, state) in &changed {
                    tracing::debug!(chunk = %chunk, state = ?state, "cooling chunk demoted");
                }
            }
        })
    }

    /// Spawns a periodic [`flush_dirty`](Self::flush_dirty) against `sink`.
    pub fn spawn_persistence<S>(&self, sink: Arc<S>, period: Duration) -> JoinHandle<()>
    where
        S: PersistenceSink + ?Sized + 'static,
    {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                service.flush_dirty(&sink).await;
            }
        })
    }

    /// Spawns a task that logs [`RegistryStats`](crate::RegistryStats) on a fixed interval.
    pub fn spawn_stats_reporter(&self, period: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let stats = registry.lock().await.stats();
                tracing::info!(
                    chunks = stats.total_chunks,
                    hot = stats.hot,
                    warm = stats.warm,
                    cooling = stats.cooling,
                    cold = stats.cold,
                    players = stats.total_players,
                    subscriptions = stats.total_subscriptions,
                    entities = stats.total_entities,
                    handoffs = stats.pending_handoffs,
                    "registry stats"
                );
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
