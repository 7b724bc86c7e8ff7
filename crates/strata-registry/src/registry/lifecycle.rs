//! Subscription, presence, and the chunk lifecycle they drive.
//!
//! Subscription (wants updates) and presence (physically inside) are tracked
//! independently. Emptying either set on a `Hot` chunk starts the cooling
//! grace period.

use std::time::Duration;

use super::{ChunkRegistry, chunk_entry};
use crate::chunk::{ChunkState, Subscription};
use crate::chunk_id::ChunkId;
use crate::ids::{PlayerId, SocketId};

impl ChunkRegistry {
    /// Subscribes a player to a chunk's updates, creating the chunk if needed.
    ///
    /// Re-subscribing refreshes socket, position and LOD but keeps the
    /// original `subscribed_at`. A `Cold` chunk becomes `Warm`.
    pub fn subscribe_player(
        &mut self,
        chunk_id: ChunkId,
        player_id: PlayerId,
        socket_id: SocketId,
        position: [f64; 3],
        lod_level: Option<u8>,
    ) {
        let now = self.now();
        let chunk = chunk_entry(&mut self.chunks, chunk_id, now);
        let subscribed_at = chunk
            .subscribers
            .get(&player_id)
            .map_or(now, |existing| existing.subscribed_at);
        chunk.subscribers.insert(
            player_id.clone(),
            Subscription {
                player_id: player_id.clone(),
                socket_id,
                subscribed_at,
                position,
                lod_level,
            },
        );
        if chunk.state == ChunkState::Cold {
            chunk.transition(ChunkState::Warm, now);
        }
        chunk.last_update = now;

        self.player_subscriptions
            .entry(player_id)
            .or_default()
            .insert(chunk_id);
    }

    /// Removes a player's subscription and presence in one chunk.
    ///
    /// A `Hot` chunk left without subscribers starts cooling even if players
    /// are still present. Returns `true` if a subscription was removed.
    pub fn unsubscribe_player(&mut self, chunk_id: ChunkId, player_id: &PlayerId) -> bool {
        let now = self.now();

        if let Some(subscribed) = self.player_subscriptions.get_mut(player_id) {
            subscribed.remove(&chunk_id);
            if subscribed.is_empty() {
                self.player_subscriptions.remove(player_id);
            }
        }

        let Some(chunk) = self.chunks.get_mut(&chunk_id) else {
            return false;
        };
        let removed = chunk.subscribers.remove(player_id).is_some();
        chunk.present_players.remove(player_id);
        if chunk.subscribers.is_empty() && chunk.state == ChunkState::Hot {
            chunk.transition(ChunkState::Cooling, now);
        }
        if removed {
            chunk.last_update = now;
        }
        removed
    }

    /// Disconnect teardown: unsubscribes the player from every chunk.
    ///
    /// Returns the number of subscriptions removed.
    pub fn unsubscribe_player_from_all(&mut self, player_id: &PlayerId) -> usize {
        let Some(chunk_ids) = self.player_subscriptions.remove(player_id) else {
            return 0;
        };
        let removed = chunk_ids
            .into_iter()
            .filter(|chunk_id| self.unsubscribe_player(*chunk_id, player_id))
            .count();
        tracing::debug!(player = %player_id, chunks = removed, "player unsubscribed from all chunks");
        removed
    }

    /// Marks a player as physically inside (or outside) a chunk.
    ///
    /// Entering a `Warm` or `Cooling` chunk makes it `Hot`; the last player
    /// leaving a `Hot` chunk starts cooling. Subscriptions are not consulted.
    /// Returns `false` if the chunk does not exist.
    pub fn set_player_present(&mut self, chunk_id: ChunkId, player_id: &PlayerId, present: bool) -> bool {
        let now = self.now();
        let Some(chunk) = self.chunks.get_mut(&chunk_id) else {
            tracing::trace!(chunk = %chunk_id, player = %player_id, "presence for unknown chunk ignored");
            return false;
        };

        if present {
            chunk.present_players.insert(player_id.clone());
            if matches!(chunk.state, ChunkState::Warm | ChunkState::Cooling) {
                chunk.transition(ChunkState::Hot, now);
            }
        } else {
            chunk.present_players.remove(player_id);
            if chunk.present_players.is_empty() && chunk.state == ChunkState::Hot {
                chunk.transition(ChunkState::Cooling, now);
            }
        }
        chunk.last_update = now;
        true
    }

    /// Demotes every `Cooling` chunk whose grace period has elapsed: to `Warm`
    /// if it still owns entities, otherwise to `Cold`.
    ///
    /// Must be called on a fixed external tick. Returns the chunks that
    /// changed and their new state, sorted by id.
    pub fn process_cooling_chunks(&mut self) -> Vec<(ChunkId, ChunkState)> {
        let now = self.now();
        let timeout = self.config.cooling_timeout();
        let mut changed = Vec::new();

        for chunk in self.chunks.values_mut() {
            if chunk.state != ChunkState::Cooling {
                continue;
            }
            let started = chunk.cooling_start.unwrap_or(chunk.last_update);
            if Duration::from_millis(now.saturating_sub(started)) < timeout {
                continue;
            }
            let next = if chunk.entities.is_empty() {
                ChunkState::Cold
            } else {
                ChunkState::Warm
            };
            chunk.transition(next, now);
            changed.push((chunk.id, next));
        }

        changed.sort_by_key(|(id, _)| *id);
        changed
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Subscriptions of a chunk; empty for unknown chunks.
    pub fn get_subscribers(&self, chunk_id: ChunkId) -> Vec<&Subscription> {
        self.chunks
            .get(&chunk_id)
            .map(|chunk| chunk.subscribers.values().collect())
            .unwrap_or_default()
    }

    /// Sockets that must receive a chunk's updates; empty for unknown chunks.
    pub fn get_subscriber_socket_ids(&self, chunk_id: ChunkId) -> Vec<SocketId> {
        self.chunks
            .get(&chunk_id)
            .map(|chunk| {
                chunk
                    .subscribers
                    .values()
                    .map(|sub| sub.socket_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Chunks a player is subscribed to, sorted; empty for unknown players.
    pub fn get_player_subscriptions(&self, player_id: &PlayerId) -> Vec<ChunkId> {
        let mut ids: Vec<ChunkId> = self
            .player_subscriptions
            .get(player_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Players physically inside a chunk; empty for unknown chunks.
    pub fn present_players(&self, chunk_id: ChunkId) -> Vec<PlayerId> {
        self.chunks
            .get(&chunk_id)
            .map(|chunk| chunk.present_players.iter().cloned().collect())
            .unwrap_or_default()
    }
}
