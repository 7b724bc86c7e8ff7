//! Behavioural tests for [`ChunkRegistry`] driven by a [`ManualClock`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chunk::ChunkState;
use crate::chunk_id::ChunkId;
use crate::clock::ManualClock;
use crate::entity::{Entity, EntityUpdate};
use crate::handoff::HandoffPhase;
use crate::ids::{EntityId, PlayerId, SocketId};
use crate::ownership::{OwnershipChangeEvent, OwnershipChangeKind};
use crate::registry::ChunkRegistry;
use crate::stats::RegistryStats;
use strata_config::RegistryConfig;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn registry() -> (ChunkRegistry, ManualClock) {
    let clock = ManualClock::new(1_000);
    let registry = ChunkRegistry::with_clock(RegistryConfig::default(), Arc::new(clock.clone()));
    (registry, clock)
}

fn c(x: i32, z: i32) -> ChunkId {
    ChunkId::new(x, z)
}

fn eid(id: &str) -> EntityId {
    EntityId::from(id)
}

fn pid(id: &str) -> PlayerId {
    PlayerId::from(id)
}

fn subscribe(registry: &mut ChunkRegistry, chunk: ChunkId, player: &str) {
    registry.subscribe_player(
        chunk,
        pid(player),
        SocketId::new(format!("sock-{player}")),
        [0.0, 0.0, 0.0],
        None,
    );
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn visible_ids(registry: &ChunkRegistry, chunk: ChunkId) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = registry
        .get_visible_entities(chunk)
        .iter()
        .map(|e| e.id.clone())
        .collect();
    ids.sort();
    ids
}

fn record_events(registry: &mut ChunkRegistry) -> Arc<Mutex<Vec<OwnershipChangeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    registry.on_ownership_change(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

// ---------------------------------------------------------------------------
// Chunk records and lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_get_or_create_chunk_is_idempotent() {
    let (mut registry, clock) = registry();
    let created_at = registry.get_or_create_chunk(c(4, -2)).last_update;
    clock.advance(ms(500));
    let again = registry.get_or_create_chunk(c(4, -2));
    assert_eq!(again.state, ChunkState::Cold);
    assert_eq!(again.last_update, created_at);
    assert_eq!(registry.stats().total_chunks, 1);
}

#[test]
fn test_first_subscription_warms_chunk_once() {
    let (mut registry, _clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    assert_eq!(registry.chunk(c(0, 0)).unwrap().state, ChunkState::Warm);

    subscribe(&mut registry, c(0, 0), "p2");
    assert_eq!(registry.chunk(c(0, 0)).unwrap().state, ChunkState::Warm);
    assert_eq!(registry.get_subscribers(c(0, 0)).len(), 2);

    let mut sockets = registry.get_subscriber_socket_ids(c(0, 0));
    sockets.sort();
    assert_eq!(sockets, vec![SocketId::from("sock-p1"), SocketId::from("sock-p2")]);
}

#[test]
fn test_resubscribe_keeps_subscribed_at() {
    let (mut registry, clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    clock.advance(ms(2_000));
    registry.subscribe_player(c(0, 0), pid("p1"), SocketId::from("sock-new"), [5.0, 0.0, 5.0], Some(2));

    let subs = registry.get_subscribers(c(0, 0));
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].subscribed_at, 1_000);
    assert_eq!(subs[0].socket_id, SocketId::from("sock-new"));
    assert_eq!(subs[0].lod_level, Some(2));
}

#[test]
fn test_presence_heats_chunk_without_subscribers() {
    let (mut registry, _clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    assert!(registry.unsubscribe_player(c(0, 0), &pid("p1")));
    assert_eq!(registry.chunk(c(0, 0)).unwrap().state, ChunkState::Warm);

    assert!(registry.set_player_present(c(0, 0), &pid("p2"), true));
    let chunk = registry.chunk(c(0, 0)).unwrap();
    assert_eq!(chunk.state, ChunkState::Hot);
    assert!(chunk.subscribers.is_empty());
    assert_eq!(registry.present_players(c(0, 0)), vec![pid("p2")]);
}

#[test]
fn test_presence_on_unknown_chunk_is_ignored() {
    let (mut registry, _clock) = registry();
    assert!(!registry.set_player_present(c(9, 9), &pid("p1"), true));
    assert!(!registry.chunk_exists(c(9, 9)));
}

#[test]
fn test_presence_does_not_heat_cold_chunk() {
    let (mut registry, _clock) = registry();
    registry.get_or_create_chunk(c(0, 0));
    registry.set_player_present(c(0, 0), &pid("p1"), true);
    assert_eq!(registry.chunk(c(0, 0)).unwrap().state, ChunkState::Cold);
}

#[test]
fn test_last_unsubscribe_cools_hot_chunk_despite_presence() {
    let (mut registry, _clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    registry.set_player_present(c(0, 0), &pid("p1"), true);
    registry.set_player_present(c(0, 0), &pid("p2"), true);

    registry.unsubscribe_player(c(0, 0), &pid("p1"));
    let chunk = registry.chunk(c(0, 0)).unwrap();
    assert_eq!(chunk.state, ChunkState::Cooling);
    assert_eq!(chunk.cooling_start, Some(1_000));
    assert_eq!(registry.present_players(c(0, 0)), vec![pid("p2")]);
}

#[test]
fn test_last_player_leaving_cools_chunk() {
    let (mut registry, _clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    registry.set_player_present(c(0, 0), &pid("p1"), true);
    registry.set_player_present(c(0, 0), &pid("p1"), false);
    assert_eq!(registry.chunk(c(0, 0)).unwrap().state, ChunkState::Cooling);
}

#[test]
fn test_reentering_cooling_chunk_reheats_it() {
    let (mut registry, _clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    registry.set_player_present(c(0, 0), &pid("p1"), true);
    registry.set_player_present(c(0, 0), &pid("p1"), false);
    registry.set_player_present(c(0, 0), &pid("p1"), true);

    let chunk = registry.chunk(c(0, 0)).unwrap();
    assert_eq!(chunk.state, ChunkState::Hot);
    assert!(chunk.cooling_start.is_none());
}

#[test]
fn test_cooling_waits_for_timeout() {
    let (mut registry, clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    registry.set_player_present(c(0, 0), &pid("p1"), true);
    registry.set_player_present(c(0, 0), &pid("p1"), false);

    clock.advance(ms(29_999));
    assert!(registry.process_cooling_chunks().is_empty());
    assert_eq!(registry.chunk(c(0, 0)).unwrap().state, ChunkState::Cooling);

    clock.advance(ms(1));
    assert_eq!(registry.process_cooling_chunks(), vec![(c(0, 0), ChunkState::Cold)]);
    assert!(registry.chunk(c(0, 0)).unwrap().cooling_start.is_none());
}

#[test]
fn test_cooling_respects_configured_timeout() {
    let clock = ManualClock::new(0);
    let config = RegistryConfig {
        cooling_timeout_ms: 5,
        ..RegistryConfig::default()
    };
    let mut registry = ChunkRegistry::with_clock(config, Arc::new(clock.clone()));
    subscribe(&mut registry, c(0, 0), "p1");
    registry.set_player_present(c(0, 0), &pid("p1"), true);
    registry.unsubscribe_player(c(0, 0), &pid("p1"));

    clock.advance(ms(4));
    assert!(registry.process_cooling_chunks().is_empty());
    clock.advance(ms(1));
    assert_eq!(registry.process_cooling_chunks(), vec![(c(0, 0), ChunkState::Cold)]);
}

#[test]
fn test_cooling_chunk_with_entities_stays_warm() {
    let (mut registry, clock) = registry();
    registry.register_entity(c(1, 1), Entity::new("rock", "rock", [96.0, 0.0, 96.0]));
    subscribe(&mut registry, c(1, 1), "p1");
    subscribe(&mut registry, c(2, 2), "p1");
    registry.set_player_present(c(1, 1), &pid("p1"), true);
    registry.set_player_present(c(2, 2), &pid("p1"), true);
    registry.set_player_present(c(1, 1), &pid("p1"), false);
    registry.set_player_present(c(2, 2), &pid("p1"), false);

    clock.advance(ms(30_000));
    assert_eq!(
        registry.process_cooling_chunks(),
        vec![(c(1, 1), ChunkState::Warm), (c(2, 2), ChunkState::Cold)]
    );
    assert_eq!(registry.chunks_in_state(ChunkState::Warm), vec![c(1, 1)]);
}

#[test]
fn test_unsubscribe_from_all() {
    let (mut registry, _clock) = registry();
    for chunk in [c(0, 0), c(1, 0), c(0, 1)] {
        subscribe(&mut registry, chunk, "p1");
    }
    subscribe(&mut registry, c(0, 0), "p2");
    registry.set_player_present(c(1, 0), &pid("p1"), true);
    assert_eq!(registry.get_player_subscriptions(&pid("p1")), vec![c(0, 0), c(0, 1), c(1, 0)]);

    assert_eq!(registry.unsubscribe_player_from_all(&pid("p1")), 3);
    assert!(registry.get_player_subscriptions(&pid("p1")).is_empty());
    assert_eq!(registry.get_subscribers(c(0, 0)).len(), 1);
    assert_eq!(registry.chunk(c(1, 0)).unwrap().state, ChunkState::Cooling);
    assert!(registry.present_players(c(1, 0)).is_empty());
    assert_eq!(registry.unsubscribe_player_from_all(&pid("p1")), 0);
}

#[test]
fn test_unsubscribe_unknown_is_false() {
    let (mut registry, _clock) = registry();
    assert!(!registry.unsubscribe_player(c(0, 0), &pid("p1")));
    subscribe(&mut registry, c(0, 0), "p1");
    assert!(!registry.unsubscribe_player(c(0, 0), &pid("p2")));
}

// ---------------------------------------------------------------------------
// Entities and overlap
// ---------------------------------------------------------------------------

#[test]
fn test_register_and_find_entity() {
    let (mut registry, _clock) = registry();
    let chunk = registry.chunk_id_for_position(&[-10.0, 4.0, 70.0]);
    assert_eq!(chunk, c(-1, 1));
    registry.register_entity(chunk, Entity::new("lamp", "lamp", [-10.0, 4.0, 70.0]));

    let (owner, entity) = registry.find_entity(&eid("lamp")).unwrap();
    assert_eq!(owner, c(-1, 1));
    assert_eq!(entity.asset_id, "lamp");
    assert_eq!(registry.entities_in_chunk(c(-1, 1)).len(), 1);
    assert!(registry.find_entity(&eid("missing")).is_none());
}

#[test]
fn test_west_border_entity_is_visible_from_west_neighbor() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [2.0, 10.0, 30.0]));

    assert_eq!(visible_ids(&registry, c(-1, 0)), vec![eid("e")]);
    assert_eq!(visible_ids(&registry, c(0, 0)), vec![eid("e")]);
    assert!(visible_ids(&registry, c(1, 0)).is_empty());
    assert_eq!(registry.get_chunks_for_entity(c(0, 0), &eid("e")), vec![c(0, 0), c(-1, 0)]);
    // Visibility never implies ownership.
    assert_eq!(registry.owner_of(&eid("e")), Some(c(0, 0)));
    assert!(registry.entities_in_chunk(c(-1, 0)).is_empty());
}

#[test]
fn test_interior_entity_has_no_overlap() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [32.0, 0.0, 32.0]));

    for neighbor in c(0, 0).neighbors() {
        assert!(visible_ids(&registry, neighbor).is_empty());
    }
    assert_eq!(registry.get_chunks_for_entity(c(0, 0), &eid("e")), vec![c(0, 0)]);
    assert!(registry.overlap_holders(&eid("e")).is_empty());
}

#[test]
fn test_corner_entity_overlaps_three_neighbors() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [2.0, 0.0, 2.0]));

    assert_eq!(
        registry.get_chunks_for_entity(c(0, 0), &eid("e")),
        vec![c(0, 0), c(-1, -1), c(-1, 0), c(0, -1)]
    );
    assert_eq!(registry.stats().overlap_records, 1);
}

#[test]
fn test_margin_bound_is_strict() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [8.0, 0.0, 56.0]));
    assert_eq!(registry.get_chunks_for_entity(c(0, 0), &eid("e")), vec![c(0, 0)]);
}

#[test]
fn test_moving_inward_drops_overlap() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [62.0, 0.0, 30.0]));
    assert_eq!(visible_ids(&registry, c(1, 0)), vec![eid("e")]);

    assert!(registry.update_entity(c(0, 0), &eid("e"), EntityUpdate::position([30.0, 0.0, 30.0])));
    assert!(visible_ids(&registry, c(1, 0)).is_empty());
    assert!(registry.overlap_holders(&eid("e")).is_empty());
}

#[test]
fn test_update_merges_fields() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [30.0, 0.0, 30.0]));
    let update = EntityUpdate {
        scale: Some(2.5),
        metadata: Some(serde_json::json!({ "hp": 40 })),
        ..EntityUpdate::default()
    };
    assert!(registry.update_entity(c(0, 0), &eid("e"), update));

    let (_, entity) = registry.find_entity(&eid("e")).unwrap();
    assert_eq!(entity.scale, 2.5);
    assert_eq!(entity.asset_id, "crate");
    assert_eq!(entity.metadata, Some(serde_json::json!({ "hp": 40 })));
    assert!(!registry.update_entity(c(1, 0), &eid("e"), EntityUpdate::default()));
}

#[test]
fn test_unregister_removes_everything() {
    let (mut registry, _clock) = registry();
    let events = record_events(&mut registry);
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [2.0, 0.0, 30.0]));

    assert!(registry.unregister_entity(c(1, 0), &eid("e")).is_none());
    let removed = registry.unregister_entity(c(0, 0), &eid("e")).unwrap();
    assert_eq!(removed.id, eid("e"));
    assert!(registry.find_entity(&eid("e")).is_none());
    assert!(visible_ids(&registry, c(-1, 0)).is_empty());
    assert!(registry.overlap_holders(&eid("e")).is_empty());

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind, OwnershipChangeKind::Release);
    assert_eq!(events[1].from_chunk, Some(c(0, 0)));
    assert_eq!(events[1].to_chunk, None);
}

#[test]
fn test_add_to_overlap_zone_requires_source() {
    let (mut registry, _clock) = registry();
    assert!(!registry.add_to_overlap_zone(&eid("e"), c(0, 0), c(1, 0)));
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [30.0, 0.0, 30.0]));
    assert!(registry.add_to_overlap_zone(&eid("e"), c(0, 0), c(1, 1)));
    assert_eq!(visible_ids(&registry, c(1, 1)), vec![eid("e")]);
    assert_eq!(registry.overlap_holders(&eid("e")), vec![c(0, 0)]);
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

#[test]
fn test_handoff_overlaps_then_transfers() {
    let (mut registry, clock) = registry();
    let events = record_events(&mut registry);
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));

    let pending = registry.handoff_entity(c(0, 0), c(1, 0), &eid("e1")).unwrap();
    assert_eq!(pending.phase, HandoffPhase::Transitioning);
    assert_eq!(pending.completes_at, 1_200);
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(0, 0)));
    assert_eq!(visible_ids(&registry, c(1, 0)), vec![eid("e1")]);

    clock.advance(ms(199));
    assert_eq!(registry.process_due_handoffs(), 0);
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(0, 0)));

    clock.advance(ms(1));
    assert_eq!(registry.process_due_handoffs(), 1);
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(1, 0)));
    assert!(registry.entities_in_chunk(c(0, 0)).is_empty());
    assert!(registry.pending_handoff(&eid("e1")).is_none());
    assert!(registry.overlap_holders(&eid("e1")).is_empty());
    assert!(registry.chunk(c(0, 0)).unwrap().is_dirty);
    assert!(registry.chunk(c(1, 0)).unwrap().is_dirty);
    assert_eq!(registry.chunk(c(1, 0)).unwrap().state, ChunkState::Cold);

    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| (e.kind, e.from_chunk, e.to_chunk)).collect();
    assert_eq!(
        kinds,
        vec![
            (OwnershipChangeKind::Claim, None, Some(c(0, 0))),
            (OwnershipChangeKind::Handoff, Some(c(0, 0)), Some(c(1, 0))),
            (OwnershipChangeKind::Claim, Some(c(0, 0)), Some(c(1, 0))),
        ]
    );
}

#[test]
fn test_handoff_from_non_owner_is_rejected() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));
    assert!(registry.handoff_entity(c(5, 5), c(1, 0), &eid("e1")).is_none());
    assert!(registry.handoff_entity(c(0, 0), c(1, 0), &eid("ghost")).is_none());
    assert_eq!(registry.pending_handoff_count(), 0);
    assert!(!registry.complete_handoff(&eid("e1")));
}

#[test]
fn test_completion_keeps_edits_made_during_window() {
    let (mut registry, clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));
    registry.handoff_entity(c(0, 0), c(1, 0), &eid("e1"));
    registry.update_entity(c(0, 0), &eid("e1"), EntityUpdate::position([63.0, 0.0, 32.0]));

    clock.advance(ms(200));
    assert!(registry.complete_handoff(&eid("e1")));
    let (owner, entity) = registry.find_entity(&eid("e1")).unwrap();
    assert_eq!(owner, c(1, 0));
    assert_eq!(entity.position, [63.0, 0.0, 32.0]);
    assert!(entity.is_dirty);
}

#[test]
fn test_position_update_during_handoff_keeps_destination_visible() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));
    registry.handoff_entity(c(0, 0), c(0, 1), &eid("e1"));
    registry.update_entity(c(0, 0), &eid("e1"), EntityUpdate::position([33.0, 0.0, 32.0]));
    assert_eq!(visible_ids(&registry, c(0, 1)), vec![eid("e1")]);
}

#[test]
fn test_replaced_handoff_uses_new_target_and_window() {
    let (mut registry, clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));
    registry.handoff_entity(c(0, 0), c(1, 0), &eid("e1"));
    clock.advance(ms(150));
    let pending = registry.handoff_entity(c(0, 0), c(0, 1), &eid("e1")).unwrap();
    assert_eq!(pending.completes_at, 1_350);
    assert_eq!(registry.pending_handoff_count(), 1);

    clock.advance(ms(50));
    assert_eq!(registry.process_due_handoffs(), 0);

    clock.advance(ms(150));
    assert_eq!(registry.process_due_handoffs(), 1);
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(0, 1)));
    assert!(visible_ids(&registry, c(1, 0)).is_empty());
}

#[test]
fn test_completion_after_unregister_uses_snapshot() {
    let (mut registry, clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));
    registry.handoff_entity(c(0, 0), c(1, 0), &eid("e1"));
    registry.unregister_entity(c(0, 0), &eid("e1"));

    clock.advance(ms(200));
    assert!(registry.complete_handoff(&eid("e1")));
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(1, 0)));
    assert!(!registry.complete_handoff(&eid("e1")));
}

#[test]
fn test_reregister_during_handoff_keeps_single_owner() {
    let (mut registry, clock) = registry();
    let events = record_events(&mut registry);
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));
    registry.handoff_entity(c(0, 0), c(1, 0), &eid("e1"));
    registry.unregister_entity(c(0, 0), &eid("e1"));
    registry.register_entity(c(2, 2), Entity::new("e1", "cart", [160.0, 0.0, 160.0]));

    clock.advance(ms(200));
    assert_eq!(registry.process_due_handoffs(), 0);
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(2, 2)));
    assert_eq!(registry.pending_handoff_count(), 0);
    assert!(registry.entities_in_chunk(c(1, 0)).is_empty());
    let owners = registry.chunks().filter(|chunk| chunk.owns(&eid("e1"))).count();
    assert_eq!(owners, 1);

    let last = events.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.kind, OwnershipChangeKind::Claim);
    assert_eq!(last.from_chunk, None);
    assert_eq!(last.to_chunk, Some(c(2, 2)));
}

#[test]
fn test_huge_handoff_window_never_comes_due() {
    let clock = ManualClock::new(1_000);
    let config = RegistryConfig {
        handoff_overlap_time_ms: u64::MAX,
        ..RegistryConfig::default()
    };
    let mut registry = ChunkRegistry::with_clock(config, Arc::new(clock.clone()));
    registry.register_entity(c(0, 0), Entity::new("e1", "cart", [32.0, 0.0, 32.0]));

    let pending = registry.handoff_entity(c(0, 0), c(1, 0), &eid("e1")).unwrap();
    assert_eq!(pending.completes_at, u64::MAX);
    clock.advance(ms(60_000));
    assert_eq!(registry.process_due_handoffs(), 0);
    assert_eq!(registry.owner_of(&eid("e1")), Some(c(0, 0)));
}

// ---------------------------------------------------------------------------
// Persistence handshake
// ---------------------------------------------------------------------------

#[test]
fn test_registered_entity_is_not_dirty() {
    let (mut registry, _clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("e", "crate", [30.0, 0.0, 30.0]));
    assert!(registry.chunk(c(0, 0)).unwrap().is_dirty);
    assert!(registry.get_dirty_entities().is_empty());
}

#[test]
fn test_dirty_entities_and_acknowledgement() {
    let (mut registry, clock) = registry();
    registry.register_entity(c(0, 0), Entity::new("a", "crate", [30.0, 0.0, 30.0]));
    registry.register_entity(c(0, 0), Entity::new("b", "crate", [31.0, 0.0, 30.0]));
    registry.register_entity(c(3, 0), Entity::new("c", "crate", [200.0, 0.0, 30.0]));
    registry.update_entity(c(0, 0), &eid("b"), EntityUpdate::position([33.0, 0.0, 30.0]));
    registry.update_entity(c(0, 0), &eid("a"), EntityUpdate::position([34.0, 0.0, 30.0]));
    registry.update_entity(c(3, 0), &eid("c"), EntityUpdate::position([201.0, 0.0, 30.0]));

    let dirty = registry.get_dirty_entities();
    assert_eq!(dirty.len(), 2);
    assert_eq!(dirty[0].chunk_id, c(0, 0));
    assert_eq!(dirty[0].entity_ids(), vec![eid("a"), eid("b")]);
    assert_eq!(dirty[1].chunk_id, c(3, 0));

    clock.advance(ms(10));
    assert_eq!(registry.mark_entities_persisted(c(0, 0), &[eid("a")]), 1);
    assert!(registry.chunk(c(0, 0)).unwrap().is_dirty);
    assert_eq!(registry.find_entity(&eid("a")).unwrap().1.last_saved, Some(1_010));

    assert_eq!(registry.mark_entities_persisted(c(0, 0), &[eid("b"), eid("zzz")]), 1);
    assert!(!registry.chunk(c(0, 0)).unwrap().is_dirty);
    assert_eq!(registry.get_dirty_entities().len(), 1);
    assert_eq!(registry.mark_entities_persisted(c(7, 7), &[eid("c")]), 0);
}

// ---------------------------------------------------------------------------
// Listeners, stats, clear
// ---------------------------------------------------------------------------

#[test]
fn test_panicking_listener_does_not_block_others() {
    let (mut registry, _clock) = registry();
    registry.on_ownership_change(|_| panic!("listener failure"));
    let events = record_events(&mut registry);

    registry.register_entity(c(0, 0), Entity::new("e", "crate", [30.0, 0.0, 30.0]));
    assert_eq!(registry.owner_of(&eid("e")), Some(c(0, 0)));
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_removed_listener_stops_receiving() {
    let (mut registry, _clock) = registry();
    let events = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&events);
    let id = registry.on_ownership_change(move |_| *counter.lock().unwrap() += 1);

    registry.register_entity(c(0, 0), Entity::new("a", "crate", [30.0, 0.0, 30.0]));
    assert!(registry.remove_ownership_listener(id));
    assert!(!registry.remove_ownership_listener(id));
    registry.register_entity(c(0, 0), Entity::new("b", "crate", [30.0, 0.0, 30.0]));
    assert_eq!(*events.lock().unwrap(), 1);
}

#[test]
fn test_stats_count_everything() {
    let (mut registry, _clock) = registry();
    subscribe(&mut registry, c(0, 0), "p1");
    subscribe(&mut registry, c(1, 0), "p1");
    subscribe(&mut registry, c(1, 0), "p2");
    registry.set_player_present(c(1, 0), &pid("p2"), true);
    registry.register_entity(c(0, 0), Entity::new("a", "crate", [2.0, 0.0, 30.0]));
    registry.register_entity(c(5, 5), Entity::new("b", "crate", [350.0, 0.0, 350.0]));
    registry.handoff_entity(c(5, 5), c(6, 5), &eid("b"));

    assert_eq!(
        registry.stats(),
        RegistryStats {
            total_chunks: 3,
            cold: 1,
            warm: 1,
            hot: 1,
            cooling: 0,
            total_subscriptions: 3,
            total_players: 2,
            total_entities: 2,
            overlap_records: 2,
            pending_handoffs: 1,
        }
    );
}

#[test]
fn test_clear_resets_state_but_keeps_listeners() {
    let (mut registry, _clock) = registry();
    let events = record_events(&mut registry);
    subscribe(&mut registry, c(0, 0), "p1");
    registry.register_entity(c(0, 0), Entity::new("a", "crate", [2.0, 0.0, 30.0]));
    registry.handoff_entity(c(0, 0), c(1, 0), &eid("a"));

    registry.clear();
    assert_eq!(registry.stats(), RegistryStats::default());
    assert!(registry.get_player_subscriptions(&pid("p1")).is_empty());
    assert!(!registry.complete_handoff(&eid("a")));

    let before = events.lock().unwrap().len();
    registry.register_entity(c(0, 0), Entity::new("a", "crate", [30.0, 0.0, 30.0]));
    assert_eq!(events.lock().unwrap().len(), before + 1);
}
