//! End-to-end checkpoint lifecycle: staging, advancement, event ordering,
//! persistence round-trips and rollback.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use rota_core::testing::fixtures::{
    feasible_assignments, remove_resident_assignments, standard_context, TestContext,
};
use rota_core::{
    CheckpointBoundary, CheckpointBus, ConstraintEngine, CoreConfig, CoreError, DistributedLock,
    FixedClock, InMemorySnapshotStore, InProcessLock, LockAcquisition, ScheduleState,
    SnapshotStore, StateStatus, StroboscopicManager,
};

struct World {
    ctx: TestContext,
    manager: StroboscopicManager,
    clock: Arc<FixedClock>,
    lock: Arc<InProcessLock>,
    snapshots: Arc<InMemorySnapshotStore>,
    bus: Arc<CheckpointBus>,
}

async fn world() -> World {
    let ctx = standard_context(6, 7);
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 3, 6, 0, 0).unwrap(),
    ));
    let lock = Arc::new(InProcessLock::new(clock.clone()));
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let bus = Arc::new(CheckpointBus::new());
    let initial = feasible_assignments(&ctx);

    let manager = StroboscopicManager::new(
        Uuid::from_u128(0x5EED),
        Arc::new(ctx.inner().clone()),
        ConstraintEngine::with_defaults(),
        lock.clone(),
        snapshots.clone(),
        clock.clone(),
        bus.clone(),
        &CoreConfig::default(),
        initial,
    )
    .await
    .unwrap();

    World {
        ctx,
        manager,
        clock,
        lock,
        snapshots,
        bus,
    }
}

async fn advance_with_one_fewer(world: &World) -> rota_core::CheckpointEvent {
    let assignments = remove_resident_assignments(
        &world.ctx,
        world.manager.observable_state().assignments.to_vec(),
        1,
    );
    world
        .manager
        .propose_draft(assignments, serde_json::Map::new(), None)
        .unwrap();
    world.clock.advance(chrono::Duration::hours(1));
    world
        .manager
        .advance_checkpoint(CheckpointBoundary::Manual, Some("test"), None)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_event_log_chain_is_unbroken_over_five_advances() {
    let world = world().await;
    let subscription = world.bus.subscribe();
    let genesis = world.manager.observable_state();

    for _ in 0..5 {
        advance_with_one_fewer(&world).await;
    }

    let events = subscription.drain();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0].prev_state_id, Some(genesis.state_id));
    for pair in events.windows(2) {
        assert_eq!(pair[1].prev_state_id, Some(pair[0].new_state_id));
        assert!(pair[1].checkpoint_time >= pair[0].checkpoint_time);
    }
    assert!(events.iter().all(|e| e.acgme_compliant));
    assert!(events.iter().all(|e| e.assignments_changed == 1));
}

#[tokio::test]
async fn test_snapshot_round_trip_preserves_hash() {
    let world = world().await;
    let event = advance_with_one_fewer(&world).await;

    let stored = world
        .snapshots
        .get(event.new_state_id)
        .await
        .unwrap()
        .expect("promoted state is persisted");
    assert_eq!(stored.state_id, event.new_state_id);
    assert!(stored.verify_hash());

    // Serde round-trip keeps the canonical hash intact
    let json = serde_json::to_string(&stored).unwrap();
    let back: ScheduleState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.state_hash, stored.state_hash);
    assert!(back.verify_hash());
}

#[tokio::test]
async fn test_history_is_ascending_by_checkpoint_time() {
    let world = world().await;
    for _ in 0..3 {
        advance_with_one_fewer(&world).await;
    }

    let history = world
        .snapshots
        .list_history(world.manager.schedule_id())
        .await
        .unwrap();
    assert!(history.len() >= 4);
    for pair in history.windows(2) {
        assert!(pair[0].checkpoint_time <= pair[1].checkpoint_time);
    }
}

#[tokio::test]
async fn test_contention_exactly_one_advance_wins() {
    let world = world().await;
    let subscription = world.bus.subscribe();

    world
        .manager
        .propose_draft(
            remove_resident_assignments(
                &world.ctx,
                world.manager.observable_state().assignments.to_vec(),
                1,
            ),
            serde_json::Map::new(),
            None,
        )
        .unwrap();

    // A competing process holds the checkpoint lock
    let key = format!("schedule:{}:checkpoint", world.manager.schedule_id());
    let held = match world
        .lock
        .try_acquire(&key, chrono::Duration::seconds(60))
        .await
        .unwrap()
    {
        LockAcquisition::Acquired(handle) => handle,
        LockAcquisition::Contended => panic!("lock should be free"),
    };

    let contended = world
        .manager
        .advance_checkpoint(CheckpointBoundary::Manual, None, None)
        .await;
    assert!(matches!(contended, Err(CoreError::LockContention(_))));

    // Release and retry: exactly one event total
    world.lock.release(held).await.unwrap();
    world.clock.advance(chrono::Duration::minutes(5));
    world
        .manager
        .advance_checkpoint(CheckpointBoundary::Manual, None, None)
        .await
        .unwrap();

    assert_eq!(subscription.drain().len(), 1);
}

#[tokio::test]
async fn test_strict_mode_rejects_draft_and_keeps_state() {
    // A context where resident 0 is deployed all week
    let ctx = standard_context(6, 7).with_deployment(0, 0, 6);
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 3, 6, 0, 0).unwrap(),
    ));
    let lock = Arc::new(InProcessLock::new(clock.clone()));
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let bus = Arc::new(CheckpointBus::new());

    let manager = StroboscopicManager::new(
        Uuid::from_u128(0xF00D),
        Arc::new(ctx.inner().clone()),
        ConstraintEngine::with_defaults(),
        lock,
        snapshots,
        clock,
        bus.clone(),
        &CoreConfig::default(),
        vec![],
    )
    .await
    .unwrap();
    let before = manager.observable_state();

    // Draft schedules the deployed resident
    let deployed = ctx.residents()[0].id;
    manager
        .propose_draft(
            vec![rota_core::Assignment {
                person_id: deployed,
                block_id: ctx.blocks()[0].id,
                template_id: ctx.templates()[0].id,
                hours: 6.0,
            }],
            serde_json::Map::new(),
            None,
        )
        .unwrap();

    let subscription = bus.subscribe();
    let result = manager
        .advance_checkpoint(CheckpointBoundary::WeekStart, None, None)
        .await;
    assert!(matches!(
        result,
        Err(CoreError::CheckpointValidationFailed { tier1_count, .. }) if tier1_count >= 1
    ));

    // No mutation, no event
    let after = manager.observable_state();
    assert_eq!(after.state_id, before.state_id);
    assert_eq!(after.status, StateStatus::Authoritative);
    assert!(manager.has_draft());
    assert!(subscription.drain().is_empty());
}

#[tokio::test]
async fn test_rollback_creates_fresh_state_id_and_event() {
    let world = world().await;
    let genesis = world.manager.observable_state();
    advance_with_one_fewer(&world).await;
    advance_with_one_fewer(&world).await;

    let subscription = world.bus.subscribe();
    world.clock.advance(chrono::Duration::hours(1));
    let event = world.manager.rollback_to(genesis.state_id).await.unwrap();

    let restored = world.manager.observable_state();
    assert_ne!(restored.state_id, genesis.state_id);
    assert_eq!(restored.assignments.len(), genesis.assignments.len());
    assert_eq!(event.new_state_id, restored.state_id);
    assert_eq!(event.assignments_changed, 2);
    assert_eq!(subscription.drain().len(), 1);

    // The restored state verifies its own invariants
    let engine = ConstraintEngine::with_defaults();
    let report = engine
        .evaluate(&restored.assignments, world.ctx.inner(), None)
        .unwrap();
    restored
        .verify_invariants(world.ctx.inner(), &report.tier1_messages())
        .unwrap();
}
