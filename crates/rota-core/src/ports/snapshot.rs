//! Append-only snapshot log for schedule states.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::ScheduleState;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append a state snapshot. States are immutable once written.
    async fn put(&self, state: &ScheduleState) -> anyhow::Result<()>;

    /// Fetch a snapshot by state id
    async fn get(&self, state_id: Uuid) -> anyhow::Result<Option<ScheduleState>>;

    /// History for a schedule, ascending by checkpoint time
    async fn list_history(&self, schedule_id: Uuid) -> anyhow::Result<Vec<ScheduleState>>;
}

/// In-memory snapshot log; the reference adapter for tests and
/// single-process deployments.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    states: Mutex<HashMap<Uuid, ScheduleState>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn put(&self, state: &ScheduleState) -> anyhow::Result<()> {
        let mut states = self.states.lock().expect("snapshot table poisoned");
        states.insert(state.state_id, state.clone());
        Ok(())
    }

    async fn get(&self, state_id: Uuid) -> anyhow::Result<Option<ScheduleState>> {
        let states = self.states.lock().expect("snapshot table poisoned");
        Ok(states.get(&state_id).cloned())
    }

    async fn list_history(&self, schedule_id: Uuid) -> anyhow::Result<Vec<ScheduleState>> {
        let states = self.states.lock().expect("snapshot table poisoned");
        let mut history: Vec<ScheduleState> = states
            .values()
            .filter(|s| s.schedule_id == schedule_id)
            .cloned()
            .collect();
        history.sort_by_key(|s| (s.checkpoint_time, s.state_id));
        Ok(history)
    }
}
