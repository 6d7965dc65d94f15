//! Stroboscopic state manager: one authoritative schedule state, advanced
//! only at checkpoints.
//!
//! Readers always see a self-consistent snapshot; the internal lock is held
//! only for the pointer swap, and cross-process exclusion comes from the
//! distributed lock. Any failure during advancement releases the lock and
//! leaves the authoritative state untouched.

use chrono::Duration;
use serde_json::json;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::checkpoint::bus::CheckpointBus;
use crate::config::CoreConfig;
use crate::constraints::ConstraintEngine;
use crate::domain::{
    compute_state_hash, Assignment, CheckpointBoundary, CheckpointEvent, CoreError,
    ScheduleState, SchedulingContext, StateStatus, Tier,
};
use crate::ports::{Clock, DistributedLock, LockAcquisition, SnapshotStore};
use crate::solver::{anti_churn, CancelToken};

struct Slots {
    authoritative: ScheduleState,
    draft: Option<ScheduleState>,
    history: Vec<ScheduleState>,
}

pub struct StroboscopicManager {
    schedule_id: Uuid,
    ctx: Arc<SchedulingContext>,
    engine: ConstraintEngine,
    lock: Arc<dyn DistributedLock>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    bus: Arc<CheckpointBus>,
    lock_ttl: Duration,
    strict: bool,
    slots: RwLock<Slots>,
}

impl StroboscopicManager {
    /// Build a manager with a genesis authoritative state from
    /// `initial_assignments`.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        schedule_id: Uuid,
        ctx: Arc<SchedulingContext>,
        engine: ConstraintEngine,
        lock: Arc<dyn DistributedLock>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        bus: Arc<CheckpointBus>,
        config: &CoreConfig,
        initial_assignments: Vec<Assignment>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        ctx.validate_assignments(&initial_assignments)?;

        let report = engine.evaluate(&initial_assignments, &ctx, None)?;
        let mut genesis = ScheduleState::new_draft(
            schedule_id,
            initial_assignments,
            serde_json::Map::new(),
            clock.now(),
        );
        genesis.status = StateStatus::Authoritative;
        genesis.acgme_compliant = report.hard_violation_count == 0;
        genesis.validation_errors = blocking_messages(&report);

        snapshots.put(&genesis).await?;

        Ok(Self {
            schedule_id,
            ctx,
            engine,
            lock,
            snapshots,
            clock,
            bus,
            lock_ttl: Duration::milliseconds(config.checkpoint.lock_ttl_ms as i64),
            strict: config.constraint.strict_mode,
            slots: RwLock::new(Slots {
                authoritative: genesis,
                draft: None,
                history: Vec::new(),
            }),
        })
    }

    pub fn schedule_id(&self) -> Uuid {
        self.schedule_id
    }

    /// The current authoritative state. Never blocks on checkpoints in
    /// flight and never observes a partial transition.
    pub fn observable_state(&self) -> ScheduleState {
        self.slots.read().expect("slots poisoned").authoritative.clone()
    }

    pub fn history(&self) -> Vec<ScheduleState> {
        self.slots.read().expect("slots poisoned").history.clone()
    }

    pub fn has_draft(&self) -> bool {
        self.slots.read().expect("slots poisoned").draft.is_some()
    }

    /// Stage a draft. Replaces any existing draft; observers are unaffected.
    pub fn propose_draft(
        &self,
        assignments: Vec<Assignment>,
        mut metadata: serde_json::Map<String, serde_json::Value>,
        created_by: Option<&str>,
    ) -> Result<Uuid, CoreError> {
        self.ctx.validate_assignments(&assignments)?;
        if let Some(author) = created_by {
            metadata.insert("created_by".to_string(), json!(author));
        }

        let draft =
            ScheduleState::new_draft(self.schedule_id, assignments, metadata, self.clock.now());
        let state_id = draft.state_id;
        self.slots.write().expect("slots poisoned").draft = Some(draft);
        tracing::debug!(schedule = %self.schedule_id, draft = %state_id, "draft staged");
        Ok(state_id)
    }

    /// Drop the staged draft; returns whether one existed.
    pub fn discard_draft(&self) -> bool {
        self.slots
            .write()
            .expect("slots poisoned")
            .draft
            .take()
            .is_some()
    }

    /// Promote the draft to authoritative at a checkpoint boundary.
    pub async fn advance_checkpoint(
        &self,
        boundary: CheckpointBoundary,
        triggered_by: Option<&str>,
        cancel: Option<&CancelToken>,
    ) -> Result<CheckpointEvent, CoreError> {
        let key = format!("schedule:{}:checkpoint", self.schedule_id);
        let handle = match self.lock.try_acquire(&key, self.lock_ttl).await? {
            LockAcquisition::Acquired(handle) => handle,
            LockAcquisition::Contended => {
                return Err(CoreError::LockContention(key));
            }
        };

        let result = self.advance_locked(boundary, triggered_by, cancel).await;
        if let Err(error) = self.lock.release(handle).await {
            tracing::warn!(%error, "failed to release checkpoint lock");
        }
        result
    }

    async fn advance_locked(
        &self,
        boundary: CheckpointBoundary,
        triggered_by: Option<&str>,
        cancel: Option<&CancelToken>,
    ) -> Result<CheckpointEvent, CoreError> {
        let draft = {
            let slots = self.slots.read().expect("slots poisoned");
            slots
                .draft
                .clone()
                .ok_or(CoreError::NoDraftAvailable(self.schedule_id))?
        };

        let report = self.engine.evaluate(&draft.assignments, &self.ctx, None)?;
        let tier1: Vec<String> = report
            .violations
            .iter()
            .filter(|v| v.tier == Tier::Regulatory)
            .map(|v| v.message.clone())
            .collect();
        let acgme_compliant = tier1.is_empty();
        if self.strict && !acgme_compliant {
            tracing::warn!(
                schedule = %self.schedule_id,
                violations = tier1.len(),
                "checkpoint rejected in strict mode"
            );
            return Err(CoreError::CheckpointValidationFailed {
                tier1_count: tier1.len(),
                summary: tier1.join("; "),
            });
        }

        if cancel.map(CancelToken::is_cancelled).unwrap_or(false) {
            return Err(CoreError::Cancelled(
                "advance_checkpoint cancelled before commit".to_string(),
            ));
        }

        let checkpoint_time = self.clock.now();
        let mut promoted = draft;
        promoted.boundary = boundary;
        promoted.checkpoint_time = checkpoint_time;
        promoted.status = StateStatus::Authoritative;
        promoted.acgme_compliant = acgme_compliant;
        promoted.validation_errors = blocking_messages(&report);
        promoted.state_hash = compute_state_hash(&promoted.assignments, checkpoint_time);

        // Atomic swap: archive the old authoritative, promote the draft
        let (archived, event) = {
            let mut slots = self.slots.write().expect("slots poisoned");
            let mut archived = slots.authoritative.clone();
            archived.status = StateStatus::Archived;

            let assignments_changed =
                anti_churn::distance(&archived.assignments, &promoted.assignments);
            let event = CheckpointEvent {
                prev_state_id: Some(archived.state_id),
                new_state_id: promoted.state_id,
                schedule_id: self.schedule_id,
                boundary,
                checkpoint_time,
                triggered_by: triggered_by.map(str::to_string),
                assignments_changed,
                acgme_compliant,
            };

            slots.history.push(archived.clone());
            slots.authoritative = promoted.clone();
            slots.draft = None;
            (archived, event)
        };

        // Persist outside the swap; the log trails the in-memory state
        self.snapshots.put(&archived).await?;
        self.snapshots.put(&promoted).await?;

        self.bus.publish(&event);
        tracing::info!(
            schedule = %self.schedule_id,
            new_state = %event.new_state_id,
            boundary = %boundary,
            changed = event.assignments_changed,
            "checkpoint advanced"
        );
        Ok(event)
    }

    /// Restore an archived state as the new authoritative. The archived
    /// original is untouched; the restoration gets a fresh state id.
    pub async fn rollback_to(&self, state_id: Uuid) -> Result<CheckpointEvent, CoreError> {
        let key = format!("schedule:{}:checkpoint", self.schedule_id);
        let handle = match self.lock.try_acquire(&key, self.lock_ttl).await? {
            LockAcquisition::Acquired(handle) => handle,
            LockAcquisition::Contended => {
                return Err(CoreError::LockContention(key));
            }
        };
        let result = self.rollback_locked(state_id).await;
        if let Err(error) = self.lock.release(handle).await {
            tracing::warn!(%error, "failed to release checkpoint lock");
        }
        result
    }

    async fn rollback_locked(&self, state_id: Uuid) -> Result<CheckpointEvent, CoreError> {
        let source = {
            let slots = self.slots.read().expect("slots poisoned");
            slots
                .history
                .iter()
                .find(|s| s.state_id == state_id)
                .cloned()
        };
        let source = match source {
            Some(state) => Some(state),
            None => self.snapshots.get(state_id).await?,
        };
        let source = source.ok_or(CoreError::StateNotFound(state_id))?;
        if source.schedule_id != self.schedule_id {
            return Err(CoreError::StateNotFound(state_id));
        }

        let checkpoint_time = self.clock.now();
        let report = self.engine.evaluate(&source.assignments, &self.ctx, None)?;

        let mut restored = source.clone();
        restored.state_id = Uuid::new_v4();
        restored.boundary = CheckpointBoundary::Manual;
        restored.checkpoint_time = checkpoint_time;
        restored.status = StateStatus::Authoritative;
        restored.acgme_compliant = report.hard_violation_count == 0;
        restored.validation_errors = blocking_messages(&report);
        restored.metadata.insert(
            "rolled_back_from".to_string(),
            json!(state_id.to_string()),
        );
        restored.state_hash = compute_state_hash(&restored.assignments, checkpoint_time);

        let (archived, event) = {
            let mut slots = self.slots.write().expect("slots poisoned");
            let mut archived = slots.authoritative.clone();
            archived.status = StateStatus::Archived;

            let assignments_changed =
                anti_churn::distance(&archived.assignments, &restored.assignments);
            let event = CheckpointEvent {
                prev_state_id: Some(archived.state_id),
                new_state_id: restored.state_id,
                schedule_id: self.schedule_id,
                boundary: CheckpointBoundary::Manual,
                checkpoint_time,
                triggered_by: Some("rollback".to_string()),
                assignments_changed,
                acgme_compliant: restored.acgme_compliant,
            };

            slots.history.push(archived.clone());
            slots.authoritative = restored.clone();
            (archived, event)
        };

        self.snapshots.put(&archived).await?;
        self.snapshots.put(&restored).await?;
        self.bus.publish(&event);
        Ok(event)
    }
}

/// Messages recorded on the state for tier-1 and tier-2 findings.
fn blocking_messages(report: &crate::domain::Report) -> Vec<String> {
    report
        .violations
        .iter()
        .filter(|v| v.tier != Tier::Preference)
        .map(|v| v.message.clone())
        .collect()
}
