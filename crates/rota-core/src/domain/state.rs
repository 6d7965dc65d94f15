use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::CoreError;
use crate::domain::models::{Assignment, SchedulingContext, Tier};

// Checkpoint boundaries at which authoritative state may advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBoundary {
    WeekStart,
    BlockEnd,
    AcgmeWindow,
    Manual,
}

impl CheckpointBoundary {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointBoundary::WeekStart => "week_start",
            CheckpointBoundary::BlockEnd => "block_end",
            CheckpointBoundary::AcgmeWindow => "acgme_window",
            CheckpointBoundary::Manual => "manual",
        }
    }
}

impl std::fmt::Display for CheckpointBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    Draft,
    Authoritative,
    Archived,
}

fn serialize_assignments<S: Serializer>(
    assignments: &Arc<[Assignment]>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    assignments.as_ref().serialize(serializer)
}

fn deserialize_assignments<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Arc<[Assignment]>, D::Error> {
    let assignments = Vec::<Assignment>::deserialize(deserializer)?;
    Ok(assignments.into())
}

/// An immutable snapshot of a schedule at a checkpoint.
///
/// Assignments live behind an `Arc` so promoting a draft to authoritative,
/// archiving and snapshotting all share the same allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleState {
    pub state_id: Uuid,
    pub schedule_id: Uuid,
    pub boundary: CheckpointBoundary,
    pub checkpoint_time: DateTime<Utc>,
    pub status: StateStatus,
    #[serde(
        serialize_with = "serialize_assignments",
        deserialize_with = "deserialize_assignments"
    )]
    pub assignments: Arc<[Assignment]>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub acgme_compliant: bool,
    pub validation_errors: Vec<String>,
    pub state_hash: String,
}

impl ScheduleState {
    /// Create a fresh draft. The hash is computed over the sorted assignment
    /// set plus the checkpoint time.
    pub fn new_draft(
        schedule_id: Uuid,
        assignments: Vec<Assignment>,
        metadata: serde_json::Map<String, serde_json::Value>,
        checkpoint_time: DateTime<Utc>,
    ) -> Self {
        let assignments: Arc<[Assignment]> = assignments.into();
        let state_hash = compute_state_hash(&assignments, checkpoint_time);
        Self {
            state_id: Uuid::new_v4(),
            schedule_id,
            boundary: CheckpointBoundary::Manual,
            checkpoint_time,
            status: StateStatus::Draft,
            assignments,
            metadata,
            acgme_compliant: false,
            validation_errors: Vec::new(),
            state_hash,
        }
    }

    /// Recompute the canonical hash and compare (invariant I6).
    pub fn verify_hash(&self) -> bool {
        compute_state_hash(&self.assignments, self.checkpoint_time) == self.state_hash
    }

    /// Check the authoritative-state invariants against a context.
    ///
    /// Structural checks (unique keys, known references) come from context
    /// validation; regulatory checks come from a tier-1 evaluation supplied
    /// by the caller's engine as `tier1_violation_messages`.
    pub fn verify_invariants(
        &self,
        ctx: &SchedulingContext,
        tier1_violation_messages: &[String],
    ) -> Result<(), CoreError> {
        ctx.validate_assignments(&self.assignments)
            .map_err(|e| CoreError::InternalInvariant(e.to_string()))?;
        if !tier1_violation_messages.is_empty() {
            return Err(CoreError::InternalInvariant(format!(
                "authoritative state carries tier-1 violations: {}",
                tier1_violation_messages.join("; ")
            )));
        }
        if !self.verify_hash() {
            return Err(CoreError::InternalInvariant(format!(
                "state hash mismatch for state {}",
                self.state_id
            )));
        }
        Ok(())
    }
}

/// Canonical encoding hashed into `state_hash`: the RFC3339 checkpoint time
/// followed by one `person|block|template|hours` line per assignment, sorted
/// by `(person_id, block_id)`.
pub fn canonical_encoding(assignments: &[Assignment], checkpoint_time: DateTime<Utc>) -> String {
    let mut sorted: Vec<&Assignment> = assignments.iter().collect();
    sorted.sort_by_key(|a| (a.person_id, a.block_id));

    let mut encoding = String::new();
    encoding.push_str(&checkpoint_time.to_rfc3339());
    encoding.push('\n');
    for assignment in sorted {
        encoding.push_str(&format!(
            "{}|{}|{}|{:.4}\n",
            assignment.person_id, assignment.block_id, assignment.template_id, assignment.hours
        ));
    }
    encoding
}

/// Lowercase-hex SHA-256 of the canonical encoding.
pub fn compute_state_hash(assignments: &[Assignment], checkpoint_time: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_encoding(assignments, checkpoint_time).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Event published on every checkpoint transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEvent {
    pub prev_state_id: Option<Uuid>,
    pub new_state_id: Uuid,
    pub schedule_id: Uuid,
    pub boundary: CheckpointBoundary,
    pub checkpoint_time: DateTime<Utc>,
    pub triggered_by: Option<String>,
    pub assignments_changed: usize,
    pub acgme_compliant: bool,
}

/// Evaluation report returned by the constraint engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub violations: Vec<crate::domain::models::Violation>,
    pub soft_penalty: f64,
    pub hard_violation_count: usize,
    pub by_tier: std::collections::BTreeMap<u8, usize>,
}

impl Report {
    pub fn is_feasible(&self) -> bool {
        self.hard_violation_count == 0
    }

    pub fn tier1_messages(&self) -> Vec<String> {
        self.violations
            .iter()
            .filter(|v| v.tier == Tier::Regulatory)
            .map(|v| v.message.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assignment(person: u128, block: u128, template: u128) -> Assignment {
        Assignment {
            person_id: Uuid::from_u128(person),
            block_id: Uuid::from_u128(block),
            template_id: Uuid::from_u128(template),
            hours: 12.0,
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_hash_is_lowercase_hex_sha256() {
        let hash = compute_state_hash(&[assignment(1, 2, 3)], ts());
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_is_order_independent() {
        let a = assignment(1, 2, 3);
        let b = assignment(4, 5, 6);
        let forward = compute_state_hash(&[a.clone(), b.clone()], ts());
        let backward = compute_state_hash(&[b, a], ts());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_hash_depends_on_checkpoint_time() {
        let a = assignment(1, 2, 3);
        let h1 = compute_state_hash(std::slice::from_ref(&a), ts());
        let h2 = compute_state_hash(
            std::slice::from_ref(&a),
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
        );
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_depends_on_template() {
        let h1 = compute_state_hash(&[assignment(1, 2, 3)], ts());
        let h2 = compute_state_hash(&[assignment(1, 2, 4)], ts());
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_new_draft_hash_verifies() {
        let state = ScheduleState::new_draft(
            Uuid::from_u128(99),
            vec![assignment(1, 2, 3), assignment(4, 5, 6)],
            serde_json::Map::new(),
            ts(),
        );
        assert_eq!(state.status, StateStatus::Draft);
        assert!(state.verify_hash());
    }

    #[test]
    fn test_state_serde_round_trip() {
        let state = ScheduleState::new_draft(
            Uuid::from_u128(99),
            vec![assignment(1, 2, 3)],
            serde_json::Map::new(),
            ts(),
        );
        let json = serde_json::to_string(&state).unwrap();
        let back: ScheduleState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state_id, state.state_id);
        assert_eq!(back.state_hash, state.state_hash);
        assert_eq!(back.assignments.len(), 1);
        assert!(back.verify_hash());
    }

    #[test]
    fn test_canonical_encoding_layout() {
        let encoding = canonical_encoding(&[assignment(1, 2, 3)], ts());
        let mut lines = encoding.lines();
        assert_eq!(lines.next().unwrap(), ts().to_rfc3339());
        let line = lines.next().unwrap();
        assert!(line.ends_with("|12.0000"));
        assert_eq!(line.matches('|').count(), 3);
    }
}
