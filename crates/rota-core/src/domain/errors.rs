use thiserror::Error;

/// Error taxonomy of the scheduling core.
///
/// Tier-3 constraint violations are data, not errors; tier-1 violations are
/// data at evaluation time and only become `CheckpointValidationFailed` when
/// they would be committed to an authoritative state.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Infeasible schedule: {0}")]
    Infeasible(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Lock contention on key {0}")]
    LockContention(String),

    #[error("No draft available for schedule {0}")]
    NoDraftAvailable(uuid::Uuid),

    #[error("Checkpoint validation failed: {tier1_count} tier-1 violation(s): {summary}")]
    CheckpointValidationFailed { tier1_count: usize, summary: String },

    #[error("State not found: {0}")]
    StateNotFound(uuid::Uuid),

    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("Repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
