pub mod errors;
pub mod models;
pub mod state;

pub use errors::{CoreError, Result};
pub use models::{
    Absence, AbsenceKind, ActivityType, Assignment, Block, BlockPeriod, Person, PersonStatus,
    PgyLevel, Priority, Role, RotationTemplate, SchedulingContext, Severity, ShiftPreference,
    Tier, Violation,
};
pub use state::{
    canonical_encoding, compute_state_hash, CheckpointBoundary, CheckpointEvent, Report,
    ScheduleState, StateStatus,
};
