pub mod checkpoint;
pub mod config;
pub mod constraints;
pub mod domain;
pub mod ports;
pub mod services;
pub mod solver;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::{AnalyticsConfig, CheckpointConfig, ConstraintConfig, CoreConfig, SolverConfig};

pub use domain::{
    canonical_encoding,
    compute_state_hash,
    Absence,
    AbsenceKind,
    ActivityType,
    Assignment,
    Block,
    BlockPeriod,
    CheckpointBoundary,
    CheckpointEvent,
    CoreError,
    Person,
    PersonStatus,
    PgyLevel,
    Priority,
    Report,
    Role,
    RotationTemplate,
    ScheduleState,
    SchedulingContext,
    Severity,
    ShiftPreference,
    StateStatus,
    Tier,
    Violation,
};

pub use constraints::{Constraint, ConstraintCatalog, ConstraintEngine};

pub use solver::{
    distance, estimate_impact, per_person_changes, rigidity, BackendHint, CancelToken,
    ImpactEstimate, ImpactSeverity, ObjectiveWeights, SolveOptions, SolveStatus,
    SolverBackend, SolverDispatcher, SolverResult,
};

pub use checkpoint::{
    CheckpointBus, CheckpointScheduler, DueCheckpoint, StroboscopicManager, Subscription,
};

pub use ports::{
    AbsenceStore, AssignmentStore, BlockStore, Clock, DistributedLock, FixedClock,
    InMemorySnapshotStore, InProcessLock, LockAcquisition, LockHandle, PersonStore,
    SnapshotStore, SystemClock, TemplateStore,
};

pub use services::ContextService;
