//! Constraint catalog and evaluation engine.
//!
//! Constraints are small structs behind one trait: tier-1 regulatory rules,
//! tier-2 institutional policy, tier-3 weighted preferences. The catalog
//! holds them by unique name; the engine evaluates an assignment set and
//! folds tier-3 findings into a soft penalty.

pub mod catalog;
pub mod engine;
pub mod soft;
pub mod support;
pub mod tier1;
pub mod tier2;

use crate::domain::{Assignment, Priority, SchedulingContext, Tier, Violation};

/// A named scheduling rule.
///
/// `violates` returns structured findings; it never panics and never errors.
/// Reference validity is the engine's concern, checked before rules run.
pub trait Constraint: Send + Sync {
    /// Unique catalog name
    fn name(&self) -> &str;

    /// Severity class: 1 regulatory, 2 institutional, 3 soft preference
    fn tier(&self) -> Tier;

    /// Priority multiplier applied to soft penalties
    fn priority(&self) -> Priority {
        Priority::Medium
    }

    /// Base weight applied to soft penalties
    fn weight(&self) -> f64 {
        1.0
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation>;
}

pub use catalog::ConstraintCatalog;
pub use engine::ConstraintEngine;
pub use soft::{CoverageTarget, ShiftPreferenceRule, TeamContinuity, WorkloadEquity};
pub use tier1::{
    AbsenceBlocking, DutyPeriodLimit, NightFloatLimit, OneInSeven, Qualification,
    SupervisionRatio, WorkHour80,
};
pub use tier2::{CoverageMin, MaxChurnPerPerson};
