//! Solver dispatch and backends.
//!
//! Backends are in-process strategies behind one contract: construct per
//! call, honor the time budget and cancellation token, never panic, and
//! return a structured result with diagnostics even when infeasible.

pub mod anti_churn;
pub mod candidates;
pub mod cpsat;
pub mod dispatch;
pub mod greedy;
pub mod ilp;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SolverConfig;
use crate::constraints::ConstraintEngine;
use crate::domain::{Assignment, SchedulingContext, Violation};

/// Cooperative cancellation handle, checked at solver iteration boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Backend selection hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendHint {
    Auto,
    Greedy,
    Ilp,
    Cpsat,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Timeout,
    Cancelled,
}

/// Relative weights of the soft objective terms plus the anti-churn alpha.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub coverage: f64,
    pub equity: f64,
    pub preference: f64,
    pub continuity: f64,
    /// Anti-churn alpha in [0, 1]
    pub anti_churn_alpha: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            coverage: 1.0,
            equity: 1.0,
            preference: 1.0,
            continuity: 0.5,
            anti_churn_alpha: 0.3,
        }
    }
}

/// Per-call solver options.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub backend: BackendHint,
    pub time_budget_ms: u64,
    pub weights: ObjectiveWeights,
    pub seed: Option<u64>,
    pub max_churn_per_person: u32,
    pub cancel: CancelToken,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            backend: BackendHint::Auto,
            time_budget_ms: 60_000,
            weights: ObjectiveWeights::default(),
            seed: None,
            max_churn_per_person: 5,
            cancel: CancelToken::new(),
        }
    }
}

impl SolveOptions {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            backend: config.default_backend,
            time_budget_ms: config.time_budget_ms,
            weights: ObjectiveWeights {
                anti_churn_alpha: config.anti_churn_alpha,
                ..ObjectiveWeights::default()
            },
            seed: config.rng_seed,
            max_churn_per_person: config.max_churn_per_person,
            cancel: CancelToken::new(),
        }
    }
}

/// Outcome of a solver run. Infeasible and timed-out runs still carry the
/// best partial assignment seen plus the diagnostic violations.
#[derive(Debug, Clone)]
pub struct SolverResult {
    pub assignments: Vec<Assignment>,
    pub backend_used: String,
    pub solve_time_ms: u64,
    pub objective_value: f64,
    pub soft_breakdown: BTreeMap<String, f64>,
    pub status: SolveStatus,
    pub violations: Vec<Violation>,
}

/// One solver strategy. Implementations hold no global state; everything is
/// built per call and dropped at return.
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &str;

    fn solve(
        &self,
        ctx: &SchedulingContext,
        opts: &SolveOptions,
        reference: Option<&[Assignment]>,
        engine: &ConstraintEngine,
    ) -> SolverResult;
}

pub use anti_churn::{
    distance, estimate_impact, per_person_changes, rigidity, ImpactEstimate, ImpactSeverity,
};
pub use dispatch::SolverDispatcher;
