//! Configuration surface for the scheduling core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::{CheckpointBoundary, CoreError};
use crate::solver::BackendHint;

/// Solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Backend selection override
    ///
    /// Default: auto (complexity heuristic picks the backend)
    pub default_backend: BackendHint,

    /// Wall-clock budget for a solve call, in milliseconds
    ///
    /// Default: 60000
    pub time_budget_ms: u64,

    /// Anti-churn weight alpha in the objective, in [0, 1]
    ///
    /// Default: 0.3
    pub anti_churn_alpha: f64,

    /// Per-person cap on changed (person, block) pairs vs. the reference
    ///
    /// Default: 5
    pub max_churn_per_person: u32,

    /// Optional RNG seed; when absent the seed is derived from the context
    pub rng_seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            default_backend: BackendHint::Auto,
            time_budget_ms: 60_000,
            anti_churn_alpha: 0.3,
            max_churn_per_person: 5,
            rng_seed: None,
        }
    }
}

/// Constraint engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintConfig {
    /// Abort checkpoint advancement on tier-1 violations
    ///
    /// Default: true
    pub strict_mode: bool,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self { strict_mode: true }
    }
}

/// Checkpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Distributed-lock TTL in milliseconds
    ///
    /// Default: 60000
    pub lock_ttl_ms: u64,

    /// Boundaries the scheduler may report as due
    ///
    /// Default: all four
    pub boundaries_enabled: BTreeSet<CheckpointBoundary>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            lock_ttl_ms: 60_000,
            boundaries_enabled: [
                CheckpointBoundary::WeekStart,
                CheckpointBoundary::BlockEnd,
                CheckpointBoundary::AcgmeWindow,
                CheckpointBoundary::Manual,
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// Analytics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Serial-interval mean in days (Cori Rt estimator)
    ///
    /// Default: 7.0
    pub rt_serial_interval_mean_days: f64,

    /// Serial-interval standard deviation in days
    ///
    /// Default: 3.0
    pub rt_serial_interval_std_days: f64,

    /// Sliding-window size in days for the Rt posterior
    ///
    /// Default: 7
    pub rt_window_size: usize,

    /// Default SIR transmission rate
    ///
    /// Default: 0.3
    pub sir_default_beta: f64,

    /// Default SIR recovery rate
    ///
    /// Default: 0.1
    pub sir_default_gamma: f64,

    /// Control-limit multiplier for Shewhart charts
    ///
    /// Default: 3.0
    pub spc_sigma_multiplier: f64,

    /// Minimum autocorrelation peak height treated as significant
    ///
    /// Default: 0.3
    pub subharmonic_min_significance: f64,

    /// Metropolis sampling temperature for replica generation
    ///
    /// Default: 1.0
    pub spin_glass_default_temperature: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            rt_serial_interval_mean_days: 7.0,
            rt_serial_interval_std_days: 3.0,
            rt_window_size: 7,
            sir_default_beta: 0.3,
            sir_default_gamma: 0.1,
            spc_sigma_multiplier: 3.0,
            subharmonic_min_significance: 0.3,
            spin_glass_default_temperature: 1.0,
        }
    }
}

/// Top-level configuration for the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub solver: SolverConfig,
    pub constraint: ConstraintConfig,
    pub checkpoint: CheckpointConfig,
    pub analytics: AnalyticsConfig,
}

impl CoreConfig {
    /// Reject out-of-range values before any component consumes them.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.solver.anti_churn_alpha) {
            return Err(CoreError::Config(format!(
                "solver.anti_churn_alpha must be in [0, 1], got {}",
                self.solver.anti_churn_alpha
            )));
        }
        if self.solver.time_budget_ms == 0 {
            return Err(CoreError::Config(
                "solver.time_budget_ms must be positive".to_string(),
            ));
        }
        if self.checkpoint.lock_ttl_ms == 0 {
            return Err(CoreError::Config(
                "checkpoint.lock_ttl_ms must be positive".to_string(),
            ));
        }
        if self.analytics.rt_serial_interval_mean_days <= 0.0
            || self.analytics.rt_serial_interval_std_days <= 0.0
        {
            return Err(CoreError::Config(
                "analytics.rt serial interval parameters must be positive".to_string(),
            ));
        }
        if self.analytics.rt_window_size == 0 {
            return Err(CoreError::Config(
                "analytics.rt.window_size must be positive".to_string(),
            ));
        }
        if self.analytics.sir_default_gamma <= 0.0 {
            return Err(CoreError::Config(
                "analytics.sir.default_gamma must be positive".to_string(),
            ));
        }
        if self.analytics.sir_default_beta < 0.0 {
            return Err(CoreError::Config(
                "analytics.sir.default_beta must be non-negative".to_string(),
            ));
        }
        if self.analytics.spc_sigma_multiplier <= 0.0 {
            return Err(CoreError::Config(
                "analytics.spc.sigma_multiplier must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.analytics.subharmonic_min_significance) {
            return Err(CoreError::Config(format!(
                "analytics.subharmonic.min_significance must be in [0, 1], got {}",
                self.analytics.subharmonic_min_significance
            )));
        }
        if self.analytics.spin_glass_default_temperature <= 0.0 {
            return Err(CoreError::Config(
                "analytics.spin_glass.default_temperature must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
