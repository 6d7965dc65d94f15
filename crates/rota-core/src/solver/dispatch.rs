//! Backend selection and the hybrid escalation path.

use std::sync::Arc;
use std::time::Instant;

use crate::constraints::ConstraintEngine;
use crate::domain::{Assignment, CoreError, ScheduleState, SchedulingContext};
use crate::solver::candidates::context_seed;
use crate::solver::cpsat::CpSatBackend;
use crate::solver::greedy::GreedyBackend;
use crate::solver::ilp::IlpBackend;
use crate::solver::{
    BackendHint, SolveOptions, SolveStatus, SolverBackend, SolverResult,
};

/// Complexity thresholds for automatic backend selection.
const GREEDY_THRESHOLD: f64 = 20.0;
const ILP_THRESHOLD: f64 = 50.0;
const CPSAT_THRESHOLD: f64 = 75.0;

/// Selects a backend from the problem size and runs it; `hybrid` escalates
/// through cpsat, ilp and greedy, keeping the best result seen.
pub struct SolverDispatcher {
    engine: Arc<ConstraintEngine>,
}

impl SolverDispatcher {
    pub fn new(engine: Arc<ConstraintEngine>) -> Self {
        Self { engine }
    }

    /// Solve for an assignment set. `current_state` supplies the anti-churn
    /// reference.
    pub fn solve(
        &self,
        ctx: &SchedulingContext,
        opts: &SolveOptions,
        current_state: Option<&ScheduleState>,
    ) -> Result<SolverResult, CoreError> {
        if !(0.0..=1.0).contains(&opts.weights.anti_churn_alpha) {
            return Err(CoreError::Config(format!(
                "anti_churn_alpha must be in [0, 1], got {}",
                opts.weights.anti_churn_alpha
            )));
        }
        if opts.time_budget_ms == 0 {
            return Err(CoreError::Config(
                "time_budget_ms must be positive".to_string(),
            ));
        }

        let reference: Option<Vec<Assignment>> =
            current_state.map(|s| s.assignments.to_vec());
        let reference_slice = reference.as_deref();

        let mut opts = opts.clone();
        if opts.seed.is_none() {
            opts.seed = Some(context_seed(ctx));
        }

        let backend = match opts.backend {
            BackendHint::Auto => Self::select_backend(ctx),
            other => other,
        };
        tracing::info!(
            backend = ?backend,
            complexity = ctx.complexity(),
            "dispatching solver"
        );

        let result = match backend {
            BackendHint::Greedy => {
                GreedyBackend.solve(ctx, &opts, reference_slice, &self.engine)
            }
            BackendHint::Ilp => IlpBackend.solve(ctx, &opts, reference_slice, &self.engine),
            BackendHint::Cpsat => {
                CpSatBackend.solve(ctx, &opts, reference_slice, &self.engine)
            }
            BackendHint::Hybrid => self.solve_hybrid(ctx, &opts, reference_slice),
            BackendHint::Auto => unreachable!("auto resolved above"),
        };
        Ok(result)
    }

    /// Complexity heuristic:
    /// `|residents| x |blocks| x |templates| / (1000 + |absences|)`.
    fn select_backend(ctx: &SchedulingContext) -> BackendHint {
        let complexity = ctx.complexity();
        if complexity < GREEDY_THRESHOLD {
            BackendHint::Greedy
        } else if complexity < ILP_THRESHOLD {
            BackendHint::Ilp
        } else if complexity < CPSAT_THRESHOLD {
            BackendHint::Cpsat
        } else {
            BackendHint::Hybrid
        }
    }

    /// cpsat with 60% of the budget, then ilp, then greedy; the best result
    /// by (tier-1 cleanliness, objective) wins.
    fn solve_hybrid(
        &self,
        ctx: &SchedulingContext,
        opts: &SolveOptions,
        reference: Option<&[Assignment]>,
    ) -> SolverResult {
        let started = Instant::now();
        let budget = opts.time_budget_ms;

        let mut stage_opts = opts.clone();
        stage_opts.time_budget_ms = (budget * 6 / 10).max(1);
        let mut best = CpSatBackend.solve(ctx, &stage_opts, reference, &self.engine);

        if !is_clean(&best) && !opts.cancel.is_cancelled() {
            let remaining = budget.saturating_sub(started.elapsed().as_millis() as u64);
            stage_opts.time_budget_ms = (remaining / 2).max(1);
            let ilp = IlpBackend.solve(ctx, &stage_opts, reference, &self.engine);
            best = better_of(best, ilp);
        }
        if !is_clean(&best) && !opts.cancel.is_cancelled() {
            let remaining = budget.saturating_sub(started.elapsed().as_millis() as u64);
            stage_opts.time_budget_ms = remaining.max(1);
            let greedy = GreedyBackend.solve(ctx, &stage_opts, reference, &self.engine);
            best = better_of(best, greedy);
        }

        SolverResult {
            backend_used: format!("hybrid({})", best.backend_used),
            solve_time_ms: started.elapsed().as_millis() as u64,
            ..best
        }
    }
}

fn is_clean(result: &SolverResult) -> bool {
    matches!(
        result.status,
        SolveStatus::Feasible | SolveStatus::Optimal
    )
}

fn better_of(a: SolverResult, b: SolverResult) -> SolverResult {
    let rank = |r: &SolverResult| match r.status {
        SolveStatus::Optimal => 0,
        SolveStatus::Feasible => 1,
        SolveStatus::Timeout => 2,
        SolveStatus::Infeasible => 3,
        SolveStatus::Cancelled => 4,
    };
    match rank(&a).cmp(&rank(&b)) {
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Equal => {
            if a.objective_value <= b.objective_value {
                a
            } else {
                b
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::standard_context;

    fn dispatcher() -> SolverDispatcher {
        SolverDispatcher::new(Arc::new(ConstraintEngine::with_defaults()))
    }

    #[test]
    fn test_auto_selects_greedy_for_small_problems() {
        // 4 residents x 14 blocks x 5 templates / 1000 = 0.28 < 20
        let ctx = standard_context(4, 7);
        assert_eq!(
            SolverDispatcher::select_backend(&ctx),
            BackendHint::Greedy
        );
    }

    #[test]
    fn test_dispatch_solves_with_auto() {
        let ctx = standard_context(8, 7);
        let result = dispatcher()
            .solve(&ctx, &SolveOptions::default(), None)
            .unwrap();
        assert!(matches!(
            result.status,
            SolveStatus::Feasible | SolveStatus::Optimal
        ));
    }

    #[test]
    fn test_dispatch_rejects_bad_alpha() {
        let ctx = standard_context(2, 2);
        let mut opts = SolveOptions::default();
        opts.weights.anti_churn_alpha = 2.0;
        assert!(matches!(
            dispatcher().solve(&ctx, &opts, None),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_dispatch_determinism_with_derived_seed() {
        let ctx = standard_context(6, 7);
        let opts = SolveOptions {
            backend: BackendHint::Cpsat,
            ..SolveOptions::default()
        };
        let a = dispatcher().solve(&ctx, &opts, None).unwrap();
        let b = dispatcher().solve(&ctx, &opts, None).unwrap();
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn test_hybrid_reports_inner_backend() {
        let ctx = standard_context(6, 7);
        let opts = SolveOptions {
            backend: BackendHint::Hybrid,
            ..SolveOptions::default()
        };
        let result = dispatcher().solve(&ctx, &opts, None).unwrap();
        assert!(result.backend_used.starts_with("hybrid("));
    }
}
