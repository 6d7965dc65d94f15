//! Evaluates assignment sets against the catalog.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constraints::ConstraintCatalog;
use crate::domain::{Assignment, CoreError, Report, SchedulingContext, Tier};

/// Constraint evaluation front-end.
///
/// Tier-1 findings count as hard violations and never contribute penalty;
/// tier-2 findings are reported for the caller to adjudicate; tier-3
/// findings fold into `soft_penalty` as `weight x priority x magnitude`.
#[derive(Clone)]
pub struct ConstraintEngine {
    catalog: Arc<ConstraintCatalog>,
}

impl ConstraintEngine {
    pub fn new(catalog: Arc<ConstraintCatalog>) -> Self {
        Self { catalog }
    }

    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ConstraintCatalog::with_defaults()))
    }

    pub fn catalog(&self) -> &ConstraintCatalog {
        &self.catalog
    }

    /// Evaluate `assignments` against the enabled constraints.
    ///
    /// Malformed input (unknown references, double-booked keys) is an error,
    /// not a violation.
    pub fn evaluate(
        &self,
        assignments: &[Assignment],
        ctx: &SchedulingContext,
        tiers: Option<&[Tier]>,
    ) -> Result<Report, CoreError> {
        ctx.validate_assignments(assignments)?;

        let mut report = Report::default();
        for constraint in self.catalog.enabled_ordered(tiers) {
            let violations = constraint.violates(assignments, ctx);
            if violations.is_empty() {
                continue;
            }

            let tier = constraint.tier();
            *report
                .by_tier
                .entry(tier.as_number())
                .or_insert(0) += violations.len();

            match tier {
                Tier::Regulatory => {
                    report.hard_violation_count += violations.len();
                    tracing::debug!(
                        constraint = constraint.name(),
                        count = violations.len(),
                        "tier-1 violations"
                    );
                }
                Tier::Institutional => {}
                Tier::Preference => {
                    let magnitude: f64 = violations.iter().map(|v| v.magnitude).sum();
                    report.soft_penalty +=
                        constraint.weight() * constraint.priority().multiplier() * magnitude;
                }
            }
            report.violations.extend(violations);
        }
        Ok(report)
    }

    /// Per-constraint soft-penalty breakdown for solver diagnostics.
    pub fn soft_breakdown(
        &self,
        assignments: &[Assignment],
        ctx: &SchedulingContext,
    ) -> Result<BTreeMap<String, f64>, CoreError> {
        ctx.validate_assignments(assignments)?;

        let mut breakdown = BTreeMap::new();
        for constraint in self.catalog.enabled_ordered(Some(&[Tier::Preference])) {
            let violations = constraint.violates(assignments, ctx);
            if violations.is_empty() {
                continue;
            }
            let magnitude: f64 = violations.iter().map(|v| v.magnitude).sum();
            breakdown.insert(
                constraint.name().to_string(),
                constraint.weight() * constraint.priority().multiplier() * magnitude,
            );
        }
        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{daily_blocks, standard_context, TemplateKind};
    use crate::domain::Severity;

    #[test]
    fn test_evaluate_clean_schedule_is_feasible() {
        let ctx = standard_context(4, 7);
        let engine = ConstraintEngine::with_defaults();
        let report = engine.evaluate(&[], &ctx, None).unwrap();
        // Empty schedule: no tier-1 findings; clinic min-coverage shortfalls
        // appear as tier-2 data.
        assert_eq!(report.hard_violation_count, 0);
        assert!(report.is_feasible());
    }

    #[test]
    fn test_evaluate_rejects_unknown_reference() {
        let ctx = standard_context(2, 2);
        let engine = ConstraintEngine::with_defaults();
        let bogus = Assignment {
            person_id: uuid::Uuid::from_u128(0xdead),
            block_id: uuid::Uuid::from_u128(0xbeef),
            template_id: uuid::Uuid::from_u128(0xcafe),
            hours: 6.0,
        };
        assert!(matches!(
            engine.evaluate(&[bogus], &ctx, None),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_tier1_counts_as_hard_not_penalty() {
        let ctx = standard_context(2, 10);
        let engine = ConstraintEngine::with_defaults();
        let person = ctx.residents()[0].id;
        let template = ctx.template_of(TemplateKind::Inpatient).id;
        let blocks = daily_blocks(&ctx);

        // 8 consecutive worked days trips OneInSeven
        let assignments: Vec<Assignment> = blocks
            .iter()
            .take(8)
            .map(|day| Assignment {
                person_id: person,
                block_id: day[0].id,
                template_id: template,
                hours: 6.0,
            })
            .collect();

        let report = engine
            .evaluate(&assignments, &ctx, Some(&[crate::domain::Tier::Regulatory]))
            .unwrap();
        assert!(report.hard_violation_count >= 1);
        assert!((report.soft_penalty - 0.0).abs() < 1e-12);
        assert!(!report.is_feasible());
    }

    #[test]
    fn test_tier2_reported_as_high_severity_data() {
        let ctx = standard_context(4, 2);
        let engine = ConstraintEngine::with_defaults();
        // Clinic has min_coverage 1 and nobody is assigned
        let report = engine
            .evaluate(&[], &ctx, Some(&[crate::domain::Tier::Institutional]))
            .unwrap();
        assert!(report.hard_violation_count == 0);
        assert!(!report.violations.is_empty());
        assert!(report
            .violations
            .iter()
            .all(|v| v.severity == Severity::High));
    }

    #[test]
    fn test_soft_penalty_uses_weight_priority_magnitude() {
        let ctx = standard_context(4, 2);
        let engine = ConstraintEngine::with_defaults();
        let report = engine
            .evaluate(&[], &ctx, Some(&[crate::domain::Tier::Preference]))
            .unwrap();
        // Empty schedule misses every coverage target
        assert!(report.soft_penalty > 0.0);

        let breakdown = engine.soft_breakdown(&[], &ctx).unwrap();
        let total: f64 = breakdown.values().sum();
        assert!((total - report.soft_penalty).abs() < 1e-9);
    }
}
