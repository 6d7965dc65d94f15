//! Tier-3 weighted preferences. Findings here are data, folded into the
//! soft penalty; they never block a schedule.

use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::constraints::support::build_timelines;
use crate::constraints::Constraint;
use crate::domain::{
    Assignment, Priority, SchedulingContext, Severity, Tier, Violation,
};

// ============================================================================
// COVERAGE TARGET
// ============================================================================

/// Soft shortfall against `target_coverage`, one magnitude unit per missing
/// assignee.
pub struct CoverageTarget {
    weight: f64,
}

impl Default for CoverageTarget {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl CoverageTarget {
    pub fn with_weight(weight: f64) -> Self {
        Self { weight }
    }
}

impl Constraint for CoverageTarget {
    fn name(&self) -> &str {
        "CoverageTarget"
    }

    fn tier(&self) -> Tier {
        Tier::Preference
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut counts: BTreeMap<(Uuid, Uuid), u32> = BTreeMap::new();
        for assignment in assignments {
            *counts
                .entry((assignment.block_id, assignment.template_id))
                .or_insert(0) += 1;
        }

        let mut violations = Vec::new();
        for block in ctx.blocks() {
            for template in ctx.templates() {
                if template.target_coverage == 0 {
                    continue;
                }
                let count = counts.get(&(block.id, template.id)).copied().unwrap_or(0);
                if count < template.target_coverage {
                    let shortfall = template.target_coverage - count;
                    violations.push(
                        Violation::new(
                            self.name(),
                            self.tier(),
                            Severity::Medium,
                            format!(
                                "template {} on block {} is {} below target coverage",
                                template.name, block.id, shortfall
                            ),
                        )
                        .with_block(block.id)
                        .with_detail("template", json!(template.name.clone()))
                        .with_detail("shortfall", json!(shortfall))
                        .with_magnitude(shortfall as f64),
                    );
                }
            }
        }
        violations
    }
}

// ============================================================================
// WORKLOAD EQUITY
// ============================================================================

/// Penalty proportional to the Gini coefficient of per-resident hours.
pub struct WorkloadEquity {
    weight: f64,
}

impl Default for WorkloadEquity {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl WorkloadEquity {
    pub fn with_weight(weight: f64) -> Self {
        Self { weight }
    }
}

/// Gini coefficient of a non-negative sample; 0 for uniform, approaching 1
/// for fully concentrated load.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mean: f64 = values.iter().sum::<f64>() / n as f64;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let mut abs_diff_sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            abs_diff_sum += (values[i] - values[j]).abs();
        }
    }
    abs_diff_sum / (2.0 * (n * n) as f64 * mean)
}

impl Constraint for WorkloadEquity {
    fn name(&self) -> &str {
        "WorkloadEquity"
    }

    fn tier(&self) -> Tier {
        Tier::Preference
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let hours = ctx.hours_by_person(assignments);
        let resident_hours: Vec<f64> = ctx
            .residents()
            .iter()
            .map(|r| hours.get(&r.id).copied().unwrap_or(0.0))
            .collect();

        let coefficient = gini(&resident_hours);
        if coefficient < 0.01 {
            return Vec::new();
        }

        let mut violation = Violation::new(
            self.name(),
            self.tier(),
            Severity::Low,
            format!("resident workload Gini is {:.3}", coefficient),
        )
        .with_detail("gini", json!(coefficient))
        .with_magnitude(coefficient);
        // Flag the heaviest-loaded residents for the caller
        let max_hours = resident_hours.iter().cloned().fold(0.0, f64::max);
        for resident in ctx.residents() {
            if hours.get(&resident.id).copied().unwrap_or(0.0) >= max_hours - 1e-9 {
                violation = violation.with_person(resident.id);
            }
        }
        vec![violation]
    }
}

// ============================================================================
// SHIFT PREFERENCE
// ============================================================================

/// Penalty when an assignment contradicts a stated preference.
pub struct ShiftPreferenceRule {
    weight: f64,
}

impl Default for ShiftPreferenceRule {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl ShiftPreferenceRule {
    pub fn with_weight(weight: f64) -> Self {
        Self { weight }
    }
}

impl Constraint for ShiftPreferenceRule {
    fn name(&self) -> &str {
        "ShiftPreference"
    }

    fn tier(&self) -> Tier {
        Tier::Preference
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for assignment in assignments {
            let block = match ctx.block(assignment.block_id) {
                Some(b) => b,
                None => continue,
            };

            let prefs: Vec<_> = ctx.preferences_for(assignment.person_id).collect();
            if prefs.is_empty() {
                continue;
            }

            // Matching avoid-preferences each penalize the assignment
            for pref in prefs.iter().filter(|p| p.avoid) {
                if pref.matches(assignment.template_id, block.period) {
                    violations.push(
                        Violation::new(
                            self.name(),
                            self.tier(),
                            Severity::Low,
                            format!(
                                "person {} assigned against an avoid preference on {}",
                                assignment.person_id, block.date
                            ),
                        )
                        .with_person(assignment.person_id)
                        .with_block(assignment.block_id)
                        .with_magnitude(pref.weight),
                    );
                }
            }

            // An assignment matching none of the positive preferences
            let positive: Vec<_> = prefs.iter().filter(|p| !p.avoid).collect();
            if !positive.is_empty()
                && !positive
                    .iter()
                    .any(|p| p.matches(assignment.template_id, block.period))
            {
                let mean_weight: f64 =
                    positive.iter().map(|p| p.weight).sum::<f64>() / positive.len() as f64;
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::Low,
                        format!(
                            "person {} assigned outside stated preferences on {}",
                            assignment.person_id, block.date
                        ),
                    )
                    .with_person(assignment.person_id)
                    .with_block(assignment.block_id)
                    .with_magnitude(mean_weight),
                );
            }
        }
        violations
    }
}

// ============================================================================
// TEAM CONTINUITY
// ============================================================================

/// Penalty for each day-to-day template change on consecutive worked days.
pub struct TeamContinuity {
    weight: f64,
}

impl Default for TeamContinuity {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl TeamContinuity {
    pub fn with_weight(weight: f64) -> Self {
        Self { weight }
    }
}

impl Constraint for TeamContinuity {
    fn name(&self) -> &str {
        "TeamContinuity"
    }

    fn tier(&self) -> Tier {
        Tier::Preference
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (person_id, timeline) in build_timelines(assignments, ctx) {
            let mut prev: Option<(chrono::NaiveDate, Uuid)> = None;
            for (date, load) in &timeline.days {
                let today = match load.templates.first() {
                    Some(t) => *t,
                    None => continue,
                };
                if let Some((prev_date, prev_template)) = prev {
                    let consecutive = *date == prev_date + chrono::Duration::days(1);
                    if consecutive && prev_template != today {
                        violations.push(
                            Violation::new(
                                self.name(),
                                self.tier(),
                                Severity::Info,
                                format!(
                                    "person {} changes team between {} and {}",
                                    person_id, prev_date, date
                                ),
                            )
                            .with_person(person_id),
                        );
                    }
                }
                prev = Some((*date, today));
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{daily_blocks, standard_context, TemplateKind};
    use crate::domain::{BlockPeriod, ShiftPreference};

    #[test]
    fn test_gini_uniform_is_zero() {
        assert!((gini(&[10.0, 10.0, 10.0]) - 0.0).abs() < 1e-12);
        assert!((gini(&[]) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_gini_concentrated_load() {
        // All load on one of four people: Gini = 3/4 x (n-1)/n style skew
        let g = gini(&[40.0, 0.0, 0.0, 0.0]);
        assert!(g > 0.7, "expected high Gini, got {}", g);
        assert!(g <= 1.0);
    }

    #[test]
    fn test_gini_increases_with_spread() {
        let even = gini(&[10.0, 10.0, 10.0, 10.0]);
        let mild = gini(&[12.0, 11.0, 9.0, 8.0]);
        let harsh = gini(&[25.0, 10.0, 4.0, 1.0]);
        assert!(even < mild);
        assert!(mild < harsh);
    }

    #[test]
    fn test_coverage_target_shortfall_magnitude() {
        let ctx = standard_context(4, 1);
        let inpatient = ctx.template_of(TemplateKind::Inpatient);
        assert_eq!(inpatient.target_coverage, 2);

        let rule = CoverageTarget::default();
        let shortfalls = rule.violates(&[], &ctx);
        let inpatient_shortfall = shortfalls
            .iter()
            .find(|v| v.details["template"] == json!(inpatient.name.clone()))
            .unwrap();
        assert!((inpatient_shortfall.magnitude - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_workload_equity_flags_uneven_hours() {
        let ctx = standard_context(3, 6);
        let template = ctx.template_of(TemplateKind::Inpatient).id;
        let blocks = daily_blocks(&ctx);
        let heavy = ctx.residents()[0].id;

        // One resident takes every block, the others none
        let assignments: Vec<Assignment> = blocks
            .iter()
            .take(6)
            .map(|day| Assignment {
                person_id: heavy,
                block_id: day[0].id,
                template_id: template,
                hours: 6.0,
            })
            .collect();

        let rule = WorkloadEquity::default();
        let violations = rule.violates(&assignments, &ctx);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].magnitude > 0.5);
        assert!(violations[0].people.contains(&heavy));
    }

    #[test]
    fn test_workload_equity_quiet_when_even() {
        let ctx = standard_context(2, 4);
        let template = ctx.template_of(TemplateKind::Inpatient).id;
        let blocks = daily_blocks(&ctx);
        let (a, b) = (ctx.residents()[0].id, ctx.residents()[1].id);

        let assignments: Vec<Assignment> = blocks
            .iter()
            .take(4)
            .enumerate()
            .map(|(i, day)| Assignment {
                person_id: if i % 2 == 0 { a } else { b },
                block_id: day[0].id,
                template_id: template,
                hours: 6.0,
            })
            .collect();

        assert!(WorkloadEquity::default()
            .violates(&assignments, &ctx)
            .is_empty());
    }

    #[test]
    fn test_shift_preference_avoid_and_positive() {
        let clinic_id;
        let inpatient_id;
        let person;
        let ctx = {
            let base = standard_context(2, 2);
            clinic_id = base.template_of(TemplateKind::Clinic).id;
            inpatient_id = base.template_of(TemplateKind::Inpatient).id;
            person = base.residents()[0].id;
            base.with_preferences(vec![
                ShiftPreference {
                    person_id: person,
                    template_id: Some(clinic_id),
                    period: None,
                    weight: 2.0,
                    avoid: true,
                },
                ShiftPreference {
                    person_id: person,
                    template_id: Some(inpatient_id),
                    period: Some(BlockPeriod::Am),
                    weight: 1.0,
                    avoid: false,
                },
            ])
        };
        let blocks = daily_blocks(&ctx);

        // Assigned to the avoided clinic: avoid penalty (2.0) plus a
        // positive-preference mismatch (1.0)
        let against = vec![Assignment {
            person_id: person,
            block_id: blocks[0][0].id,
            template_id: clinic_id,
            hours: 6.0,
        }];
        let rule = ShiftPreferenceRule::default();
        let violations = rule.violates(&against, &ctx);
        assert_eq!(violations.len(), 2);
        let total: f64 = violations.iter().map(|v| v.magnitude).sum();
        assert!((total - 3.0).abs() < 1e-9);

        // Assigned to the preferred AM inpatient block: clean
        let aligned = vec![Assignment {
            person_id: person,
            block_id: blocks[0][0].id,
            template_id: inpatient_id,
            hours: 6.0,
        }];
        assert!(rule.violates(&aligned, &ctx).is_empty());
    }

    #[test]
    fn test_team_continuity_counts_changes() {
        let ctx = standard_context(2, 4);
        let person = ctx.residents()[0].id;
        let inpatient = ctx.template_of(TemplateKind::Inpatient).id;
        let clinic = ctx.template_of(TemplateKind::Clinic).id;
        let blocks = daily_blocks(&ctx);

        // inpatient, inpatient, clinic, inpatient: two changes
        let templates = [inpatient, inpatient, clinic, inpatient];
        let assignments: Vec<Assignment> = blocks
            .iter()
            .take(4)
            .zip(templates)
            .map(|(day, template_id)| Assignment {
                person_id: person,
                block_id: day[0].id,
                template_id,
                hours: 6.0,
            })
            .collect();

        let violations = TeamContinuity::default().violates(&assignments, &ctx);
        assert_eq!(violations.len(), 2);
    }
}
