//! Tier-2 institutional policy rules. Violations are reported at high
//! severity; whether they block acceptance is the caller's decision, with
//! overrides recorded in the violation details.

use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::constraints::Constraint;
use crate::domain::{Assignment, SchedulingContext, Severity, Tier, Violation};
use crate::solver::anti_churn;

// ============================================================================
// COVERAGE MIN
// ============================================================================

/// Per template per block, assignees must reach `min_coverage`.
pub struct CoverageMin;

impl Constraint for CoverageMin {
    fn name(&self) -> &str {
        "CoverageMin"
    }

    fn tier(&self) -> Tier {
        Tier::Institutional
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
                if template.min_coverage == 0 {
                    continue;
                }
                let count = counts.get(&(block.id, template.id)).copied().unwrap_or(0);
                if count < template.min_coverage {
                    violations.push(
                        Violation::new(
                            self.name(),
                            self.tier(),
                            Severity::High,
                            format!(
                                "template {} on block {} ({}) has {} of {} required assignees",
                                template.name, block.id, block.date, count, template.min_coverage
                            ),
                        )
                        .with_block(block.id)
                        .with_detail("template", json!(template.name.clone()))
                        .with_detail("assigned", json!(count))
                        .with_detail("min_coverage", json!(template.min_coverage)),
                    );
                }
            }
        }
        violations
    }
}

// ============================================================================
// MAX CHURN PER PERSON
// ============================================================================

/// Caps the number of changed `(person, block)` pairs per person relative
/// to a reference schedule. Registered only when a reference exists.
pub struct MaxChurnPerPerson {
    reference: Vec<Assignment>,
    cap: u32,
}

impl MaxChurnPerPerson {
    pub fn new(reference: Vec<Assignment>, cap: u32) -> Self {
        Self { reference, cap }
    }
}

impl Constraint for MaxChurnPerPerson {
    fn name(&self) -> &str {
        "MaxChurnPerPerson"
    }

    fn tier(&self) -> Tier {
        Tier::Institutional
    }

    fn violates(&self, assignments: &[Assignment], _ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (person_id, changes) in anti_churn::per_person_changes(&self.reference, assignments) {
            if changes > self.cap as usize {
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::High,
                        format!(
                            "person {} has {} changed block(s), cap is {}",
                            person_id, changes, self.cap
                        ),
                    )
                    .with_person(person_id)
                    .with_detail("changes", json!(changes))
                    .with_detail("cap", json!(self.cap)),
                );
            }
        }
        violations
    }
}
