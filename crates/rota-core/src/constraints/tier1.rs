//! Tier-1 regulatory rules. These must hold on every authoritative state.

use serde_json::json;

use crate::constraints::support::{
    build_timelines, longest_duty_chain, longest_night_float_run, longest_worked_run,
    worst_rolling_window,
};
use crate::constraints::Constraint;
use crate::domain::{
    Assignment, PersonStatus, Role, SchedulingContext, Severity, Tier, Violation,
};

/// Rolling 4-week hour cap: 80 h/week averaged over 28 days.
const FOUR_WEEK_HOUR_CAP: f64 = 320.0;
const FOUR_WEEK_WINDOW_DAYS: i64 = 28;

/// Longest permitted continuous duty period, standard exception included.
const MAX_DUTY_PERIOD_HOURS: f64 = 24.0;

/// Longest permitted run of consecutive night-float days.
const MAX_NIGHT_FLOAT_RUN: u32 = 6;

/// Longest permitted run of consecutive worked days (the 1-in-7 rule).
const MAX_WORKED_RUN: u32 = 6;

// ============================================================================
// WORK HOUR 80
// ============================================================================

/// Rolling 4-week sum of hours per person must stay at or below 320.
pub struct WorkHour80;

impl Constraint for WorkHour80 {
    fn name(&self) -> &str {
        "WorkHour80"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (person_id, timeline) in build_timelines(assignments, ctx) {
            if let Some((window_start, total)) =
                worst_rolling_window(&timeline, FOUR_WEEK_WINDOW_DAYS)
            {
                if total > FOUR_WEEK_HOUR_CAP + 1e-9 {
                    violations.push(
                        Violation::new(
                            self.name(),
                            self.tier(),
                            Severity::Critical,
                            format!(
                                "person {} works {:.1}h in the 28 days from {}",
                                person_id, total, window_start
                            ),
                        )
                        .with_person(person_id)
                        .with_detail("window_start", json!(window_start.to_string()))
                        .with_detail("total_hours", json!(total)),
                    );
                }
            }
        }
        violations
    }
}

// ============================================================================
// ONE IN SEVEN
// ============================================================================

/// No 7-day window may have zero off-days; equivalently, no run of 7+
/// consecutive worked days.
pub struct OneInSeven;

impl Constraint for OneInSeven {
    fn name(&self) -> &str {
        "OneInSeven"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (person_id, timeline) in build_timelines(assignments, ctx) {
            if let Some((run_start, run_len)) = longest_worked_run(&timeline) {
                if run_len > MAX_WORKED_RUN {
                    violations.push(
                        Violation::new(
                            self.name(),
                            self.tier(),
                            Severity::Critical,
                            format!(
                                "person {} works {} consecutive days starting {}",
                                person_id, run_len, run_start
                            ),
                        )
                        .with_person(person_id)
                        .with_detail("run_start", json!(run_start.to_string()))
                        .with_detail("run_length", json!(run_len)),
                    );
                }
            }
        }
        violations
    }
}

// ============================================================================
// SUPERVISION RATIO
// ============================================================================

/// Residents on supervised templates need faculty present on the same
/// block: at most 2 residents per supervisor when a PGY-1 is present, at
/// most 4 otherwise.
pub struct SupervisionRatio;

impl Constraint for SupervisionRatio {
    fn name(&self) -> &str {
        "SupervisionRatio"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();

        for block in ctx.blocks() {
            let in_block: Vec<&Assignment> = assignments
                .iter()
                .filter(|a| a.block_id == block.id)
                .collect();
            if in_block.is_empty() {
                continue;
            }

            let mut supervised_residents = 0u32;
            let mut pgy1_present = false;
            let mut supervisors = 0u32;

            for assignment in &in_block {
                let person = match ctx.person(assignment.person_id) {
                    Some(p) => p,
                    None => continue,
                };
                let template = match ctx.template(assignment.template_id) {
                    Some(t) => t,
                    None => continue,
                };
                match person.role {
                    Role::Resident if template.requires_supervision => {
                        supervised_residents += 1;
                        pgy1_present |= person.is_pgy1();
                    }
                    Role::Faculty if person.can_supervise => supervisors += 1,
                    _ => {}
                }
            }

            if supervised_residents == 0 {
                continue;
            }

            let cap = if pgy1_present { 2.0 } else { 4.0 };
            let ratio_exceeded = match supervisors {
                0 => true,
                n => supervised_residents as f64 / n as f64 > cap + 1e-9,
            };
            if ratio_exceeded {
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::Critical,
                        format!(
                            "block {} on {} has {} supervised resident(s) and {} supervisor(s) (cap {}:1)",
                            block.id, block.date, supervised_residents, supervisors, cap
                        ),
                    )
                    .with_block(block.id)
                    .with_detail("residents", json!(supervised_residents))
                    .with_detail("supervisors", json!(supervisors))
                    .with_detail("pgy1_present", json!(pgy1_present)),
                );
            }
        }
        violations
    }
}

// ============================================================================
// DUTY PERIOD LIMIT
// ============================================================================

/// Continuous duty (same-day blocks plus overnight chains) capped at 24h.
pub struct DutyPeriodLimit;

impl Constraint for DutyPeriodLimit {
    fn name(&self) -> &str {
        "DutyPeriodLimit"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (person_id, timeline) in build_timelines(assignments, ctx) {
            let chain = longest_duty_chain(&timeline);
            if chain > MAX_DUTY_PERIOD_HOURS + 1e-9 {
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::Critical,
                        format!(
                            "person {} has a {:.1}h continuous duty period",
                            person_id, chain
                        ),
                    )
                    .with_person(person_id)
                    .with_detail("duty_hours", json!(chain)),
                );
            }
        }
        violations
    }
}

// ============================================================================
// NIGHT FLOAT LIMIT
// ============================================================================

/// At most 6 consecutive night-float days.
pub struct NightFloatLimit;

impl Constraint for NightFloatLimit {
    fn name(&self) -> &str {
        "NightFloatLimit"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (person_id, timeline) in build_timelines(assignments, ctx) {
            if let Some((run_start, run_len)) = longest_night_float_run(&timeline) {
                if run_len > MAX_NIGHT_FLOAT_RUN {
                    violations.push(
                        Violation::new(
                            self.name(),
                            self.tier(),
                            Severity::Critical,
                            format!(
                                "person {} works {} consecutive night-float days starting {}",
                                person_id, run_len, run_start
                            ),
                        )
                        .with_person(person_id)
                        .with_detail("run_start", json!(run_start.to_string()))
                        .with_detail("run_length", json!(run_len)),
                    );
                }
            }
        }
        violations
    }
}

// ============================================================================
// ABSENCE BLOCKING
// ============================================================================

/// No assignment may overlap a deployment or extended leave.
pub struct AbsenceBlocking;

impl Constraint for AbsenceBlocking {
    fn name(&self) -> &str {
        "AbsenceBlocking"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for assignment in assignments {
            let block = match ctx.block(assignment.block_id) {
                Some(b) => b,
                None => continue,
            };
            if ctx.is_fully_absent(assignment.person_id, block.date) {
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::Critical,
                        format!(
                            "person {} assigned on {} during a blocking absence",
                            assignment.person_id, block.date
                        ),
                    )
                    .with_person(assignment.person_id)
                    .with_block(assignment.block_id)
                    .with_detail("date", json!(block.date.to_string())),
                );
            }
        }
        violations
    }
}

// ============================================================================
// QUALIFICATION
// ============================================================================

/// PGY level and certifications must match the template; inactive people
/// may not be scheduled.
pub struct Qualification;

impl Constraint for Qualification {
    fn name(&self) -> &str {
        "Qualification"
    }

    fn tier(&self) -> Tier {
        Tier::Regulatory
    }

    fn violates(&self, assignments: &[Assignment], ctx: &SchedulingContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for assignment in assignments {
            let (person, template) = match (
                ctx.person(assignment.person_id),
                ctx.template(assignment.template_id),
            ) {
                (Some(p), Some(t)) => (p, t),
                _ => continue,
            };

            if person.status == PersonStatus::Inactive {
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::Critical,
                        format!("inactive person {} is scheduled", person.id),
                    )
                    .with_person(person.id)
                    .with_block(assignment.block_id),
                );
                continue;
            }

            if !template.admits(person) {
                violations.push(
                    Violation::new(
                        self.name(),
                        self.tier(),
                        Severity::Critical,
                        format!(
                            "person {} does not qualify for template {}",
                            person.id, template.name
                        ),
                    )
                    .with_person(person.id)
                    .with_block(assignment.block_id)
                    .with_detail("template", json!(template.name.clone())),
                );
            }
        }
        violations
    }
}
