//! Greedy construction backend.
//!
//! Fills blocks in date order, min coverage before target coverage, picking
//! the best-scoring eligible person per seat. Supervision is repaired per
//! block after the seats are filled. Every placement passes the ledger's
//! regulatory guards, so the construction is tier-1 clean whenever the
//! instance allows it.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::constraints::ConstraintEngine;
use crate::domain::{Assignment, Block, Role, RotationTemplate, SchedulingContext};
use crate::solver::candidates::{
    finalize_result, is_churn, ranked_candidates, Ledger, ReferenceIndex,
};
use crate::solver::{SolveOptions, SolverBackend, SolverResult};

pub struct GreedyBackend;

#[derive(Clone, Copy, PartialEq)]
enum CoveragePhase {
    Min,
    Target,
}

impl SolverBackend for GreedyBackend {
    fn name(&self) -> &str {
        "greedy"
    }

    fn solve(
        &self,
        ctx: &SchedulingContext,
        opts: &SolveOptions,
        reference: Option<&[Assignment]>,
        engine: &ConstraintEngine,
    ) -> SolverResult {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(opts.time_budget_ms);
        let reference_index = reference.map(ReferenceIndex::new);

        let mut ledger = Ledger::new(ctx);
        let mut churn_used: HashMap<Uuid, usize> = HashMap::new();
        let mut timed_out = false;
        let mut cancelled = false;

        // Supervised templates first so supervisors are placed before the
        // block fills up; name then id keeps the order deterministic.
        let mut templates: Vec<&RotationTemplate> = ctx.templates().iter().collect();
        templates.sort_by_key(|t| {
            (
                std::cmp::Reverse(t.requires_supervision),
                t.name.clone(),
                t.id,
            )
        });

        'blocks: for block in ctx.blocks() {
            if opts.cancel.is_cancelled() {
                cancelled = true;
                break 'blocks;
            }
            if Instant::now() > deadline {
                timed_out = true;
                break 'blocks;
            }

            for phase in [CoveragePhase::Min, CoveragePhase::Target] {
                for template in &templates {
                    let goal = match phase {
                        CoveragePhase::Min => template.min_coverage,
                        CoveragePhase::Target => template.target_coverage,
                    };
                    fill_seats(
                        &mut ledger,
                        ctx,
                        block,
                        template,
                        goal,
                        reference_index.as_ref(),
                        opts,
                        &mut churn_used,
                    );
                }
            }

            repair_supervision(
                &mut ledger,
                ctx,
                block,
                reference_index.as_ref(),
                opts,
                &mut churn_used,
            );
        }

        finalize_result(
            ctx,
            opts,
            reference,
            engine,
            ledger.to_assignments(),
            self.name(),
            started,
            timed_out,
            cancelled,
        )
    }
}

/// Fill `(block, template)` seats up to `goal` with the best candidates.
#[allow(clippy::too_many_arguments)]
fn fill_seats(
    ledger: &mut Ledger<'_>,
    ctx: &SchedulingContext,
    block: &Block,
    template: &RotationTemplate,
    goal: u32,
    reference: Option<&ReferenceIndex>,
    opts: &SolveOptions,
    churn_used: &mut HashMap<Uuid, usize>,
) {
    while ledger.slot_count(block.id, template.id) < goal {
        let ranked = ranked_candidates(
            ledger,
            ctx.residents().iter().chain(ctx.faculty().iter()),
            block,
            template,
            template.hours_per_block,
            reference,
            &opts.weights,
            churn_used,
            opts.max_churn_per_person,
        );
        let person = match ranked.first() {
            Some((person, _)) => *person,
            None => break,
        };
        if is_churn(reference, person.id, block.id, template.id) {
            *churn_used.entry(person.id).or_insert(0) += 1;
        }
        ledger.assign(Assignment {
            person_id: person.id,
            block_id: block.id,
            template_id: template.id,
            hours: template.hours_per_block,
        });
    }
}

/// Ensure a block with supervised residents carries enough supervising
/// faculty: 2 residents per supervisor with a PGY-1 present, 4 otherwise.
pub(crate) fn repair_supervision(
    ledger: &mut Ledger<'_>,
    ctx: &SchedulingContext,
    block: &Block,
    reference: Option<&ReferenceIndex>,
    opts: &SolveOptions,
    churn_used: &mut HashMap<Uuid, usize>,
) {
    loop {
        let roster = ledger.block_roster(block.id);
        let mut supervised_residents = 0u32;
        let mut pgy1_present = false;
        let mut supervisors = 0u32;
        let mut supervised_template: Option<Uuid> = None;

        for assignment in &roster {
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
                    supervised_template.get_or_insert(template.id);
                }
                Role::Faculty if person.can_supervise => supervisors += 1,
                _ => {}
            }
        }

        if supervised_residents == 0 {
            return;
        }
        let cap = if pgy1_present { 2 } else { 4 };
        let needed = supervised_residents.div_ceil(cap);
        if supervisors >= needed {
            return;
        }

        let template = supervised_template
            .and_then(|id| ctx.template(id))
            .expect("supervised template came from the roster");

        let ranked = ranked_candidates(
            ledger,
            ctx.faculty().iter().filter(|f| f.can_supervise),
            block,
            template,
            template.hours_per_block,
            reference,
            &opts.weights,
            churn_used,
            opts.max_churn_per_person,
        );
        let faculty = match ranked.first() {
            Some((person, _)) => *person,
            None => {
                tracing::debug!(block = %block.id, "no supervisor available");
                return;
            }
        };
        if is_churn(reference, faculty.id, block.id, template.id) {
            *churn_used.entry(faculty.id).or_insert(0) += 1;
        }
        ledger.assign(Assignment {
            person_id: faculty.id,
            block_id: block.id,
            template_id: template.id,
            hours: template.hours_per_block,
        });
    }
}
