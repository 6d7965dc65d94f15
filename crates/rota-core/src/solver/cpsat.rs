//! Constraint-propagation + Metropolis refinement backend.
//!
//! Starts from a greedy construction, then runs seeded Metropolis moves
//! (replace / add / remove a seat occupant) against a block-local surrogate
//! energy. Moves that would break a per-person regulatory rule are rejected
//! outright by the ledger guard; supervision deficits carry a heavy energy
//! penalty and a final repair pass closes any that remain.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::constraints::ConstraintEngine;
use crate::domain::{Assignment, Block, Role, SchedulingContext};
use crate::solver::candidates::{
    candidate_score, context_seed, finalize_result, Ledger, ReferenceIndex,
};
use crate::solver::greedy::{repair_supervision, GreedyBackend};
use crate::solver::{SolveOptions, SolverBackend, SolverResult};

const MIN_SHORTFALL_ENERGY: f64 = 200.0;
const TARGET_SHORTFALL_ENERGY: f64 = 50.0;
const SUPERVISION_DEFICIT_ENERGY: f64 = 500.0;
const SWEEP_ITERATIONS: usize = 1500;

pub struct CpSatBackend;

impl SolverBackend for CpSatBackend {
    fn name(&self) -> &str {
        "cpsat"
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
        let seed = opts.seed.unwrap_or_else(|| context_seed(ctx));
        let mut rng = StdRng::seed_from_u64(seed);

        // Construction phase: greedy with a slice of the budget
        let mut construction_opts = opts.clone();
        construction_opts.time_budget_ms = (opts.time_budget_ms / 3).max(1);
        let construction = GreedyBackend.solve(ctx, &construction_opts, reference, engine);
        if opts.cancel.is_cancelled() {
            return finalize_result(
                ctx,
                opts,
                reference,
                engine,
                construction.assignments,
                self.name(),
                started,
                false,
                true,
            );
        }

        let mut ledger = Ledger::from_assignments(ctx, &construction.assignments);
        let mut churn_used: HashMap<Uuid, usize> = HashMap::new();
        let mut timed_out = false;
        let mut cancelled = false;

        let blocks = ctx.blocks();
        if blocks.is_empty() {
            return finalize_result(
                ctx,
                opts,
                reference,
                engine,
                Vec::new(),
                self.name(),
                started,
                false,
                false,
            );
        }
        let mut current_energy: f64 = blocks
            .iter()
            .map(|b| block_energy(&ledger, ctx, b, reference_index.as_ref(), opts))
            .sum();
        let mut best_energy = current_energy;
        let mut best_assignments = ledger.to_assignments();

        let temperature = 1.0;
        for iteration in 0..SWEEP_ITERATIONS {
            if iteration % 32 == 0 {
                if opts.cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                if Instant::now() > deadline {
                    timed_out = true;
                    break;
                }
            }

            let block = &blocks[rng.gen_range(0..blocks.len())];
            let before = block_energy(&ledger, ctx, block, reference_index.as_ref(), opts);
            let applied = propose_move(&mut ledger, ctx, block, &mut rng);
            let applied = match applied {
                Some(a) => a,
                None => continue,
            };
            let after = block_energy(&ledger, ctx, block, reference_index.as_ref(), opts);
            let delta = after - before;

            let accept = delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp();
            if accept {
                current_energy += delta;
                if current_energy < best_energy - 1e-9 {
                    best_energy = current_energy;
                    best_assignments = ledger.to_assignments();
                }
            } else {
                revert_move(&mut ledger, applied);
            }
        }

        // Close any remaining supervision deficits on the best candidate
        let mut final_ledger = Ledger::from_assignments(ctx, &best_assignments);
        if !cancelled {
            for block in blocks {
                repair_supervision(
                    &mut final_ledger,
                    ctx,
                    block,
                    reference_index.as_ref(),
                    opts,
                    &mut churn_used,
                );
            }
        }

        finalize_result(
            ctx,
            opts,
            reference,
            engine,
            final_ledger.to_assignments(),
            self.name(),
            started,
            timed_out,
            cancelled,
        )
    }
}

enum AppliedMove {
    Added(Assignment),
    Removed(Assignment),
    Replaced { old: Assignment, new: Assignment },
}

/// Block-local surrogate energy: coverage shortfalls, supervision deficit,
/// minus the utility of the current placements.
fn block_energy(
    ledger: &Ledger<'_>,
    ctx: &SchedulingContext,
    block: &Block,
    reference: Option<&ReferenceIndex>,
    opts: &SolveOptions,
) -> f64 {
    let mut energy = 0.0;

    for template in ctx.templates() {
        let count = ledger.slot_count(block.id, template.id);
        if count < template.min_coverage {
            energy += MIN_SHORTFALL_ENERGY * (template.min_coverage - count) as f64;
        }
        if count < template.target_coverage {
            energy += TARGET_SHORTFALL_ENERGY * (template.target_coverage - count) as f64;
        }
    }

    let mut supervised_residents = 0u32;
    let mut pgy1_present = false;
    let mut supervisors = 0u32;
    let empty_churn = HashMap::new();
    for assignment in ledger.block_roster(block.id) {
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
        energy -= candidate_score(
            ledger,
            person,
            block,
            template,
            reference,
            &opts.weights,
            &empty_churn,
            opts.max_churn_per_person,
        );
    }
    if supervised_residents > 0 {
        let cap = if pgy1_present { 2 } else { 4 };
        let needed = supervised_residents.div_ceil(cap);
        if supervisors < needed {
            energy += SUPERVISION_DEFICIT_ENERGY * (needed - supervisors) as f64;
        }
    }
    energy
}

/// Propose and apply one random move on `block`; `None` when the draw has
/// no legal move.
fn propose_move(
    ledger: &mut Ledger<'_>,
    ctx: &SchedulingContext,
    block: &Block,
    rng: &mut StdRng,
) -> Option<AppliedMove> {
    let templates = ctx.templates();
    let template = &templates[rng.gen_range(0..templates.len())];
    let occupants: Vec<Assignment> = ledger
        .block_roster(block.id)
        .into_iter()
        .filter(|a| a.template_id == template.id)
        .cloned()
        .collect();
    let count = occupants.len() as u32;

    match rng.gen_range(0..3u8) {
        // Replace an occupant with an eligible substitute
        0 if !occupants.is_empty() => {
            let victim = occupants[rng.gen_range(0..occupants.len())].clone();
            let removed = ledger.unassign(victim.person_id, victim.block_id)?;
            let pool: Vec<_> = ctx
                .residents()
                .iter()
                .chain(ctx.faculty().iter())
                .filter(|p| ledger.can_assign(p, block, template, template.hours_per_block))
                .collect();
            if pool.is_empty() {
                ledger.assign(removed);
                return None;
            }
            let replacement = pool[rng.gen_range(0..pool.len())];
            let new = Assignment {
                person_id: replacement.id,
                block_id: block.id,
                template_id: template.id,
                hours: template.hours_per_block,
            };
            ledger.assign(new.clone());
            Some(AppliedMove::Replaced { old: removed, new })
        }
        // Add a person up to max coverage
        1 if count < template.max_coverage => {
            let pool: Vec<_> = ctx
                .residents()
                .iter()
                .chain(ctx.faculty().iter())
                .filter(|p| ledger.can_assign(p, block, template, template.hours_per_block))
                .collect();
            if pool.is_empty() {
                return None;
            }
            let person = pool[rng.gen_range(0..pool.len())];
            let assignment = Assignment {
                person_id: person.id,
                block_id: block.id,
                template_id: template.id,
                hours: template.hours_per_block,
            };
            ledger.assign(assignment.clone());
            Some(AppliedMove::Added(assignment))
        }
        // Drop a seat above min coverage
        2 if count > template.min_coverage && !occupants.is_empty() => {
            let victim = occupants[rng.gen_range(0..occupants.len())].clone();
            let removed = ledger.unassign(victim.person_id, victim.block_id)?;
            Some(AppliedMove::Removed(removed))
        }
        _ => None,
    }
}

fn revert_move(ledger: &mut Ledger<'_>, applied: AppliedMove) {
    match applied {
        AppliedMove::Added(a) => {
            ledger.unassign(a.person_id, a.block_id);
        }
        AppliedMove::Removed(a) => {
            ledger.assign(a);
        }
        AppliedMove::Replaced { old, new } => {
            ledger.unassign(new.person_id, new.block_id);
            ledger.assign(old);
        }
    }
}
