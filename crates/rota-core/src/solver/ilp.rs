//! Regret-ordered assignment backend.
//!
//! Builds the full seat list up front, prices every seat's best and
//! second-best candidate, and places seats in descending regret order so
//! contested seats are decided while options remain. A bounded improvement
//! sweep then reconsiders each placement against the surrogate objective.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::constraints::ConstraintEngine;
use crate::domain::{Assignment, SchedulingContext};
use crate::solver::candidates::{
    finalize_result, is_churn, ranked_candidates, Ledger, ReferenceIndex,
};
use crate::solver::greedy::repair_supervision;
use crate::solver::{SolveOptions, SolverBackend, SolverResult};

pub struct IlpBackend;

struct Seat {
    block_idx: usize,
    template_id: Uuid,
    /// Seats under `min_coverage` place before target-coverage seats.
    required: bool,
}

impl SolverBackend for IlpBackend {
    fn name(&self) -> &str {
        "ilp"
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

        let seats = seat_list(ctx);

        // Price each seat once against the empty ledger; regret is the gap
        // between its best and second-best candidate.
        let mut priced: Vec<(usize, f64)> = seats
            .iter()
            .enumerate()
            .map(|(seat_idx, seat)| {
                let block = &ctx.blocks()[seat.block_idx];
                let template = ctx.template(seat.template_id).expect("seat template");
                let ranked = ranked_candidates(
                    &ledger,
                    ctx.residents().iter().chain(ctx.faculty().iter()),
                    block,
                    template,
                    template.hours_per_block,
                    reference_index.as_ref(),
                    &opts.weights,
                    &churn_used,
                    opts.max_churn_per_person,
                );
                let regret = match (ranked.first(), ranked.get(1)) {
                    (Some((_, best)), Some((_, second))) => best - second,
                    (Some(_), None) => f64::MAX / 2.0,
                    (None, _) => f64::MIN / 2.0,
                };
                (seat_idx, regret)
            })
            .collect();
        priced.sort_by(|a, b| {
            let req_a = seats[a.0].required;
            let req_b = seats[b.0].required;
            req_b
                .cmp(&req_a)
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.0.cmp(&b.0))
        });

        'placement: for (seat_idx, _) in &priced {
            if opts.cancel.is_cancelled() {
                cancelled = true;
                break 'placement;
            }
            if Instant::now() > deadline {
                timed_out = true;
                break 'placement;
            }

            let seat = &seats[*seat_idx];
            let block = &ctx.blocks()[seat.block_idx];
            let template = ctx.template(seat.template_id).expect("seat template");
            let filled = ledger.slot_count(block.id, template.id);
            let goal = if seat.required {
                template.min_coverage
            } else {
                template.target_coverage
            };
            if filled >= goal {
                continue;
            }

            let ranked = ranked_candidates(
                &ledger,
                ctx.residents().iter().chain(ctx.faculty().iter()),
                block,
                template,
                template.hours_per_block,
                reference_index.as_ref(),
                &opts.weights,
                &churn_used,
                opts.max_churn_per_person,
            );
            if let Some((person, _)) = ranked.first() {
                if is_churn(reference_index.as_ref(), person.id, block.id, template.id) {
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

        if !cancelled && !timed_out {
            for block in ctx.blocks() {
                repair_supervision(
                    &mut ledger,
                    ctx,
                    block,
                    reference_index.as_ref(),
                    opts,
                    &mut churn_used,
                );
            }
            improvement_sweep(
                &mut ledger,
                ctx,
                reference_index.as_ref(),
                opts,
                &mut churn_used,
                deadline,
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

/// Every `(block, template)` seat: min-coverage seats then target top-ups.
fn seat_list(ctx: &SchedulingContext) -> Vec<Seat> {
    let mut templates: Vec<_> = ctx.templates().iter().collect();
    templates.sort_by_key(|t| (t.name.clone(), t.id));

    let mut seats = Vec::new();
    for (block_idx, _) in ctx.blocks().iter().enumerate() {
        for template in &templates {
            for seat in 0..template.target_coverage.max(template.min_coverage) {
                seats.push(Seat {
                    block_idx,
                    template_id: template.id,
                    required: seat < template.min_coverage,
                });
            }
        }
    }
    seats
}

/// One deterministic pass that retries each placement with a strictly
/// better-scoring substitute.
fn improvement_sweep(
    ledger: &mut Ledger<'_>,
    ctx: &SchedulingContext,
    reference: Option<&ReferenceIndex>,
    opts: &SolveOptions,
    churn_used: &mut HashMap<Uuid, usize>,
    deadline: Instant,
) {
    let snapshot = ledger.to_assignments();
    for assignment in snapshot {
        if opts.cancel.is_cancelled() || Instant::now() > deadline {
            return;
        }
        let block = match ctx.block(assignment.block_id) {
            Some(b) => b.clone(),
            None => continue,
        };
        let template = match ctx.template(assignment.template_id) {
            Some(t) => t.clone(),
            None => continue,
        };

        let current = match ctx.person(assignment.person_id) {
            Some(p) => p.clone(),
            None => continue,
        };
        ledger.unassign(assignment.person_id, assignment.block_id);

        let ranked = ranked_candidates(
            ledger,
            ctx.residents().iter().chain(ctx.faculty().iter()),
            &block,
            &template,
            assignment.hours,
            reference,
            &opts.weights,
            churn_used,
            opts.max_churn_per_person,
        );
        let current_score = ranked
            .iter()
            .find(|(p, _)| p.id == current.id)
            .map(|(_, s)| *s);
        let replacement = match (ranked.first(), current_score) {
            (Some((best, best_score)), Some(current_score))
                if best.id != current.id && *best_score > current_score + 1e-9 =>
            {
                Some((*best).clone())
            }
            _ => None,
        };

        match replacement {
            Some(person) => {
                if is_churn(reference, person.id, block.id, template.id) {
                    *churn_used.entry(person.id).or_insert(0) += 1;
                }
                ledger.assign(Assignment {
                    person_id: person.id,
                    block_id: block.id,
                    template_id: template.id,
                    hours: assignment.hours,
                });
            }
            None => ledger.assign(assignment),
        }
    }
}
