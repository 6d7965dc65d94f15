//! Shared construction machinery for solver backends: demand slots, an
//! incremental feasibility ledger, and candidate scoring.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::domain::{
    ActivityType, Assignment, Block, Person, Role, RotationTemplate, SchedulingContext,
};
use crate::solver::ObjectiveWeights;

/// Rolling 4-week cap and run limits mirrored from the tier-1 rules. The
/// ledger enforces them during construction so backends rarely need repair.
const FOUR_WEEK_HOUR_CAP: f64 = 320.0;
const FOUR_WEEK_WINDOW_DAYS: i64 = 28;
const MAX_DUTY_PERIOD_HOURS: f64 = 24.0;
const MAX_NIGHT_FLOAT_RUN: u32 = 6;
const MAX_WORKED_RUN: u32 = 6;

/// Index of a reference schedule for anti-churn scoring.
pub struct ReferenceIndex {
    templates: HashMap<(Uuid, Uuid), Uuid>,
}

impl ReferenceIndex {
    pub fn new(reference: &[Assignment]) -> Self {
        let templates = reference
            .iter()
            .map(|a| (a.key(), a.template_id))
            .collect();
        Self { templates }
    }

    pub fn template_for(&self, person_id: Uuid, block_id: Uuid) -> Option<Uuid> {
        self.templates.get(&(person_id, block_id)).copied()
    }
}

/// Incremental feasibility ledger over a growing assignment set.
///
/// `can_assign` rejects any placement that would break a tier-1 rule for
/// the person, so backends construct schedules that are regulation-clean by
/// design; supervision is block-scoped and repaired separately.
pub struct Ledger<'a> {
    ctx: &'a SchedulingContext,
    assignments: BTreeMap<(Uuid, Uuid), Assignment>,
    day_hours: HashMap<Uuid, BTreeMap<NaiveDate, f64>>,
    worked_days: HashMap<Uuid, BTreeSet<NaiveDate>>,
    night_float_days: HashMap<Uuid, BTreeSet<NaiveDate>>,
    overnight_days: HashMap<Uuid, BTreeSet<NaiveDate>>,
    last_template_by_day: HashMap<(Uuid, NaiveDate), Uuid>,
    slot_counts: HashMap<(Uuid, Uuid), u32>,
    total_hours: HashMap<Uuid, f64>,
}

impl<'a> Ledger<'a> {
    pub fn new(ctx: &'a SchedulingContext) -> Self {
        Self {
            ctx,
            assignments: BTreeMap::new(),
            day_hours: HashMap::new(),
            worked_days: HashMap::new(),
            night_float_days: HashMap::new(),
            overnight_days: HashMap::new(),
            last_template_by_day: HashMap::new(),
            slot_counts: HashMap::new(),
            total_hours: HashMap::new(),
        }
    }

    pub fn from_assignments(ctx: &'a SchedulingContext, assignments: &[Assignment]) -> Self {
        let mut ledger = Self::new(ctx);
        for assignment in assignments {
            ledger.assign(assignment.clone());
        }
        ledger
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn total_hours(&self, person_id: Uuid) -> f64 {
        self.total_hours.get(&person_id).copied().unwrap_or(0.0)
    }

    pub fn is_assigned(&self, person_id: Uuid, block_id: Uuid) -> bool {
        self.assignments.contains_key(&(person_id, block_id))
    }

    pub fn slot_count(&self, block_id: Uuid, template_id: Uuid) -> u32 {
        self.slot_counts
            .get(&(block_id, template_id))
            .copied()
            .unwrap_or(0)
    }

    /// People assigned to a block, with their roles and templates.
    pub fn block_roster(&self, block_id: Uuid) -> Vec<&Assignment> {
        self.assignments
            .values()
            .filter(|a| a.block_id == block_id)
            .collect()
    }

    pub fn template_on_day(&self, person_id: Uuid, date: NaiveDate) -> Option<Uuid> {
        self.last_template_by_day.get(&(person_id, date)).copied()
    }

    /// Deterministically ordered snapshot of the ledger.
    pub fn to_assignments(&self) -> Vec<Assignment> {
        self.assignments.values().cloned().collect()
    }

    /// Check whether placing `person` on `block`/`template` keeps every
    /// per-person regulatory rule intact.
    pub fn can_assign(
        &self,
        person: &Person,
        block: &Block,
        template: &RotationTemplate,
        hours: f64,
    ) -> bool {
        if !person.is_active() {
            return false;
        }
        if !template.admits(person) {
            return false;
        }
        if self.is_assigned(person.id, block.id) {
            return false;
        }
        if self.ctx.is_fully_absent(person.id, block.date) {
            return false;
        }
        if self.slot_count(block.id, template.id) >= template.max_coverage {
            return false;
        }

        let days = self.worked_days.get(&person.id);
        let worked_today = days.map(|d| d.contains(&block.date)).unwrap_or(false);

        // 1-in-7: a new worked day must not close a 7-day run
        if !worked_today {
            let run = self.run_length_through(person.id, block.date, days);
            if run > MAX_WORKED_RUN {
                return false;
            }
        }

        // Night-float run cap
        if template.activity_type == ActivityType::NightFloat {
            let nights = self.night_float_days.get(&person.id);
            let already = nights.map(|d| d.contains(&block.date)).unwrap_or(false);
            if !already {
                let run = self.run_length_through(person.id, block.date, nights);
                if run > MAX_NIGHT_FLOAT_RUN {
                    return false;
                }
            }
        }

        // Rolling 28-day hour cap over every window containing this date
        let person_days = self.day_hours.get(&person.id);
        let mut window_start = block.date - chrono::Duration::days(FOUR_WEEK_WINDOW_DAYS - 1);
        while window_start <= block.date {
            let window_end = window_start + chrono::Duration::days(FOUR_WEEK_WINDOW_DAYS - 1);
            let existing: f64 = person_days
                .map(|days| days.range(window_start..=window_end).map(|(_, h)| h).sum())
                .unwrap_or(0.0);
            if existing + hours > FOUR_WEEK_HOUR_CAP + 1e-9 {
                return false;
            }
            window_start += chrono::Duration::days(1);
        }

        // Continuous duty: today's hours plus an overnight chain from
        // yesterday, plus tomorrow if this block is overnight
        let today_hours = person_days
            .and_then(|d| d.get(&block.date))
            .copied()
            .unwrap_or(0.0);
        let yesterday = block.date - chrono::Duration::days(1);
        let chained_from_yesterday = if self
            .overnight_days
            .get(&person.id)
            .map(|d| d.contains(&yesterday))
            .unwrap_or(false)
        {
            person_days
                .and_then(|d| d.get(&yesterday))
                .copied()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let tomorrow = block.date + chrono::Duration::days(1);
        let chained_into_tomorrow = if block.period.is_overnight() {
            person_days
                .and_then(|d| d.get(&tomorrow))
                .copied()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        if chained_from_yesterday + today_hours + hours + chained_into_tomorrow
            > MAX_DUTY_PERIOD_HOURS + 1e-9
        {
            return false;
        }

        true
    }

    fn run_length_through(
        &self,
        _person_id: Uuid,
        date: NaiveDate,
        days: Option<&BTreeSet<NaiveDate>>,
    ) -> u32 {
        let days = match days {
            Some(d) => d,
            None => return 1,
        };
        let mut run = 1u32;
        let mut cursor = date - chrono::Duration::days(1);
        while days.contains(&cursor) {
            run += 1;
            cursor -= chrono::Duration::days(1);
        }
        cursor = date + chrono::Duration::days(1);
        while days.contains(&cursor) {
            run += 1;
            cursor += chrono::Duration::days(1);
        }
        run
    }

    pub fn assign(&mut self, assignment: Assignment) {
        let block = match self.ctx.block(assignment.block_id) {
            Some(b) => b.clone(),
            None => return,
        };
        let template_nf = self
            .ctx
            .template(assignment.template_id)
            .map(|t| t.activity_type == ActivityType::NightFloat)
            .unwrap_or(false);

        *self
            .day_hours
            .entry(assignment.person_id)
            .or_default()
            .entry(block.date)
            .or_insert(0.0) += assignment.hours;
        self.worked_days
            .entry(assignment.person_id)
            .or_default()
            .insert(block.date);
        if template_nf {
            self.night_float_days
                .entry(assignment.person_id)
                .or_default()
                .insert(block.date);
        }
        if block.period.is_overnight() {
            self.overnight_days
                .entry(assignment.person_id)
                .or_default()
                .insert(block.date);
        }
        self.last_template_by_day
            .insert((assignment.person_id, block.date), assignment.template_id);
        *self
            .slot_counts
            .entry((assignment.block_id, assignment.template_id))
            .or_insert(0) += 1;
        *self.total_hours.entry(assignment.person_id).or_insert(0.0) += assignment.hours;
        self.assignments.insert(assignment.key(), assignment);
    }

    /// Remove an assignment and rebuild the person's derived state.
    pub fn unassign(&mut self, person_id: Uuid, block_id: Uuid) -> Option<Assignment> {
        let removed = self.assignments.remove(&(person_id, block_id))?;

        // Rebuild this person's per-day indexes from their remaining
        // assignments; simpler than decremental bookkeeping and only as
        // expensive as their own schedule.
        self.day_hours.remove(&person_id);
        self.worked_days.remove(&person_id);
        self.night_float_days.remove(&person_id);
        self.overnight_days.remove(&person_id);
        self.total_hours.remove(&person_id);
        self.last_template_by_day
            .retain(|(p, _), _| *p != person_id);

        *self
            .slot_counts
            .entry((removed.block_id, removed.template_id))
            .or_insert(1) -= 1;

        let remaining: Vec<Assignment> = self
            .assignments
            .values()
            .filter(|a| a.person_id == person_id)
            .cloned()
            .collect();
        for assignment in remaining {
            let block = match self.ctx.block(assignment.block_id) {
                Some(b) => b.clone(),
                None => continue,
            };
            let template_nf = self
                .ctx
                .template(assignment.template_id)
                .map(|t| t.activity_type == ActivityType::NightFloat)
                .unwrap_or(false);
            *self
                .day_hours
                .entry(person_id)
                .or_default()
                .entry(block.date)
                .or_insert(0.0) += assignment.hours;
            self.worked_days
                .entry(person_id)
                .or_default()
                .insert(block.date);
            if template_nf {
                self.night_float_days
                    .entry(person_id)
                    .or_default()
                    .insert(block.date);
            }
            if block.period.is_overnight() {
                self.overnight_days
                    .entry(person_id)
                    .or_default()
                    .insert(block.date);
            }
            self.last_template_by_day
                .insert((person_id, block.date), assignment.template_id);
            *self.total_hours.entry(person_id).or_insert(0.0) += assignment.hours;
        }
        Some(removed)
    }
}

/// Score a candidate placement. Higher is better; ties break on person id
/// for determinism.
pub fn candidate_score(
    ledger: &Ledger<'_>,
    person: &Person,
    block: &Block,
    template: &RotationTemplate,
    reference: Option<&ReferenceIndex>,
    weights: &ObjectiveWeights,
    churn_used: &HashMap<Uuid, usize>,
    max_churn_per_person: u32,
) -> f64 {
    let mut score = 0.0;

    // Equity: favor the least-loaded people
    let capacity = (person.max_hours_per_week * 4.0).max(1.0);
    let load = (ledger.total_hours(person.id) / capacity).min(1.0);
    score += weights.equity * (1.0 - load);

    // Preference alignment
    let mut preference_term = 0.0;
    let mut has_positive = false;
    let mut positive_match = false;
    for pref in ledger.ctx.preferences_for(person.id) {
        let matches = pref.matches(template.id, block.period);
        if pref.avoid {
            if matches {
                preference_term -= pref.weight;
            }
        } else {
            has_positive = true;
            positive_match |= matches;
        }
    }
    if has_positive {
        preference_term += if positive_match { 0.5 } else { -0.5 };
    }
    score += weights.preference * preference_term;

    // Continuity: same template as the previous day
    let yesterday = block.date - chrono::Duration::days(1);
    if ledger.template_on_day(person.id, yesterday) == Some(template.id) {
        score += weights.continuity;
    }

    // Anti-churn: keep the reference placement; spend the per-person
    // change budget reluctantly
    if let Some(reference) = reference {
        match reference.template_for(person.id, block.id) {
            Some(ref_template) if ref_template == template.id => {
                score += weights.anti_churn_alpha * 10.0;
            }
            Some(_) => {
                score -= weights.anti_churn_alpha * 5.0;
                let used = churn_used.get(&person.id).copied().unwrap_or(0);
                if used >= max_churn_per_person as usize {
                    score -= 100.0;
                }
            }
            None => {
                // A brand-new (person, block) pair is churn too
                score -= weights.anti_churn_alpha;
                let used = churn_used.get(&person.id).copied().unwrap_or(0);
                if used >= max_churn_per_person as usize {
                    score -= 100.0;
                }
            }
        }
    }

    // Residents take precedence over faculty on non-supervised work
    if person.role == Role::Faculty && !template.requires_supervision {
        score -= 0.25;
    }

    score
}

/// Whether a placement changes the reference schedule for this person.
pub fn is_churn(reference: Option<&ReferenceIndex>, person_id: Uuid, block_id: Uuid, template_id: Uuid) -> bool {
    match reference {
        None => false,
        Some(r) => r.template_for(person_id, block_id) != Some(template_id),
    }
}

/// Eligible people for a slot, sorted by descending score then person id.
#[allow(clippy::too_many_arguments)]
pub fn ranked_candidates<'p>(
    ledger: &Ledger<'_>,
    people: impl Iterator<Item = &'p Person>,
    block: &Block,
    template: &RotationTemplate,
    hours: f64,
    reference: Option<&ReferenceIndex>,
    weights: &ObjectiveWeights,
    churn_used: &HashMap<Uuid, usize>,
    max_churn_per_person: u32,
) -> Vec<(&'p Person, f64)> {
    let mut candidates: Vec<(&Person, f64)> = people
        .filter(|p| ledger.can_assign(p, block, template, hours))
        .map(|p| {
            let score = candidate_score(
                ledger,
                p,
                block,
                template,
                reference,
                weights,
                churn_used,
                max_churn_per_person,
            );
            (p, score)
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    candidates
}

/// Default RNG seed derived from the context's identity: the first eight
/// bytes of a SHA-256 over every person, block and template id.
pub fn context_seed(ctx: &SchedulingContext) -> u64 {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for person in ctx.residents().iter().chain(ctx.faculty().iter()) {
        hasher.update(person.id.as_bytes());
    }
    for block in ctx.blocks() {
        hasher.update(block.id.as_bytes());
    }
    for template in ctx.templates() {
        hasher.update(template.id.as_bytes());
    }
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().expect("digest is 32 bytes"))
}

/// Assemble a `SolverResult` from a finished construction: evaluate the
/// catalog, price the objective, and classify the outcome.
pub(crate) fn finalize_result(
    ctx: &SchedulingContext,
    opts: &crate::solver::SolveOptions,
    reference: Option<&[Assignment]>,
    engine: &crate::constraints::ConstraintEngine,
    assignments: Vec<Assignment>,
    backend_name: &str,
    started: std::time::Instant,
    timed_out: bool,
    cancelled: bool,
) -> crate::solver::SolverResult {
    use crate::constraints::{Constraint, MaxChurnPerPerson};
    use crate::solver::{SolveStatus, SolverResult};

    let (mut violations, soft_penalty, hard_count, soft_breakdown) =
        match engine.evaluate(&assignments, ctx, None) {
            Ok(report) => {
                let breakdown = engine
                    .soft_breakdown(&assignments, ctx)
                    .unwrap_or_default();
                (
                    report.violations,
                    report.soft_penalty,
                    report.hard_violation_count,
                    breakdown,
                )
            }
            Err(error) => {
                tracing::warn!(%error, backend = backend_name, "backend produced malformed set");
                (Vec::new(), f64::INFINITY, usize::MAX, Default::default())
            }
        };

    let churn_distance = reference
        .map(|r| crate::solver::anti_churn::distance(r, &assignments))
        .unwrap_or(0);
    if let Some(reference_set) = reference {
        let cap_rule = MaxChurnPerPerson::new(reference_set.to_vec(), opts.max_churn_per_person);
        violations.extend(cap_rule.violates(&assignments, ctx));
    }

    let objective_value =
        soft_penalty + opts.weights.anti_churn_alpha * churn_distance as f64;

    let status = if cancelled {
        SolveStatus::Cancelled
    } else if hard_count > 0 {
        if timed_out {
            SolveStatus::Timeout
        } else {
            SolveStatus::Infeasible
        }
    } else if soft_penalty <= 1e-12 {
        SolveStatus::Optimal
    } else {
        SolveStatus::Feasible
    };

    SolverResult {
        assignments,
        backend_used: backend_name.to_string(),
        solve_time_ms: started.elapsed().as_millis() as u64,
        objective_value,
        soft_breakdown,
        status,
        violations,
    }
}
