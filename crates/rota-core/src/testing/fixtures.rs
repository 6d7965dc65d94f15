//! Reusable scheduling fixtures.
//!
//! Deterministic ids throughout (`Uuid::from_u128` with namespaced
//! offsets) so test failures reproduce exactly. The standard context is a
//! small residency program: AM/PM blocks each day, a 24h call block on day
//! zero, and a five-template rotation mix.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use uuid::Uuid;

use crate::constraints::ConstraintEngine;
use crate::domain::{
    Absence, AbsenceKind, ActivityType, Assignment, Block, BlockPeriod, Person, PersonStatus,
    PgyLevel, Role, RotationTemplate, SchedulingContext, ShiftPreference,
};
use crate::solver::greedy::GreedyBackend;
use crate::solver::{SolveOptions, SolverBackend};

/// AM + PM; the day-zero call block is extra.
pub const BLOCKS_PER_DAY: usize = 2;

const RESIDENT_ID_BASE: u128 = 0x1000;
const FACULTY_ID_BASE: u128 = 0x2000;
const BLOCK_ID_BASE: u128 = 0x3000;
const TEMPLATE_ID_BASE: u128 = 0x4000;

/// Fixture start date: Monday 2025-03-03.
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Inpatient,
    Clinic,
    NightFloat,
    Procedure,
    Call,
}

/// A `SchedulingContext` plus fixture-side lookup helpers.
pub struct TestContext {
    inner: SchedulingContext,
    templates_by_kind: BTreeMap<u8, Uuid>,
    overnight_blocks: Vec<Uuid>,
    raw_people: Vec<Person>,
    raw_blocks: Vec<Block>,
    raw_templates: Vec<RotationTemplate>,
    raw_absences: Vec<Absence>,
    raw_preferences: Vec<ShiftPreference>,
}

impl Deref for TestContext {
    type Target = SchedulingContext;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl TestContext {
    pub fn inner(&self) -> &SchedulingContext {
        &self.inner
    }

    pub fn template_of(&self, kind: TemplateKind) -> &RotationTemplate {
        let id = self.templates_by_kind[&(kind as u8)];
        self.inner.template(id).expect("fixture template exists")
    }

    /// The 24h call block for a given day index, if the fixture has one.
    pub fn overnight_block(&self, day_idx: usize) -> Option<&Block> {
        self.overnight_blocks
            .get(day_idx)
            .and_then(|id| self.inner.block(*id))
    }

    /// Rebuild with a deployment absence covering fixture days
    /// `[start_day, end_day]` for the given resident.
    pub fn with_deployment(self, resident_idx: usize, start_day: i64, end_day: i64) -> Self {
        let person_id = self.inner.residents()[resident_idx].id;
        let mut absences = self.raw_absences.clone();
        absences.push(Absence {
            person_id,
            start_date: start_date() + chrono::Duration::days(start_day),
            end_date: start_date() + chrono::Duration::days(end_day),
            kind: AbsenceKind::Deployment,
        });
        rebuild(
            self.raw_people.clone(),
            self.raw_blocks.clone(),
            self.raw_templates.clone(),
            absences,
            self.raw_preferences.clone(),
        )
    }

    /// Rebuild with the given preferences.
    pub fn with_preferences(self, preferences: Vec<ShiftPreference>) -> Self {
        rebuild(
            self.raw_people.clone(),
            self.raw_blocks.clone(),
            self.raw_templates.clone(),
            self.raw_absences.clone(),
            preferences,
        )
    }
}

/// Remove every faculty member; supervision then has nobody to lean on.
pub fn without_faculty(ctx: TestContext) -> TestContext {
    let people: Vec<Person> = ctx
        .raw_people
        .iter()
        .filter(|p| p.role != Role::Faculty)
        .cloned()
        .collect();
    rebuild(
        people,
        ctx.raw_blocks.clone(),
        ctx.raw_templates.clone(),
        ctx.raw_absences.clone(),
        ctx.raw_preferences.clone(),
    )
}

fn rebuild(
    people: Vec<Person>,
    blocks: Vec<Block>,
    templates: Vec<RotationTemplate>,
    absences: Vec<Absence>,
    preferences: Vec<ShiftPreference>,
) -> TestContext {
    let inner = SchedulingContext::new(
        people.clone(),
        blocks.clone(),
        templates.clone(),
        absences.clone(),
        preferences.clone(),
    )
    .expect("fixture context is valid");

    let mut templates_by_kind = BTreeMap::new();
    for template in &templates {
        let kind = match template.activity_type {
            ActivityType::Inpatient => TemplateKind::Inpatient,
            ActivityType::Clinic => TemplateKind::Clinic,
            ActivityType::NightFloat => TemplateKind::NightFloat,
            ActivityType::Procedure => TemplateKind::Procedure,
            ActivityType::Call => TemplateKind::Call,
            ActivityType::Outpatient => TemplateKind::Clinic,
        };
        templates_by_kind.entry(kind as u8).or_insert(template.id);
    }

    let mut overnight_blocks: Vec<Uuid> = Vec::new();
    let mut by_date: BTreeMap<NaiveDate, Uuid> = BTreeMap::new();
    for block in &blocks {
        if block.period == BlockPeriod::TwentyFourHour {
            by_date.insert(block.date, block.id);
        }
    }
    for (_, id) in by_date {
        overnight_blocks.push(id);
    }

    TestContext {
        inner,
        templates_by_kind,
        overnight_blocks,
        raw_people: people,
        raw_blocks: blocks,
        raw_templates: templates,
        raw_absences: absences,
        raw_preferences: preferences,
    }
}

fn resident(index: usize) -> Person {
    let pgy = match index % 3 {
        0 => PgyLevel::Pgy1,
        1 => PgyLevel::Pgy2,
        _ => PgyLevel::Pgy3,
    };
    Person {
        id: Uuid::from_u128(RESIDENT_ID_BASE + index as u128),
        name: format!("resident-{}", index),
        role: Role::Resident,
        pgy_level: Some(pgy),
        status: PersonStatus::Active,
        max_hours_per_week: 80.0,
        certifications: ["acls".to_string()].into_iter().collect(),
        can_supervise: false,
        backup_for: BTreeSet::new(),
    }
}

fn faculty(index: usize) -> Person {
    Person {
        id: Uuid::from_u128(FACULTY_ID_BASE + index as u128),
        name: format!("faculty-{}", index),
        role: Role::Faculty,
        pgy_level: None,
        status: PersonStatus::Active,
        max_hours_per_week: 60.0,
        certifications: ["acls".to_string()].into_iter().collect(),
        can_supervise: true,
        backup_for: BTreeSet::new(),
    }
}

fn block(index: u128, date: NaiveDate, period: BlockPeriod, length_hours: f64) -> Block {
    Block {
        id: Uuid::from_u128(BLOCK_ID_BASE + index),
        date,
        period,
        length_hours,
    }
}

fn standard_templates() -> Vec<RotationTemplate> {
    let all_pgy: BTreeSet<PgyLevel> =
        [PgyLevel::Pgy1, PgyLevel::Pgy2, PgyLevel::Pgy3].into_iter().collect();
    let senior_pgy: BTreeSet<PgyLevel> = [PgyLevel::Pgy2, PgyLevel::Pgy3].into_iter().collect();
    let acls: BTreeSet<String> = ["acls".to_string()].into_iter().collect();

    vec![
        RotationTemplate {
            id: Uuid::from_u128(TEMPLATE_ID_BASE),
            name: "inpatient_wards".to_string(),
            activity_type: ActivityType::Inpatient,
            allowed_pgy: all_pgy.clone(),
            required_certifications: acls.clone(),
            min_coverage: 0,
            target_coverage: 2,
            max_coverage: 6,
            hours_per_block: 6.0,
            requires_supervision: false,
        },
        RotationTemplate {
            id: Uuid::from_u128(TEMPLATE_ID_BASE + 1),
            name: "resident_clinic".to_string(),
            activity_type: ActivityType::Clinic,
            allowed_pgy: all_pgy,
            required_certifications: acls.clone(),
            min_coverage: 1,
            target_coverage: 2,
            max_coverage: 4,
            hours_per_block: 6.0,
            requires_supervision: true,
        },
        RotationTemplate {
            id: Uuid::from_u128(TEMPLATE_ID_BASE + 2),
            name: "night_float".to_string(),
            activity_type: ActivityType::NightFloat,
            allowed_pgy: senior_pgy.clone(),
            required_certifications: acls.clone(),
            min_coverage: 0,
            target_coverage: 1,
            max_coverage: 1,
            hours_per_block: 6.0,
            requires_supervision: false,
        },
        RotationTemplate {
            id: Uuid::from_u128(TEMPLATE_ID_BASE + 3),
            name: "procedure_service".to_string(),
            activity_type: ActivityType::Procedure,
            allowed_pgy: senior_pgy,
            required_certifications: acls.clone(),
            min_coverage: 0,
            target_coverage: 1,
            max_coverage: 2,
            hours_per_block: 6.0,
            requires_supervision: false,
        },
        RotationTemplate {
            id: Uuid::from_u128(TEMPLATE_ID_BASE + 4),
            name: "overnight_call".to_string(),
            activity_type: ActivityType::Call,
            allowed_pgy: [PgyLevel::Pgy2, PgyLevel::Pgy3].into_iter().collect(),
            required_certifications: acls,
            min_coverage: 0,
            target_coverage: 0,
            max_coverage: 2,
            hours_per_block: 24.0,
            requires_supervision: false,
        },
    ]
}

/// Minimal context: AM/PM blocks, one unsupervised template, one faculty.
pub fn small_context(n_residents: usize, n_days: usize) -> TestContext {
    let mut people: Vec<Person> = (0..n_residents).map(resident).collect();
    people.push(faculty(0));

    let mut blocks = Vec::new();
    for day in 0..n_days {
        let date = start_date() + chrono::Duration::days(day as i64);
        blocks.push(block((day * 2) as u128, date, BlockPeriod::Am, 6.0));
        blocks.push(block((day * 2 + 1) as u128, date, BlockPeriod::Pm, 6.0));
    }

    let templates = vec![standard_templates().swap_remove(0)];
    rebuild(people, blocks, templates, vec![], vec![])
}

/// The full fixture program: mixed-PGY residents, supervising faculty,
/// AM/PM blocks every day plus a 24h call block on day zero, and five
/// rotation templates.
pub fn standard_context(n_residents: usize, n_days: usize) -> TestContext {
    let mut people: Vec<Person> = (0..n_residents).map(resident).collect();
    let n_faculty = (n_residents / 2).max(2);
    for i in 0..n_faculty {
        people.push(faculty(i));
    }

    let mut blocks = Vec::new();
    for day in 0..n_days {
        let date = start_date() + chrono::Duration::days(day as i64);
        blocks.push(block((day * 3) as u128, date, BlockPeriod::Am, 6.0));
        blocks.push(block((day * 3 + 1) as u128, date, BlockPeriod::Pm, 6.0));
        if day == 0 {
            blocks.push(block(
                (day * 3 + 2) as u128,
                date,
                BlockPeriod::TwentyFourHour,
                24.0,
            ));
        }
    }

    rebuild(people, blocks, standard_templates(), vec![], vec![])
}

/// Blocks grouped by date, each day sorted by period.
pub fn daily_blocks(ctx: &SchedulingContext) -> Vec<Vec<Block>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<Block>> = BTreeMap::new();
    for block in ctx.blocks() {
        grouped.entry(block.date).or_default().push(block.clone());
    }
    grouped.into_values().collect()
}

/// A regulation-clean assignment set for the fixture, built by the greedy
/// backend.
pub fn feasible_assignments(ctx: &TestContext) -> Vec<Assignment> {
    let engine = ConstraintEngine::with_defaults();
    let result = GreedyBackend.solve(ctx.inner(), &SolveOptions::default(), None, &engine);
    assert!(
        result.violations.iter().all(|v| v.tier != crate::domain::Tier::Regulatory),
        "fixture solve must be tier-1 clean"
    );
    result.assignments
}

/// Drop up to `n` resident assignments (never faculty, so supervision
/// stays intact), preferring the latest keys.
pub fn remove_resident_assignments(
    ctx: &TestContext,
    assignments: Vec<Assignment>,
    n: usize,
) -> Vec<Assignment> {
    let resident_ids: BTreeSet<Uuid> = ctx.residents().iter().map(|r| r.id).collect();
    let mut to_drop: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
    for assignment in assignments.iter().rev() {
        if to_drop.len() >= n {
            break;
        }
        if resident_ids.contains(&assignment.person_id) {
            to_drop.insert(assignment.key());
        }
    }
    assert_eq!(to_drop.len(), n, "fixture has too few resident assignments");
    assignments
        .into_iter()
        .filter(|a| !to_drop.contains(&a.key()))
        .collect()
}
