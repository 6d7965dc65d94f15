use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::domain::errors::CoreError;

// Person roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Resident,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resident => "resident",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Postgraduate year of a resident. Faculty and admins carry no level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PgyLevel {
    Pgy1,
    Pgy2,
    Pgy3,
}

impl PgyLevel {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s {
            "pgy1" | "1" => Ok(Self::Pgy1),
            "pgy2" | "2" => Ok(Self::Pgy2),
            "pgy3" | "3" => Ok(Self::Pgy3),
            _ => Err(format!("Unknown PGY level: {}", s)),
        }
    }

    pub fn as_number(&self) -> u8 {
        match self {
            PgyLevel::Pgy1 => 1,
            PgyLevel::Pgy2 => 2,
            PgyLevel::Pgy3 => 3,
        }
    }
}

impl std::fmt::Display for PgyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pgy{}", self.as_number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonStatus {
    Active,
    Inactive,
}

/// A person loaned to the core for the duration of a scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub pgy_level: Option<PgyLevel>,
    pub status: PersonStatus,
    pub max_hours_per_week: f64,
    pub certifications: BTreeSet<String>,
    pub can_supervise: bool,
    pub backup_for: BTreeSet<Uuid>,
}

impl Person {
    pub fn is_active(&self) -> bool {
        self.status == PersonStatus::Active
    }

    pub fn is_pgy1(&self) -> bool {
        self.pgy_level == Some(PgyLevel::Pgy1)
    }
}

// Block periods: the atomic day slices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockPeriod {
    Am,
    Pm,
    Full,
    TwentyFourHour,
}

impl BlockPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockPeriod::Am => "am",
            BlockPeriod::Pm => "pm",
            BlockPeriod::Full => "full",
            BlockPeriod::TwentyFourHour => "24h",
        }
    }

    /// True when a block of this period spills into the following day.
    pub fn is_overnight(&self) -> bool {
        matches!(self, BlockPeriod::TwentyFourHour)
    }
}

impl std::fmt::Display for BlockPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Atomic time slot: one day-period pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub date: NaiveDate,
    pub period: BlockPeriod,
    pub length_hours: f64,
}

// Rotation activity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Inpatient,
    Outpatient,
    Clinic,
    NightFloat,
    Procedure,
    Call,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Inpatient => "inpatient",
            ActivityType::Outpatient => "outpatient",
            ActivityType::Clinic => "clinic",
            ActivityType::NightFloat => "night_float",
            ActivityType::Procedure => "procedure",
            ActivityType::Call => "call",
        }
    }
}

/// A rotation slot definition: who may fill it and how much coverage it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationTemplate {
    pub id: Uuid,
    pub name: String,
    pub activity_type: ActivityType,
    pub allowed_pgy: BTreeSet<PgyLevel>,
    pub required_certifications: BTreeSet<String>,
    pub min_coverage: u32,
    pub target_coverage: u32,
    pub max_coverage: u32,
    pub hours_per_block: f64,
    pub requires_supervision: bool,
}

impl RotationTemplate {
    /// Whether a person may be placed on this template at all.
    ///
    /// PGY gating applies to residents only; certification gating applies to
    /// everyone.
    pub fn admits(&self, person: &Person) -> bool {
        if !self.required_certifications.is_subset(&person.certifications) {
            return false;
        }
        match (person.role, person.pgy_level) {
            (Role::Resident, Some(level)) => self.allowed_pgy.contains(&level),
            (Role::Resident, None) => false,
            _ => true,
        }
    }
}

/// One person working one block on one template.
///
/// Keyed by `(person_id, block_id)`: at most one assignment per person per
/// block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub person_id: Uuid,
    pub block_id: Uuid,
    pub template_id: Uuid,
    pub hours: f64,
}

impl Assignment {
    pub fn key(&self) -> (Uuid, Uuid) {
        (self.person_id, self.block_id)
    }
}

// Absence kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceKind {
    Deployment,
    ExtendedLeave,
    Vacation,
    Conference,
    Sick,
    Parental,
}

impl AbsenceKind {
    /// Deployment and extended leave fully block scheduling; the rest only
    /// reduce capacity.
    pub fn fully_blocking(&self) -> bool {
        matches!(self, AbsenceKind::Deployment | AbsenceKind::ExtendedLeave)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Absence {
    pub person_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: AbsenceKind,
}

impl Absence {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A stated shift preference, scored by the soft constraint layer.
///
/// `avoid = true` penalizes matching assignments; `avoid = false` penalizes
/// assignments that do not match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftPreference {
    pub person_id: Uuid,
    pub template_id: Option<Uuid>,
    pub period: Option<BlockPeriod>,
    pub weight: f64,
    pub avoid: bool,
}

impl ShiftPreference {
    /// Whether an assignment on `period` of `template_id` matches this
    /// preference's selector.
    pub fn matches(&self, template_id: Uuid, period: BlockPeriod) -> bool {
        let template_ok = self.template_id.map_or(true, |t| t == template_id);
        let period_ok = self.period.map_or(true, |p| p == period);
        template_ok && period_ok
    }
}

// Constraint tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// ACGME regulatory rules. Must hold.
    Regulatory,
    /// Institutional policy. Override only with recorded approval.
    Institutional,
    /// Soft preference, weighted into the objective.
    Preference,
}

impl Tier {
    pub fn as_number(&self) -> u8 {
        match self {
            Tier::Regulatory => 1,
            Tier::Institutional => 2,
            Tier::Preference => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

/// Priority multiplier for soft constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn multiplier(&self) -> f64 {
        match self {
            Priority::Critical => 100.0,
            Priority::High => 75.0,
            Priority::Medium => 50.0,
            Priority::Low => 25.0,
        }
    }
}

/// A structured constraint violation.
///
/// `magnitude` scales the soft penalty contribution (1.0 for a plain
/// occurrence; coverage shortfalls and equity use fractional or multiple
/// units).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub constraint_name: String,
    pub tier: Tier,
    pub severity: Severity,
    pub people: BTreeSet<Uuid>,
    pub blocks: BTreeSet<Uuid>,
    pub message: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
}

fn default_magnitude() -> f64 {
    1.0
}

impl Violation {
    pub fn new(
        constraint_name: impl Into<String>,
        tier: Tier,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            tier,
            severity,
            people: BTreeSet::new(),
            blocks: BTreeSet::new(),
            message: message.into(),
            details: serde_json::Map::new(),
            magnitude: 1.0,
        }
    }

    pub fn with_person(mut self, person_id: Uuid) -> Self {
        self.people.insert(person_id);
        self
    }

    pub fn with_block(mut self, block_id: Uuid) -> Self {
        self.blocks.insert(block_id);
        self
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = magnitude;
        self
    }
}

// ============================================================================
// SCHEDULING CONTEXT
// ============================================================================

/// Read-only input to a solver run.
///
/// Owns indexed copies of the caller's people, blocks, templates, absences
/// and preferences. Blocks are kept sorted by `(date, period)`; all lookup
/// maps are built once at construction.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    residents: Vec<Person>,
    faculty: Vec<Person>,
    blocks: Vec<Block>,
    templates: Vec<RotationTemplate>,
    absences: Vec<Absence>,
    preferences: Vec<ShiftPreference>,
    person_index: HashMap<Uuid, Person>,
    block_index: HashMap<Uuid, Block>,
    template_index: HashMap<Uuid, RotationTemplate>,
    absences_by_person: HashMap<Uuid, Vec<Absence>>,
}

impl SchedulingContext {
    pub fn new(
        people: Vec<Person>,
        mut blocks: Vec<Block>,
        templates: Vec<RotationTemplate>,
        absences: Vec<Absence>,
        preferences: Vec<ShiftPreference>,
    ) -> Result<Self, CoreError> {
        blocks.sort_by(|a, b| (a.date, a.period).cmp(&(b.date, b.period)));

        let mut person_index = HashMap::new();
        for person in &people {
            if person.role == Role::Resident && person.pgy_level.is_none() {
                return Err(CoreError::Validation(format!(
                    "resident {} has no PGY level",
                    person.id
                )));
            }
            if person_index.insert(person.id, person.clone()).is_some() {
                return Err(CoreError::Validation(format!(
                    "duplicate person id {}",
                    person.id
                )));
            }
        }

        let mut block_index = HashMap::new();
        for block in &blocks {
            if block_index.insert(block.id, block.clone()).is_some() {
                return Err(CoreError::Validation(format!(
                    "duplicate block id {}",
                    block.id
                )));
            }
        }

        let mut template_index = HashMap::new();
        for template in &templates {
            if template.min_coverage > template.max_coverage {
                return Err(CoreError::Validation(format!(
                    "template {} has min_coverage > max_coverage",
                    template.name
                )));
            }
            if template_index
                .insert(template.id, template.clone())
                .is_some()
            {
                return Err(CoreError::Validation(format!(
                    "duplicate template id {}",
                    template.id
                )));
            }
        }

        let mut absences_by_person: HashMap<Uuid, Vec<Absence>> = HashMap::new();
        for absence in &absences {
            if !person_index.contains_key(&absence.person_id) {
                return Err(CoreError::Validation(format!(
                    "absence references unknown person {}",
                    absence.person_id
                )));
            }
            absences_by_person
                .entry(absence.person_id)
                .or_default()
                .push(absence.clone());
        }

        let (residents, faculty): (Vec<Person>, Vec<Person>) = people
            .into_iter()
            .filter(|p| p.role != Role::Admin)
            .partition(|p| p.role == Role::Resident);

        Ok(Self {
            residents,
            faculty,
            blocks,
            templates,
            absences,
            preferences,
            person_index,
            block_index,
            template_index,
            absences_by_person,
        })
    }

    pub fn residents(&self) -> &[Person] {
        &self.residents
    }

    pub fn faculty(&self) -> &[Person] {
        &self.faculty
    }

    /// Blocks ordered by `(date, period)`.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn templates(&self) -> &[RotationTemplate] {
        &self.templates
    }

    pub fn absences(&self) -> &[Absence] {
        &self.absences
    }

    pub fn preferences(&self) -> &[ShiftPreference] {
        &self.preferences
    }

    pub fn person(&self, id: Uuid) -> Option<&Person> {
        self.person_index.get(&id)
    }

    pub fn block(&self, id: Uuid) -> Option<&Block> {
        self.block_index.get(&id)
    }

    pub fn template(&self, id: Uuid) -> Option<&RotationTemplate> {
        self.template_index.get(&id)
    }

    pub fn preferences_for(&self, person_id: Uuid) -> impl Iterator<Item = &ShiftPreference> {
        self.preferences
            .iter()
            .filter(move |p| p.person_id == person_id)
    }

    /// True when the person is under a fully blocking absence on `date`.
    pub fn is_fully_absent(&self, person_id: Uuid, date: NaiveDate) -> bool {
        self.absences_by_person
            .get(&person_id)
            .map(|list| {
                list.iter()
                    .any(|a| a.kind.fully_blocking() && a.covers(date))
            })
            .unwrap_or(false)
    }

    /// True when any absence (blocking or capacity-reducing) covers `date`.
    pub fn is_absent(&self, person_id: Uuid, date: NaiveDate) -> bool {
        self.absences_by_person
            .get(&person_id)
            .map(|list| list.iter().any(|a| a.covers(date)))
            .unwrap_or(false)
    }

    /// Problem-size estimate used for solver backend selection.
    pub fn complexity(&self) -> f64 {
        let numerator =
            self.residents.len() as f64 * self.blocks.len() as f64 * self.templates.len() as f64;
        numerator / (1000.0 + self.absences.len() as f64)
    }

    /// Reject assignment sets that reference unknown people, blocks or
    /// templates, or that double-book a `(person, block)` key.
    pub fn validate_assignments(&self, assignments: &[Assignment]) -> Result<(), CoreError> {
        let mut seen: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
        for assignment in assignments {
            if !self.person_index.contains_key(&assignment.person_id) {
                return Err(CoreError::Validation(format!(
                    "assignment references unknown person {}",
                    assignment.person_id
                )));
            }
            if !self.block_index.contains_key(&assignment.block_id) {
                return Err(CoreError::Validation(format!(
                    "assignment references unknown block {}",
                    assignment.block_id
                )));
            }
            if !self.template_index.contains_key(&assignment.template_id) {
                return Err(CoreError::Validation(format!(
                    "assignment references unknown template {}",
                    assignment.template_id
                )));
            }
            if !seen.insert(assignment.key()) {
                return Err(CoreError::Validation(format!(
                    "duplicate assignment for person {} on block {}",
                    assignment.person_id, assignment.block_id
                )));
            }
        }
        Ok(())
    }

    /// Per-person total assigned hours, keyed by person id.
    pub fn hours_by_person(&self, assignments: &[Assignment]) -> BTreeMap<Uuid, f64> {
        let mut hours: BTreeMap<Uuid, f64> = BTreeMap::new();
        for assignment in assignments {
            *hours.entry(assignment.person_id).or_insert(0.0) += assignment.hours;
        }
        hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: u128, role: Role, pgy: Option<PgyLevel>) -> Person {
        Person {
            id: Uuid::from_u128(id),
            name: format!("person-{}", id),
            role,
            pgy_level: pgy,
            status: PersonStatus::Active,
            max_hours_per_week: 80.0,
            certifications: BTreeSet::new(),
            can_supervise: role == Role::Faculty,
            backup_for: BTreeSet::new(),
        }
    }

    fn block(id: u128, date: NaiveDate, period: BlockPeriod) -> Block {
        Block {
            id: Uuid::from_u128(id),
            date,
            period,
            length_hours: 12.0,
        }
    }

    fn template(id: u128) -> RotationTemplate {
        RotationTemplate {
            id: Uuid::from_u128(id),
            name: format!("template-{}", id),
            activity_type: ActivityType::Inpatient,
            allowed_pgy: [PgyLevel::Pgy1, PgyLevel::Pgy2, PgyLevel::Pgy3]
                .into_iter()
                .collect(),
            required_certifications: BTreeSet::new(),
            min_coverage: 1,
            target_coverage: 2,
            max_coverage: 4,
            hours_per_block: 12.0,
            requires_supervision: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_context_sorts_blocks_by_date_and_period() {
        let blocks = vec![
            block(2, date(2025, 3, 2), BlockPeriod::Am),
            block(1, date(2025, 3, 1), BlockPeriod::Pm),
            block(3, date(2025, 3, 1), BlockPeriod::Am),
        ];
        let ctx = SchedulingContext::new(
            vec![person(10, Role::Resident, Some(PgyLevel::Pgy1))],
            blocks,
            vec![template(100)],
            vec![],
            vec![],
        )
        .unwrap();

        let dates: Vec<(NaiveDate, BlockPeriod)> =
            ctx.blocks().iter().map(|b| (b.date, b.period)).collect();
        assert_eq!(
            dates,
            vec![
                (date(2025, 3, 1), BlockPeriod::Am),
                (date(2025, 3, 1), BlockPeriod::Pm),
                (date(2025, 3, 2), BlockPeriod::Am),
            ]
        );
    }

    #[test]
    fn test_context_rejects_resident_without_pgy() {
        let result = SchedulingContext::new(
            vec![person(10, Role::Resident, None)],
            vec![block(1, date(2025, 3, 1), BlockPeriod::Am)],
            vec![template(100)],
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_context_rejects_duplicate_person() {
        let result = SchedulingContext::new(
            vec![
                person(10, Role::Resident, Some(PgyLevel::Pgy1)),
                person(10, Role::Resident, Some(PgyLevel::Pgy2)),
            ],
            vec![block(1, date(2025, 3, 1), BlockPeriod::Am)],
            vec![template(100)],
            vec![],
            vec![],
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_fully_absent_only_for_blocking_kinds() {
        let pid = Uuid::from_u128(10);
        let ctx = SchedulingContext::new(
            vec![person(10, Role::Resident, Some(PgyLevel::Pgy2))],
            vec![block(1, date(2025, 3, 1), BlockPeriod::Am)],
            vec![template(100)],
            vec![
                Absence {
                    person_id: pid,
                    start_date: date(2025, 3, 1),
                    end_date: date(2025, 3, 5),
                    kind: AbsenceKind::Vacation,
                },
                Absence {
                    person_id: pid,
                    start_date: date(2025, 4, 1),
                    end_date: date(2025, 4, 30),
                    kind: AbsenceKind::Deployment,
                },
            ],
            vec![],
        )
        .unwrap();

        assert!(!ctx.is_fully_absent(pid, date(2025, 3, 2)));
        assert!(ctx.is_absent(pid, date(2025, 3, 2)));
        assert!(ctx.is_fully_absent(pid, date(2025, 4, 15)));
        assert!(!ctx.is_fully_absent(pid, date(2025, 5, 1)));
    }

    #[test]
    fn test_validate_assignments_rejects_unknown_block() {
        let ctx = SchedulingContext::new(
            vec![person(10, Role::Resident, Some(PgyLevel::Pgy1))],
            vec![block(1, date(2025, 3, 1), BlockPeriod::Am)],
            vec![template(100)],
            vec![],
            vec![],
        )
        .unwrap();

        let result = ctx.validate_assignments(&[Assignment {
            person_id: Uuid::from_u128(10),
            block_id: Uuid::from_u128(999),
            template_id: Uuid::from_u128(100),
            hours: 12.0,
        }]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_validate_assignments_rejects_double_booking() {
        let ctx = SchedulingContext::new(
            vec![person(10, Role::Resident, Some(PgyLevel::Pgy1))],
            vec![block(1, date(2025, 3, 1), BlockPeriod::Am)],
            vec![template(100), template(101)],
            vec![],
            vec![],
        )
        .unwrap();

        let make = |template: u128| Assignment {
            person_id: Uuid::from_u128(10),
            block_id: Uuid::from_u128(1),
            template_id: Uuid::from_u128(template),
            hours: 12.0,
        };
        let result = ctx.validate_assignments(&[make(100), make(101)]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_template_admits_checks_pgy_and_certifications() {
        let mut tpl = template(100);
        tpl.allowed_pgy = [PgyLevel::Pgy2, PgyLevel::Pgy3].into_iter().collect();
        tpl.required_certifications = ["acls".to_string()].into_iter().collect();

        let mut pgy2 = person(10, Role::Resident, Some(PgyLevel::Pgy2));
        assert!(!tpl.admits(&pgy2)); // missing certification
        pgy2.certifications.insert("acls".to_string());
        assert!(tpl.admits(&pgy2));

        let mut pgy1 = person(11, Role::Resident, Some(PgyLevel::Pgy1));
        pgy1.certifications.insert("acls".to_string());
        assert!(!tpl.admits(&pgy1)); // PGY-1 not allowed

        let mut fac = person(12, Role::Faculty, None);
        fac.certifications.insert("acls".to_string());
        assert!(tpl.admits(&fac)); // PGY gate does not apply to faculty
    }

    #[test]
    fn test_preference_matching() {
        let tpl = Uuid::from_u128(100);
        let pref = ShiftPreference {
            person_id: Uuid::from_u128(10),
            template_id: Some(tpl),
            period: Some(BlockPeriod::Am),
            weight: 1.0,
            avoid: false,
        };

        assert!(pref.matches(tpl, BlockPeriod::Am));
        assert!(!pref.matches(tpl, BlockPeriod::Pm));
        assert!(!pref.matches(Uuid::from_u128(101), BlockPeriod::Am));
    }

    #[test]
    fn test_complexity_formula() {
        // 2 residents x 3 blocks x 1 template / (1000 + 0 absences)
        let ctx = SchedulingContext::new(
            vec![
                person(10, Role::Resident, Some(PgyLevel::Pgy1)),
                person(11, Role::Resident, Some(PgyLevel::Pgy2)),
                person(12, Role::Faculty, None),
            ],
            vec![
                block(1, date(2025, 3, 1), BlockPeriod::Am),
                block(2, date(2025, 3, 1), BlockPeriod::Pm),
                block(3, date(2025, 3, 2), BlockPeriod::Am),
            ],
            vec![template(100)],
            vec![],
            vec![],
        )
        .unwrap();

        assert!((ctx.complexity() - 6.0 / 1000.0).abs() < 1e-9);
    }
}
