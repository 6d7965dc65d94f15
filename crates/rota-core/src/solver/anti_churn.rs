//! Hamming-style schedule distance and churn impact estimation.
//!
//! Distance counts `(person, block)` pairs whose assigned template differs
//! between two schedules, or that are present in one and absent in the
//! other. Rigidity is the complement normalized by the largest possible
//! change count.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::domain::Assignment;

/// Rigidity bands for impact classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactSeverity {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl ImpactSeverity {
    pub fn from_rigidity(rigidity: f64) -> Self {
        if rigidity >= 0.95 {
            ImpactSeverity::Minimal
        } else if rigidity >= 0.85 {
            ImpactSeverity::Low
        } else if rigidity >= 0.70 {
            ImpactSeverity::Moderate
        } else if rigidity >= 0.50 {
            ImpactSeverity::High
        } else {
            ImpactSeverity::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub severity: ImpactSeverity,
    pub affected_people_count: usize,
    pub change_count: usize,
    pub recommendation: String,
}

fn template_by_key(assignments: &[Assignment]) -> BTreeMap<(Uuid, Uuid), Uuid> {
    assignments
        .iter()
        .map(|a| (a.key(), a.template_id))
        .collect()
}

/// Changed `(person, block)` pairs per person.
pub fn per_person_changes(a: &[Assignment], b: &[Assignment]) -> BTreeMap<Uuid, usize> {
    let map_a = template_by_key(a);
    let map_b = template_by_key(b);

    let keys: BTreeSet<(Uuid, Uuid)> = map_a.keys().chain(map_b.keys()).copied().collect();
    let mut changes: BTreeMap<Uuid, usize> = BTreeMap::new();
    for key in keys {
        if map_a.get(&key) != map_b.get(&key) {
            *changes.entry(key.0).or_insert(0) += 1;
        }
    }
    changes
}

/// Hamming-style distance between two assignment sets.
pub fn distance(a: &[Assignment], b: &[Assignment]) -> usize {
    per_person_changes(a, b).values().sum()
}

/// Largest possible distance: the number of distinct `(person, block)` keys
/// across both schedules.
pub fn max_possible_changes(a: &[Assignment], b: &[Assignment]) -> usize {
    let keys: BTreeSet<(Uuid, Uuid)> = a
        .iter()
        .map(Assignment::key)
        .chain(b.iter().map(Assignment::key))
        .collect();
    keys.len()
}

/// `1 - distance / max_possible_changes`; 1.0 when the schedules agree.
pub fn rigidity(a: &[Assignment], b: &[Assignment]) -> f64 {
    let max_changes = max_possible_changes(a, b);
    if max_changes == 0 {
        return 1.0;
    }
    1.0 - distance(a, b) as f64 / max_changes as f64
}

/// Classify the churn between a reference and a candidate schedule.
pub fn estimate_impact(a: &[Assignment], b: &[Assignment]) -> ImpactEstimate {
    let change_count = distance(a, b);
    let affected_people_count = per_person_changes(a, b).len();
    let severity = ImpactSeverity::from_rigidity(rigidity(a, b));
    let recommendation = match severity {
        ImpactSeverity::Minimal | ImpactSeverity::Low => {
            "safe to publish; notify affected people".to_string()
        }
        ImpactSeverity::Moderate => {
            "review the changed assignments before publishing".to_string()
        }
        ImpactSeverity::High | ImpactSeverity::Critical => {
            "stage behind a draft and raise the anti-churn weight before regenerating".to_string()
        }
    };
    ImpactEstimate {
        severity,
        affected_people_count,
        change_count,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assignment(person: u128, block: u128, template: u128) -> Assignment {
        Assignment {
            person_id: Uuid::from_u128(person),
            block_id: Uuid::from_u128(block),
            template_id: Uuid::from_u128(template),
            hours: 6.0,
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let set = vec![assignment(1, 1, 10), assignment(2, 1, 10)];
        assert_eq!(distance(&set, &set), 0);
        assert!((rigidity(&set, &set) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_counts_template_change() {
        let a = vec![assignment(1, 1, 10)];
        let b = vec![assignment(1, 1, 11)];
        assert_eq!(distance(&a, &b), 1);
    }

    #[test]
    fn test_distance_counts_presence_difference() {
        let a = vec![assignment(1, 1, 10), assignment(2, 1, 10)];
        let b = vec![assignment(1, 1, 10)];
        assert_eq!(distance(&a, &b), 1);
        // person 2 lost a block, person 1 untouched
        let changes = per_person_changes(&a, &b);
        assert_eq!(changes.get(&Uuid::from_u128(2)), Some(&1));
        assert_eq!(changes.get(&Uuid::from_u128(1)), None);
    }

    #[test]
    fn test_distance_ignores_hours() {
        let mut b = vec![assignment(1, 1, 10)];
        b[0].hours = 12.0;
        let a = vec![assignment(1, 1, 10)];
        assert_eq!(distance(&a, &b), 0);
    }

    #[test]
    fn test_rigidity_of_disjoint_sets_is_zero() {
        let a = vec![assignment(1, 1, 10)];
        let b = vec![assignment(2, 2, 10)];
        assert!((rigidity(&a, &b) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_rigidity_empty_sets() {
        assert!((rigidity(&[], &[]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(ImpactSeverity::from_rigidity(0.97), ImpactSeverity::Minimal);
        assert_eq!(ImpactSeverity::from_rigidity(0.90), ImpactSeverity::Low);
        assert_eq!(ImpactSeverity::from_rigidity(0.75), ImpactSeverity::Moderate);
        assert_eq!(ImpactSeverity::from_rigidity(0.60), ImpactSeverity::High);
        assert_eq!(ImpactSeverity::from_rigidity(0.20), ImpactSeverity::Critical);
    }

    #[test]
    fn test_estimate_impact_counts_people() {
        let a = vec![
            assignment(1, 1, 10),
            assignment(1, 2, 10),
            assignment(2, 1, 10),
            assignment(3, 1, 10),
        ];
        let mut b = a.clone();
        b[0].template_id = Uuid::from_u128(11); // person 1 changed
        b.remove(2); // person 2 dropped a block

        let impact = estimate_impact(&a, &b);
        assert_eq!(impact.change_count, 2);
        assert_eq!(impact.affected_people_count, 2);
        assert_eq!(impact.severity, ImpactSeverity::High);
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            seed_a in proptest::collection::vec((0u128..6, 0u128..6, 0u128..3), 0..12),
            seed_b in proptest::collection::vec((0u128..6, 0u128..6, 0u128..3), 0..12),
        ) {
            // Deduplicate keys so both sides are valid assignment sets
            let dedup = |seed: Vec<(u128, u128, u128)>| {
                let mut seen = std::collections::BTreeSet::new();
                seed.into_iter()
                    .filter(|(p, b, _)| seen.insert((*p, *b)))
                    .map(|(p, b, t)| assignment(p, b, t))
                    .collect::<Vec<_>>()
            };
            let a = dedup(seed_a);
            let b = dedup(seed_b);

            prop_assert_eq!(distance(&a, &b), distance(&b, &a));
            prop_assert_eq!(distance(&a, &a), 0);

            let r = rigidity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&r));
            if r > 1.0 - 1e-12 {
                prop_assert_eq!(distance(&a, &b), 0);
            }
        }
    }
}
