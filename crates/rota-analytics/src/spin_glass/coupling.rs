//! Signed constraint couplings and the frustration index.
//!
//! Each constraint carries a load direction: coverage rules push staffing
//! up (+1), regulatory caps push it down (-1), alignment rules are neutral
//! (0). Two constraints with opposite directions and overlapping scope
//! form a frustrated pair. The index composes pair frustrations as
//! `1 - prod(1 - f_ij / 2)`, so adding a constraint can never lower it and
//! a single fully frustrated pair lands at 0.5 rather than saturating.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Scope and load direction of one constraint for coupling purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintProfile {
    pub name: String,
    pub weight: f64,
    /// +1 demands more staffing, -1 restricts it, 0 neutral
    pub direction: f64,
    /// Affected people; empty means everyone
    pub people: BTreeSet<Uuid>,
    /// Affected blocks; empty means every block
    pub blocks: BTreeSet<Uuid>,
}

impl ConstraintProfile {
    pub fn new(name: impl Into<String>, direction: f64) -> Self {
        Self {
            name: name.into(),
            weight: 1.0,
            direction: direction.clamp(-1.0, 1.0),
            people: BTreeSet::new(),
            blocks: BTreeSet::new(),
        }
    }

    pub fn with_people(mut self, people: BTreeSet<Uuid>) -> Self {
        self.people = people;
        self
    }

    pub fn with_blocks(mut self, blocks: BTreeSet<Uuid>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// Load direction for the built-in catalog names; unknown names are
/// neutral.
pub fn builtin_direction(name: &str) -> f64 {
    match name {
        "CoverageMin" | "CoverageTarget" => 1.0,
        "WorkHour80" | "OneInSeven" | "DutyPeriodLimit" | "NightFloatLimit"
        | "AbsenceBlocking" | "SupervisionRatio" | "Qualification" => -1.0,
        _ => 0.0,
    }
}

/// Profiles for a list of catalog names, all with global scope.
pub fn profiles_for(names: &[&str]) -> Vec<ConstraintProfile> {
    names
        .iter()
        .map(|name| ConstraintProfile::new(*name, builtin_direction(name)))
        .collect()
}

fn scope_overlap(a: &BTreeSet<Uuid>, b: &BTreeSet<Uuid>) -> f64 {
    // Empty scope is global and overlaps everything
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let smaller = a.len().min(b.len());
    let shared = a.intersection(b).count();
    shared as f64 / smaller as f64
}

/// Frustration degree of one constraint pair, in `[0, 1]`.
pub fn pair_frustration(a: &ConstraintProfile, b: &ConstraintProfile) -> f64 {
    let opposition = (-(a.direction * b.direction)).max(0.0);
    if opposition <= 0.0 {
        return 0.0;
    }
    let overlap = scope_overlap(&a.people, &b.people).max(scope_overlap(&a.blocks, &b.blocks));
    opposition * overlap
}

/// Signed coupling matrix: `J[i][j] > 0` aligned, `< 0` frustrated.
pub fn coupling_matrix(profiles: &[ConstraintProfile]) -> Vec<Vec<f64>> {
    let n = profiles.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let overlap = scope_overlap(&profiles[i].people, &profiles[j].people)
                .max(scope_overlap(&profiles[i].blocks, &profiles[j].blocks));
            matrix[i][j] = profiles[i].direction * profiles[j].direction * overlap;
        }
    }
    matrix
}

/// Saturating frustration mass: `1 - prod(1 - f_ij / 2)` over all pairs.
/// Monotone under constraint addition and confined to `[0, 1]`.
pub fn frustration_index(profiles: &[ConstraintProfile]) -> f64 {
    let mut satisfiable_mass = 1.0;
    for i in 0..profiles.len() {
        for j in (i + 1)..profiles.len() {
            let f = pair_frustration(&profiles[i], &profiles[j]);
            satisfiable_mass *= 1.0 - f.clamp(0.0, 1.0) * 0.5;
        }
    }
    1.0 - satisfiable_mass
}

/// A connected component of mutually frustrated constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrustrationCluster {
    pub constraints: Vec<String>,
    pub frustration_index: f64,
    pub affected_persons: BTreeSet<Uuid>,
    pub affected_blocks: BTreeSet<Uuid>,
    pub conflict_type: String,
    pub resolution_suggestions: Vec<String>,
}

/// Group constraints whose pairwise frustration exceeds `threshold` into
/// connected components. Singleton components are dropped.
pub fn frustration_clusters(
    profiles: &[ConstraintProfile],
    threshold: f64,
) -> Vec<FrustrationCluster> {
    let n = profiles.len();
    let mut visited = vec![false; n];
    let mut clusters = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut stack = vec![start];
        let mut members = Vec::new();
        visited[start] = true;
        while let Some(node) = stack.pop() {
            members.push(node);
            for other in 0..n {
                if !visited[other]
                    && pair_frustration(&profiles[node], &profiles[other]) > threshold
                {
                    visited[other] = true;
                    stack.push(other);
                }
            }
        }
        if members.len() < 2 {
            continue;
        }
        members.sort_unstable();
        let member_profiles: Vec<ConstraintProfile> =
            members.iter().map(|&i| profiles[i].clone()).collect();

        let mut affected_persons = BTreeSet::new();
        let mut affected_blocks = BTreeSet::new();
        let mut has_up = false;
        let mut has_down = false;
        for profile in &member_profiles {
            affected_persons.extend(profile.people.iter().copied());
            affected_blocks.extend(profile.blocks.iter().copied());
            has_up |= profile.direction > 0.0;
            has_down |= profile.direction < 0.0;
        }
        let conflict_type = if has_up && has_down {
            "capacity_vs_coverage".to_string()
        } else {
            "scope_contention".to_string()
        };
        let mut resolution_suggestions = vec![format!(
            "review the {} constraints in this cluster together",
            member_profiles.len()
        )];
        if has_up && has_down {
            resolution_suggestions.push(
                "raise staffing capacity or lower coverage targets in the shared scope"
                    .to_string(),
            );
        }

        clusters.push(FrustrationCluster {
            constraints: member_profiles.iter().map(|p| p.name.clone()).collect(),
            frustration_index: frustration_index(&member_profiles),
            affected_persons,
            affected_blocks,
            conflict_type,
            resolution_suggestions,
        });
    }
    clusters
}

/// Density at which synthetic frustration crosses the glassy regime,
/// found by bisection on the constraint count.
pub fn glass_transition_threshold(base_overlap: f64) -> f64 {
    let overlap = base_overlap.clamp(0.01, 1.0);
    let index_at = |count: f64| -> f64 {
        // Alternating directions: roughly half of all pairs oppose
        let pairs = count * (count - 1.0) / 2.0;
        let frustrated_pairs = pairs / 2.0;
        1.0 - (1.0 - overlap * 0.5).powf(frustrated_pairs)
    };

    let mut low = 1.0f64;
    let mut high = 64.0f64;
    if index_at(high) < 0.5 {
        return high;
    }
    for _ in 0..64 {
        let mid = (low + high) / 2.0;
        if index_at(mid) < 0.5 {
            low = mid;
        } else {
            high = mid;
        }
    }
    (low + high) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coverage() -> ConstraintProfile {
        ConstraintProfile::new("CoverageMin", 1.0)
    }

    fn cap(name: &str) -> ConstraintProfile {
        ConstraintProfile::new(name, -1.0)
    }

    #[test]
    fn test_opposing_pair_is_frustrated() {
        let f = pair_frustration(&coverage(), &cap("WorkHour80"));
        assert!((f - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_aligned_pair_is_not_frustrated() {
        let f = pair_frustration(&cap("WorkHour80"), &cap("OneInSeven"));
        assert!((f - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_neutral_pair_is_not_frustrated() {
        let neutral = ConstraintProfile::new("TeamContinuity", 0.0);
        assert!((pair_frustration(&neutral, &coverage()) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_scopes_do_not_frustrate() {
        let a = coverage().with_people([Uuid::from_u128(1)].into_iter().collect());
        let b = cap("WorkHour80").with_people([Uuid::from_u128(2)].into_iter().collect());
        // People scopes are disjoint but block scopes are both global
        let narrowed_a = a.with_blocks([Uuid::from_u128(10)].into_iter().collect());
        let narrowed_b = b.with_blocks([Uuid::from_u128(11)].into_iter().collect());
        assert!((pair_frustration(&narrowed_a, &narrowed_b) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_index_bounds_and_growth() {
        let none = frustration_index(&[coverage()]);
        assert!((none - 0.0).abs() < 1e-12);

        let pair = frustration_index(&[coverage(), cap("WorkHour80")]);
        assert!(pair > 0.0 && pair < 1.0);

        let trio = frustration_index(&[coverage(), cap("WorkHour80"), cap("OneInSeven")]);
        assert!(trio > pair);
    }

    #[test]
    fn test_coupling_matrix_signs() {
        let profiles = vec![coverage(), cap("WorkHour80"), cap("OneInSeven")];
        let matrix = coupling_matrix(&profiles);
        assert!(matrix[0][1] < 0.0, "coverage vs cap is frustrated");
        assert!(matrix[1][2] > 0.0, "two caps align");
        assert!((matrix[0][0] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_clusters_group_opposing_constraints() {
        let profiles = vec![
            coverage(),
            cap("WorkHour80"),
            ConstraintProfile::new("TeamContinuity", 0.0),
        ];
        let clusters = frustration_clusters(&profiles, 0.5);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].constraints.len(), 2);
        assert_eq!(clusters[0].conflict_type, "capacity_vs_coverage");
        assert!(clusters[0].frustration_index > 0.0);
    }

    #[test]
    fn test_no_clusters_when_below_threshold() {
        let profiles = vec![cap("WorkHour80"), cap("OneInSeven")];
        assert!(frustration_clusters(&profiles, 0.5).is_empty());
    }

    #[test]
    fn test_glass_transition_is_found_by_bisection() {
        let threshold = glass_transition_threshold(0.3);
        assert!(threshold > 1.0 && threshold < 64.0);
        // Higher overlap means fewer constraints are needed to frustrate
        let tighter = glass_transition_threshold(0.8);
        assert!(tighter < threshold);
    }

    proptest! {
        #[test]
        fn prop_frustration_index_monotone_under_addition(
            directions in proptest::collection::vec(-1i8..=1, 1..10),
            extra in -1i8..=1,
        ) {
            let profiles: Vec<ConstraintProfile> = directions
                .iter()
                .enumerate()
                .map(|(i, d)| ConstraintProfile::new(format!("c{}", i), *d as f64))
                .collect();
            let before = frustration_index(&profiles);

            let mut extended = profiles.clone();
            extended.push(ConstraintProfile::new("extra", extra as f64));
            let after = frustration_index(&extended);

            prop_assert!(after >= before - 1e-12);
            prop_assert!((0.0..=1.0).contains(&after));
        }
    }
}
