//! Parisi overlap and replica-ensemble structure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use rota_core::Assignment;

use crate::spin_glass::replica::ReplicaSchedule;

/// Overlap band used when clustering replicas into basins.
const BASIN_OVERLAP: f64 = 0.8;
const HISTOGRAM_BINS: usize = 10;

/// Normalized similarity of two assignment sets: the fraction of
/// `(person, block)` pairs carrying the same template, over the larger
/// set. Two empty schedules overlap fully.
pub fn parisi_overlap(a: &[Assignment], b: &[Assignment]) -> f64 {
    let map_a: BTreeMap<(Uuid, Uuid), Uuid> =
        a.iter().map(|x| (x.key(), x.template_id)).collect();
    let map_b: BTreeMap<(Uuid, Uuid), Uuid> =
        b.iter().map(|x| (x.key(), x.template_id)).collect();

    let denom = map_a.len().max(map_b.len());
    if denom == 0 {
        return 1.0;
    }
    let matching = map_a
        .iter()
        .filter(|(key, template)| map_b.get(key) == Some(template))
        .count();
    matching as f64 / denom as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaSymmetry {
    pub overlap_matrix: Vec<Vec<f64>>,
    pub mean_overlap: f64,
    /// Spread of the off-diagonal overlap distribution; a wide spread
    /// signals replica-symmetry breaking.
    pub rsb_order_parameter: f64,
    pub diversity_score: f64,
    /// Histogram of off-diagonal overlaps over ten equal bins in [0, 1].
    pub overlap_distribution: Vec<usize>,
}

/// Pairwise overlap structure of a replica ensemble.
pub fn replica_symmetry_analysis(replicas: &[ReplicaSchedule]) -> ReplicaSymmetry {
    let n = replicas.len();
    let mut overlap_matrix = vec![vec![1.0; n]; n];
    let mut off_diagonal = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            let q = parisi_overlap(&replicas[i].assignments, &replicas[j].assignments);
            overlap_matrix[i][j] = q;
            overlap_matrix[j][i] = q;
            off_diagonal.push(q);
        }
    }

    let mean_overlap = if off_diagonal.is_empty() {
        1.0
    } else {
        off_diagonal.iter().sum::<f64>() / off_diagonal.len() as f64
    };
    let rsb_order_parameter = if off_diagonal.len() < 2 {
        0.0
    } else {
        let variance = off_diagonal
            .iter()
            .map(|q| (q - mean_overlap).powi(2))
            .sum::<f64>()
            / (off_diagonal.len() - 1) as f64;
        variance.sqrt()
    };

    let mut overlap_distribution = vec![0usize; HISTOGRAM_BINS];
    for q in &off_diagonal {
        let bin = ((q * HISTOGRAM_BINS as f64) as usize).min(HISTOGRAM_BINS - 1);
        overlap_distribution[bin] += 1;
    }

    ReplicaSymmetry {
        overlap_matrix,
        mean_overlap,
        rsb_order_parameter,
        diversity_score: 1.0 - mean_overlap,
        overlap_distribution,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyBasin {
    /// Replica indexes in this basin
    pub members: Vec<usize>,
    /// Lowest-energy replica of the basin
    pub minimum_replica: usize,
    pub minimum_energy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyLandscape {
    pub global_minimum_energy: f64,
    /// Basin-local minima, one replica index per basin
    pub local_minima: Vec<usize>,
    pub basin_sizes: Vec<usize>,
    pub basins: Vec<EnergyBasin>,
}

/// Cluster replicas into overlap basins and report their minima.
pub fn energy_landscape(replicas: &[ReplicaSchedule]) -> EnergyLandscape {
    let n = replicas.len();
    let mut visited = vec![false; n];
    let mut basins = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack = vec![start];
        let mut members = vec![];
        while let Some(node) = stack.pop() {
            members.push(node);
            for other in 0..n {
                if !visited[other]
                    && parisi_overlap(
                        &replicas[node].assignments,
                        &replicas[other].assignments,
                    ) >= BASIN_OVERLAP
                {
                    visited[other] = true;
                    stack.push(other);
                }
            }
        }
        members.sort_unstable();
        let minimum_replica = members
            .iter()
            .copied()
            .min_by(|a, b| {
                replicas[*a]
                    .energy
                    .partial_cmp(&replicas[*b].energy)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("basin has at least one member");
        basins.push(EnergyBasin {
            minimum_energy: replicas[minimum_replica].energy,
            minimum_replica,
            members,
        });
    }

    let global_minimum_energy = basins
        .iter()
        .map(|b| b.minimum_energy)
        .fold(f64::INFINITY, f64::min);

    EnergyLandscape {
        global_minimum_energy,
        local_minima: basins.iter().map(|b| b.minimum_replica).collect(),
        basin_sizes: basins.iter().map(|b| b.members.len()).collect(),
        basins,
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

    fn replica(index: usize, assignments: Vec<Assignment>, energy: f64) -> ReplicaSchedule {
        ReplicaSchedule {
            schedule_id: Uuid::from_u128(index as u128),
            assignments,
            energy,
            magnetization: 0.0,
            constraint_violations: BTreeMap::new(),
            replica_index: index,
        }
    }

    #[test]
    fn test_overlap_with_self_is_one() {
        let set = vec![assignment(1, 1, 10), assignment(2, 1, 11)];
        assert!((parisi_overlap(&set, &set) - 1.0).abs() < 1e-12);
        assert!((parisi_overlap(&[], &[]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_counts_matching_templates() {
        let a = vec![assignment(1, 1, 10), assignment(2, 1, 11)];
        let mut b = a.clone();
        b[1].template_id = Uuid::from_u128(12);
        assert!((parisi_overlap(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_of_disjoint_sets_is_zero() {
        let a = vec![assignment(1, 1, 10)];
        let b = vec![assignment(2, 2, 10)];
        assert!((parisi_overlap(&a, &b) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry_analysis_identical_ensemble() {
        let set = vec![assignment(1, 1, 10)];
        let replicas = vec![
            replica(0, set.clone(), 1.0),
            replica(1, set.clone(), 1.0),
            replica(2, set, 1.0),
        ];
        let symmetry = replica_symmetry_analysis(&replicas);
        assert!((symmetry.mean_overlap - 1.0).abs() < 1e-12);
        assert!((symmetry.diversity_score - 0.0).abs() < 1e-12);
        assert!(symmetry.rsb_order_parameter < 1e-12);
        assert_eq!(symmetry.overlap_distribution[9], 3);
    }

    #[test]
    fn test_symmetry_analysis_diverse_ensemble() {
        let replicas = vec![
            replica(0, vec![assignment(1, 1, 10)], 1.0),
            replica(1, vec![assignment(2, 2, 10)], 2.0),
            replica(2, vec![assignment(1, 1, 10), assignment(2, 2, 10)], 0.5),
        ];
        let symmetry = replica_symmetry_analysis(&replicas);
        assert!(symmetry.mean_overlap < 0.5);
        assert!(symmetry.diversity_score > 0.5);
    }

    #[test]
    fn test_energy_landscape_basins() {
        let set_a = vec![assignment(1, 1, 10), assignment(2, 1, 11)];
        let set_b = vec![assignment(5, 5, 20), assignment(6, 5, 21)];
        let replicas = vec![
            replica(0, set_a.clone(), 3.0),
            replica(1, set_a, 1.0),
            replica(2, set_b, 2.0),
        ];
        let landscape = energy_landscape(&replicas);
        assert_eq!(landscape.basin_sizes.len(), 2);
        assert!((landscape.global_minimum_energy - 1.0).abs() < 1e-12);
        // The first basin's minimum is replica 1
        assert!(landscape.local_minima.contains(&1));
        assert!(landscape.local_minima.contains(&2));
    }

    proptest! {
        #[test]
        fn prop_overlap_in_unit_interval_and_symmetric(
            seed_a in proptest::collection::vec((0u128..5, 0u128..5, 0u128..3), 0..10),
            seed_b in proptest::collection::vec((0u128..5, 0u128..5, 0u128..3), 0..10),
        ) {
            let build = |seed: Vec<(u128, u128, u128)>| {
                let mut seen = std::collections::BTreeSet::new();
                seed.into_iter()
                    .filter(|(p, b, _)| seen.insert((*p, *b)))
                    .map(|(p, b, t)| assignment(p, b, t))
                    .collect::<Vec<_>>()
            };
            let a = build(seed_a);
            let b = build(seed_b);

            let q = parisi_overlap(&a, &b);
            prop_assert!((0.0..=1.0).contains(&q));
            prop_assert!((q - parisi_overlap(&b, &a)).abs() < 1e-12);
            prop_assert!((parisi_overlap(&a, &a) - 1.0).abs() < 1e-12);
        }
    }
}
