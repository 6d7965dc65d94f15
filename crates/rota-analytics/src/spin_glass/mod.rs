//! Spin-glass view of constraint conflict: each `(person, block)` choice
//! is a spin, each pairwise constraint interaction a coupling. Frustration
//! measures how much of the catalog cannot be jointly satisfied; replica
//! ensembles probe how many distinct near-optimal schedules coexist.

pub mod coupling;
pub mod overlap;
pub mod replica;

use rota_core::{Assignment, ConstraintEngine, SchedulingContext};

pub use coupling::{
    builtin_direction, coupling_matrix, frustration_clusters, frustration_index,
    glass_transition_threshold, pair_frustration, profiles_for, ConstraintProfile,
    FrustrationCluster,
};
pub use overlap::{
    energy_landscape, parisi_overlap, replica_symmetry_analysis, EnergyBasin, EnergyLandscape,
    ReplicaSymmetry,
};
pub use replica::{generate_replicas, preference_alignment, ReplicaSchedule};

/// Default pairwise coupling threshold for cluster detection.
const CLUSTER_THRESHOLD: f64 = 0.5;

/// Facade binding the engine, the coupling profiles and a sampling
/// temperature.
pub struct SpinGlassAnalyzer {
    engine: ConstraintEngine,
    profiles: Vec<ConstraintProfile>,
    temperature: f64,
}

impl SpinGlassAnalyzer {
    pub fn new(engine: ConstraintEngine, temperature: f64) -> Self {
        let profiles: Vec<ConstraintProfile> = engine
            .catalog()
            .names()
            .iter()
            .map(|name| ConstraintProfile::new(*name, builtin_direction(name)))
            .collect();
        Self {
            engine,
            profiles,
            temperature,
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<ConstraintProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profiles(&self) -> &[ConstraintProfile] {
        &self.profiles
    }

    /// Frustration of the active catalog, in `[0, 1]`.
    pub fn frustration_index(&self) -> f64 {
        frustration_index(&self.profiles)
    }

    /// Frustrated-constraint clusters above the default threshold.
    pub fn frustration_clusters(&self) -> Vec<FrustrationCluster> {
        frustration_clusters(&self.profiles, CLUSTER_THRESHOLD)
    }

    /// Constraint density where synthetic frustration turns glassy.
    pub fn glass_transition_threshold(&self) -> f64 {
        // Mean pairwise frustration of the real catalog anchors the sweep
        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..self.profiles.len() {
            for j in (i + 1)..self.profiles.len() {
                total += pair_frustration(&self.profiles[i], &self.profiles[j]);
                pairs += 1;
            }
        }
        let base_overlap = if pairs == 0 { 0.3 } else { total / pairs as f64 };
        glass_transition_threshold(base_overlap.max(0.05))
    }

    /// Metropolis replica ensemble; deterministic per `(seed, index)`.
    pub fn generate_replicas(
        &self,
        ctx: &SchedulingContext,
        n: usize,
        seed: u64,
        base: Option<&[Assignment]>,
    ) -> Vec<ReplicaSchedule> {
        generate_replicas(ctx, &self.engine, n, self.temperature, seed, base)
    }

    pub fn replica_symmetry_analysis(&self, replicas: &[ReplicaSchedule]) -> ReplicaSymmetry {
        replica_symmetry_analysis(replicas)
    }

    pub fn energy_landscape(&self, replicas: &[ReplicaSchedule]) -> EnergyLandscape {
        energy_landscape(replicas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::testing::fixtures::standard_context;

    fn analyzer() -> SpinGlassAnalyzer {
        SpinGlassAnalyzer::new(ConstraintEngine::with_defaults(), 1.0)
    }

    #[test]
    fn test_default_catalog_is_frustrated() {
        // Coverage rules oppose the regulatory caps, so the built-in
        // catalog carries structural frustration
        let index = analyzer().frustration_index();
        assert!(index > 0.5, "index {}", index);
        assert!(index <= 1.0);
    }

    #[test]
    fn test_clusters_mix_coverage_and_caps() {
        let clusters = analyzer().frustration_clusters();
        assert!(!clusters.is_empty());
        let cluster = &clusters[0];
        assert_eq!(cluster.conflict_type, "capacity_vs_coverage");
        assert!(cluster.constraints.iter().any(|c| c == "CoverageMin"));
        assert!(cluster.constraints.iter().any(|c| c == "WorkHour80"));
    }

    #[test]
    fn test_glass_transition_in_range() {
        let threshold = analyzer().glass_transition_threshold();
        assert!(threshold >= 1.0 && threshold <= 64.0, "{}", threshold);
    }

    #[test]
    fn test_end_to_end_replica_pipeline() {
        let ctx = standard_context(5, 5);
        let analyzer = analyzer();
        let replicas = analyzer.generate_replicas(ctx.inner(), 3, 17, None);
        assert_eq!(replicas.len(), 3);

        let symmetry = analyzer.replica_symmetry_analysis(&replicas);
        assert_eq!(symmetry.overlap_matrix.len(), 3);
        assert!((0.0..=1.0).contains(&symmetry.mean_overlap));

        let landscape = analyzer.energy_landscape(&replicas);
        assert!(landscape.global_minimum_energy.is_finite());
        assert_eq!(
            landscape.basin_sizes.iter().sum::<usize>(),
            replicas.len()
        );
    }
}
