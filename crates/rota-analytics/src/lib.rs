pub mod error;
pub mod resilience;
pub mod rt;
pub mod series;
pub mod sir;
pub mod spc;
pub mod spin_glass;
pub mod subharmonic;

// Re-export commonly used types
pub use error::AnalyticsError;

pub use sir::{
    classify_phase, InterventionEffect, OutbreakPhase, SirForecast, SirModel, SirParams,
};

pub use rt::{
    assess_control, rt_from_r0, ControlAssessment, RtConfig, RtEstimate, RtEstimator,
    RtInterpretation, RtTrend,
};

pub use spc::{
    summarize, Capability, ControlChart, ControlChartPoint, Cusum, CusumPoint, CusumSignal,
    Ewma, EwmaPoint, RuleSeverity, RuleViolation, SpcStatus, WesternElectricRules, Zone,
};

pub use series::{build_daily_series, SeriesAggregation, TimeSeries};

pub use subharmonic::{
    analyze_periodicity, autocorrelation, PeriodicityReport, PeriodicityShift, StrengthTrend,
    SubharmonicConfig, SubharmonicDetector,
};

pub use spin_glass::{
    frustration_clusters, frustration_index, generate_replicas, parisi_overlap,
    replica_symmetry_analysis, ConstraintProfile, EnergyLandscape, FrustrationCluster,
    ReplicaSchedule, ReplicaSymmetry, SpinGlassAnalyzer,
};

pub use resilience::{
    DefenseLevel, ResilienceService, ResilienceSummary, ResilienceWeights,
};
