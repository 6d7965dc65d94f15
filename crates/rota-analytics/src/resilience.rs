//! Resilience façade: folds the analyzers into one health summary and a
//! defense level.

use serde::{Deserialize, Serialize};

use rota_core::{ScheduleState, SchedulingContext};

use crate::error::Result;
use crate::rt::{RtConfig, RtEstimate, RtEstimator};
use crate::series::TimeSeries;
use crate::spc::{ControlChart, SpcStatus};
use crate::subharmonic::{analyze_periodicity, SubharmonicConfig};

/// A component at or below this score is considered critical and caps the
/// unified index into the RED band.
const CRITICAL_COMPONENT_SCORE: f64 = 0.2;
const CRITICAL_CAP: f64 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl DefenseLevel {
    pub fn as_number(&self) -> u8 {
        match self {
            DefenseLevel::Green => 0,
            DefenseLevel::Yellow => 1,
            DefenseLevel::Orange => 2,
            DefenseLevel::Red => 3,
        }
    }
}

/// Component weights in the unified index. Callers may tune these; the
/// critical-component cap applies regardless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResilienceWeights {
    pub utilization: f64,
    pub coverage: f64,
    pub rt: f64,
    pub spc: f64,
    pub periodicity: f64,
}

impl Default for ResilienceWeights {
    fn default() -> Self {
        Self {
            utilization: 0.2,
            coverage: 0.3,
            rt: 0.2,
            spc: 0.2,
            periodicity: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceSummary {
    pub utilization: f64,
    pub coverage_rate: f64,
    pub rt_estimate: Option<RtEstimate>,
    pub spc_status: SpcStatus,
    pub periodicity_strength: f64,
    pub unified_index: f64,
    pub defense_level: DefenseLevel,
}

pub struct ResilienceService {
    weights: ResilienceWeights,
    rt_config: RtConfig,
    subharmonic_config: SubharmonicConfig,
    spc_sigma_multiplier: f64,
}

impl Default for ResilienceService {
    fn default() -> Self {
        Self {
            weights: ResilienceWeights::default(),
            rt_config: RtConfig::default(),
            subharmonic_config: SubharmonicConfig::default(),
            spc_sigma_multiplier: 3.0,
        }
    }
}

impl ResilienceService {
    pub fn new(
        weights: ResilienceWeights,
        rt_config: RtConfig,
        subharmonic_config: SubharmonicConfig,
        spc_sigma_multiplier: f64,
    ) -> Self {
        Self {
            weights,
            rt_config,
            subharmonic_config,
            spc_sigma_multiplier,
        }
    }

    /// Summarize the authoritative state over a window.
    ///
    /// `burnout_incidence` is the daily burnout case series for the Rt
    /// estimator; `metric_series` is the daily schedule metric fed to the
    /// control chart and the subharmonic detector.
    /// `previous_compliant` reports the prior checkpoint's tier-1 status
    /// for the persistence rule.
    pub fn summary(
        &self,
        state: &ScheduleState,
        ctx: &SchedulingContext,
        burnout_incidence: &[f64],
        metric_series: &TimeSeries,
        previous_compliant: Option<bool>,
    ) -> Result<ResilienceSummary> {
        let utilization = self.utilization(state, ctx);
        let coverage_rate = self.coverage_rate(state, ctx);
        let rt_estimate = self.latest_rt(burnout_incidence, metric_series.start_date);
        let spc_status = self.spc_status(metric_series);
        let periodicity_strength = self.periodicity_strength(metric_series);

        // Normalized component scores
        let utilization_score = 1.0 - ((utilization - 0.75).abs() / 0.75).clamp(0.0, 1.0);
        let coverage_score = coverage_rate;
        let rt_score = match &rt_estimate {
            Some(estimate) => ((1.5 - estimate.rt_mean) / 0.6).clamp(0.0, 1.0),
            None => 0.75,
        };
        let spc_score = match spc_status {
            SpcStatus::InControl => 1.0,
            SpcStatus::Stable => 0.85,
            SpcStatus::Warning => 0.5,
            SpcStatus::OutOfControl => 0.1,
        };
        let periodicity_score = periodicity_strength;

        let weights = &self.weights;
        let weight_sum = weights.utilization
            + weights.coverage
            + weights.rt
            + weights.spc
            + weights.periodicity;
        let mut unified_index = (weights.utilization * utilization_score
            + weights.coverage * coverage_score
            + weights.rt * rt_score
            + weights.spc * spc_score
            + weights.periodicity * periodicity_score)
            / weight_sum.max(f64::EPSILON);

        // One critical component forces the index into the RED band
        let component_scores = [
            utilization_score,
            coverage_score,
            rt_score,
            spc_score,
            periodicity_score,
        ];
        if component_scores
            .iter()
            .any(|s| *s <= CRITICAL_COMPONENT_SCORE)
        {
            unified_index = unified_index.min(CRITICAL_CAP);
        }

        let tier1_persisting =
            !state.acgme_compliant && previous_compliant == Some(false);
        let all_healthy = component_scores.iter().all(|s| *s >= 0.5)
            && spc_status != SpcStatus::OutOfControl
            && state.acgme_compliant;

        let defense_level = if unified_index < 0.5 || tier1_persisting {
            DefenseLevel::Red
        } else if unified_index < 0.7 || spc_status == SpcStatus::OutOfControl {
            DefenseLevel::Orange
        } else if unified_index <= 0.85 || !all_healthy {
            DefenseLevel::Yellow
        } else {
            DefenseLevel::Green
        };

        Ok(ResilienceSummary {
            utilization,
            coverage_rate,
            rt_estimate,
            spc_status,
            periodicity_strength,
            unified_index,
            defense_level,
        })
    }

    /// Assigned hours over the roster's nominal capacity for the block
    /// span.
    fn utilization(&self, state: &ScheduleState, ctx: &SchedulingContext) -> f64 {
        let assigned: f64 = state.assignments.iter().map(|a| a.hours).sum();
        let days = match (ctx.blocks().first(), ctx.blocks().last()) {
            (Some(first), Some(last)) => {
                ((last.date - first.date).num_days() + 1).max(1) as f64
            }
            _ => return 0.0,
        };
        let capacity: f64 = ctx
            .residents()
            .iter()
            .chain(ctx.faculty().iter())
            .filter(|p| p.is_active())
            .map(|p| p.max_hours_per_week * days / 7.0)
            .sum();
        if capacity <= 0.0 {
            0.0
        } else {
            assigned / capacity
        }
    }

    /// Fraction of `(block, template)` min-coverage demands that are met.
    fn coverage_rate(&self, state: &ScheduleState, ctx: &SchedulingContext) -> f64 {
        let mut demanded = 0usize;
        let mut met = 0usize;
        for block in ctx.blocks() {
            for template in ctx.templates() {
                if template.min_coverage == 0 {
                    continue;
                }
                demanded += 1;
                let count = state
                    .assignments
                    .iter()
                    .filter(|a| a.block_id == block.id && a.template_id == template.id)
                    .count();
                if count >= template.min_coverage as usize {
                    met += 1;
                }
            }
        }
        if demanded == 0 {
            1.0
        } else {
            met as f64 / demanded as f64
        }
    }

    fn latest_rt(
        &self,
        incidence: &[f64],
        start_date: chrono::NaiveDate,
    ) -> Option<RtEstimate> {
        let estimator = RtEstimator::new(self.rt_config).ok()?;
        estimator
            .calculate_rt(incidence, start_date)
            .into_iter()
            .last()
    }

    fn spc_status(&self, series: &TimeSeries) -> SpcStatus {
        let n = series.values.len();
        if n < 10 {
            return SpcStatus::InControl;
        }
        let baseline_len = (n / 3).max(5);
        let baseline = &series.values[..baseline_len];
        let mut chart = match ControlChart::from_baseline(baseline, self.spc_sigma_multiplier) {
            Ok(chart) => chart,
            Err(_) => return SpcStatus::InControl,
        };
        let base_ts = chrono::Utc::now();
        for (i, value) in series.values[baseline_len..].iter().enumerate() {
            chart.add_point(base_ts + chrono::Duration::days(i as i64), *value);
        }
        chart.status()
    }

    fn periodicity_strength(&self, series: &TimeSeries) -> f64 {
        match analyze_periodicity(series, &self.subharmonic_config) {
            Ok(report) => report.periodicity_strength,
            Err(_) => 0.0,
        }
    }
}
