//! Effective reproduction number by the Cori sliding-window method.
//!
//! The serial interval is a discretized Gamma; daily infectiousness is the
//! weighted sum of past incidence; the windowed posterior is
//! `Gamma(1 + sum I, sum Lambda)` under an uninformative prior.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Gamma};

use crate::error::{AnalyticsError, Result};

/// Truncate the serial-interval pmf once this much tail mass remains.
const TAIL_EPSILON: f64 = 1e-4;
const MAX_HORIZON_DAYS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtInterpretation {
    Growing,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtEstimate {
    pub date: NaiveDate,
    pub rt_mean: f64,
    pub rt_lower: f64,
    pub rt_upper: f64,
    pub confidence: f64,
    pub interpretation: RtInterpretation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtTrend {
    Improving,
    Worsening,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAssessment {
    pub is_controlled: bool,
    pub trend: RtTrend,
    pub assessment: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RtConfig {
    pub serial_interval_mean_days: f64,
    pub serial_interval_std_days: f64,
    pub window_size: usize,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            serial_interval_mean_days: 7.0,
            serial_interval_std_days: 3.0,
            window_size: 7,
        }
    }
}

pub struct RtEstimator {
    config: RtConfig,
    /// Discretized serial interval, `weights[s - 1]` for lag `s >= 1`.
    weights: Vec<f64>,
}

impl RtEstimator {
    pub fn new(config: RtConfig) -> Result<Self> {
        if config.serial_interval_mean_days <= 0.0 || config.serial_interval_std_days <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "serial interval parameters must be positive".to_string(),
            ));
        }
        if config.window_size == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "window size must be positive".to_string(),
            ));
        }

        let mean = config.serial_interval_mean_days;
        let std = config.serial_interval_std_days;
        let shape = mean * mean / (std * std);
        let rate = mean / (std * std);
        let gamma = Gamma::new(shape, rate).map_err(|e| {
            AnalyticsError::InvalidParameter(format!("serial interval gamma: {}", e))
        })?;

        let mut weights = Vec::new();
        for s in 1..=MAX_HORIZON_DAYS {
            let upper = gamma.cdf(s as f64 + 0.5);
            let lower = gamma.cdf((s as f64 - 0.5).max(0.0));
            weights.push(upper - lower);
            if 1.0 - upper < TAIL_EPSILON {
                break;
            }
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "serial interval mass vanished".to_string(),
            ));
        }
        for w in &mut weights {
            *w /= total;
        }

        Ok(Self { config, weights })
    }

    /// Infectiousness `Lambda[t] = sum_s w_s I[t - s]`.
    fn infectiousness(&self, incidence: &[f64], t: usize) -> f64 {
        let mut lambda = 0.0;
        for (idx, w) in self.weights.iter().enumerate() {
            let s = idx + 1;
            if s > t {
                break;
            }
            lambda += w * incidence[t - s];
        }
        lambda
    }

    /// Windowed Rt series. Estimates start at `t = window_size`; windows
    /// with no infectiousness mass are skipped.
    pub fn calculate_rt(&self, incidence: &[f64], start_date: NaiveDate) -> Vec<RtEstimate> {
        let window = self.config.window_size;
        let mut estimates = Vec::new();
        if incidence.len() <= window {
            return estimates;
        }

        for t in window..incidence.len() {
            let window_range = (t + 1 - window)..=t;
            let incidence_sum: f64 = window_range.clone().map(|u| incidence[u]).sum();
            let lambda_sum: f64 = window_range
                .map(|u| self.infectiousness(incidence, u))
                .sum();
            if lambda_sum <= 0.0 {
                continue;
            }

            // Posterior Gamma(alpha = 1 + sum I, rate = sum Lambda)
            let alpha = 1.0 + incidence_sum;
            let rate = lambda_sum;
            let rt_mean = alpha / rate;
            let (rt_lower, rt_upper) = match Gamma::new(alpha, rate) {
                Ok(posterior) => (
                    posterior.inverse_cdf(0.025),
                    posterior.inverse_cdf(0.975),
                ),
                Err(_) => (rt_mean, rt_mean),
            };

            let interpretation = if rt_upper < 0.9 {
                RtInterpretation::Declining
            } else if rt_lower > 1.1 {
                RtInterpretation::Growing
            } else {
                RtInterpretation::Stable
            };

            estimates.push(RtEstimate {
                date: start_date + chrono::Duration::days(t as i64),
                rt_mean,
                rt_lower,
                rt_upper,
                confidence: 0.95,
                interpretation,
            });
        }
        estimates
    }
}

/// Scale R0 by remaining susceptibility: `Rt = R0 * S / N`.
pub fn rt_from_r0(r0: f64, susceptible: f64, population: f64) -> f64 {
    if population <= 0.0 {
        return 0.0;
    }
    r0 * susceptible / population
}

/// Judge whether transmission is under control from the recent history.
pub fn assess_control(
    current: &RtEstimate,
    history: &[RtEstimate],
    min_days_below_one: usize,
) -> ControlAssessment {
    let below_run = history
        .iter()
        .rev()
        .take_while(|e| e.rt_mean < 1.0)
        .count();
    let is_controlled = current.rt_mean < 1.0 && below_run >= min_days_below_one;

    let trend = match history.len() {
        0 => RtTrend::Flat,
        n => {
            let recent = &history[n.saturating_sub(3)..];
            let earlier_mean: f64 =
                recent.iter().map(|e| e.rt_mean).sum::<f64>() / recent.len() as f64;
            let delta = current.rt_mean - earlier_mean;
            if delta < -0.05 {
                RtTrend::Improving
            } else if delta > 0.05 {
                RtTrend::Worsening
            } else {
                RtTrend::Flat
            }
        }
    };

    let assessment = match (is_controlled, trend) {
        (true, _) => format!(
            "transmission controlled: Rt {:.2} below 1 for {} day(s)",
            current.rt_mean, below_run
        ),
        (false, RtTrend::Improving) => {
            format!("not yet controlled but improving: Rt {:.2}", current.rt_mean)
        }
        (false, RtTrend::Worsening) => {
            format!("transmission worsening: Rt {:.2}", current.rt_mean)
        }
        (false, RtTrend::Flat) => format!("uncontrolled and flat: Rt {:.2}", current.rt_mean),
    };

    ControlAssessment {
        is_controlled,
        trend,
        assessment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn estimator(window: usize) -> RtEstimator {
        RtEstimator::new(RtConfig {
            serial_interval_mean_days: 7.0,
            serial_interval_std_days: 3.0,
            window_size: window,
        })
        .unwrap()
    }

    #[test]
    fn test_serial_interval_weights_sum_to_one() {
        let est = estimator(7);
        let total: f64 = est.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        // Mean 7 std 3: the mode sits around day 6
        let mode = est
            .weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0
            + 1;
        assert!((5..=7).contains(&mode), "mode at {}", mode);
    }

    #[test]
    fn test_declining_incidence_reports_declining() {
        // Spec scenario: incidence 5,5,5,4,3,2,1,1,0,0 with window 5
        let incidence = [5.0, 5.0, 5.0, 4.0, 3.0, 2.0, 1.0, 1.0, 0.0, 0.0];
        let estimates = estimator(5).calculate_rt(&incidence, day0());
        assert!(!estimates.is_empty());

        let last = estimates.last().unwrap();
        assert!(last.rt_mean < 1.0, "final Rt {}", last.rt_mean);
        // Posterior for the final window: alpha 5, rate ~12.7
        assert!((last.rt_mean - 0.395).abs() < 0.05, "mean {}", last.rt_mean);
        assert!(last.rt_upper < 0.9, "upper {}", last.rt_upper);
        assert_eq!(last.interpretation, RtInterpretation::Declining);
    }

    #[test]
    fn test_growing_incidence_reports_growing() {
        let incidence: Vec<f64> = (0..21).map(|t| (1.25f64).powi(t) * 2.0).collect();
        let estimates = estimator(7).calculate_rt(&incidence, day0());
        let last = estimates.last().unwrap();
        assert!(last.rt_mean > 1.1, "Rt {}", last.rt_mean);
        assert_eq!(last.interpretation, RtInterpretation::Growing);
    }

    #[test]
    fn test_short_series_yields_nothing() {
        let estimates = estimator(7).calculate_rt(&[1.0, 2.0, 3.0], day0());
        assert!(estimates.is_empty());
    }

    #[test]
    fn test_zero_infectiousness_windows_skipped() {
        let incidence = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let estimates = estimator(5).calculate_rt(&incidence, day0());
        assert!(estimates.is_empty());
    }

    #[test]
    fn test_credible_interval_brackets_mean() {
        let incidence = [3.0, 4.0, 5.0, 6.0, 5.0, 4.0, 5.0, 6.0, 7.0, 6.0, 5.0, 4.0];
        for estimate in estimator(7).calculate_rt(&incidence, day0()) {
            assert!(estimate.rt_lower <= estimate.rt_mean);
            assert!(estimate.rt_mean <= estimate.rt_upper);
            assert!(estimate.rt_lower >= 0.0);
        }
    }

    #[test]
    fn test_rt_from_r0_scales_with_susceptibility() {
        assert!((rt_from_r0(3.0, 100.0, 100.0) - 3.0).abs() < 1e-12);
        assert!((rt_from_r0(3.0, 33.0, 100.0) - 0.99).abs() < 1e-12);
        assert!((rt_from_r0(3.0, 0.0, 100.0) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_assess_control_requires_sustained_run() {
        let make = |rt: f64| RtEstimate {
            date: day0(),
            rt_mean: rt,
            rt_lower: rt - 0.1,
            rt_upper: rt + 0.1,
            confidence: 0.95,
            interpretation: RtInterpretation::Stable,
        };

        let history = vec![make(1.2), make(0.9), make(0.8)];
        let current = make(0.7);

        let short = assess_control(&current, &history, 5);
        assert!(!short.is_controlled);
        assert_eq!(short.trend, RtTrend::Improving);

        let long = assess_control(&current, &history, 2);
        assert!(long.is_controlled);
    }
}
