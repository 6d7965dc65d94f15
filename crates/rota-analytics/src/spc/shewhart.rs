//! Shewhart individuals chart with zone classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::spc::western_electric::{summarize, SpcStatus, WesternElectricRules};

const MIN_BASELINE: usize = 5;

/// Zone by distance from the center line: A within 1 sigma, B within 2,
/// C within 3, Out beyond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    A,
    B,
    C,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlChartPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub zone: Zone,
    pub in_control: bool,
    pub violated_rule: Option<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capability {
    pub cp: f64,
    pub cpk: f64,
}

pub struct ControlChart {
    mean: f64,
    sigma: f64,
    sigma_multiplier: f64,
    points: Vec<ControlChartPoint>,
}

impl ControlChart {
    /// Estimate center and spread from a baseline of at least 5 samples.
    pub fn from_baseline(baseline: &[f64], sigma_multiplier: f64) -> Result<Self> {
        if baseline.len() < MIN_BASELINE {
            return Err(AnalyticsError::InsufficientData(format!(
                "baseline needs at least {} points, got {}",
                MIN_BASELINE,
                baseline.len()
            )));
        }
        if sigma_multiplier <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "sigma multiplier must be positive".to_string(),
            ));
        }

        let n = baseline.len() as f64;
        let mean = baseline.iter().sum::<f64>() / n;
        let variance = baseline.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let sigma = variance.sqrt();
        if sigma <= f64::EPSILON {
            return Err(AnalyticsError::InvalidParameter(
                "baseline has zero variance".to_string(),
            ));
        }

        Ok(Self {
            mean,
            sigma,
            sigma_multiplier,
            points: Vec::new(),
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn ucl(&self) -> f64 {
        self.mean + self.sigma_multiplier * self.sigma
    }

    pub fn lcl(&self) -> f64 {
        self.mean - self.sigma_multiplier * self.sigma
    }

    pub fn uwl(&self) -> f64 {
        self.mean + 2.0 * self.sigma
    }

    pub fn lwl(&self) -> f64 {
        self.mean - 2.0 * self.sigma
    }

    pub fn points(&self) -> &[ControlChartPoint] {
        &self.points
    }

    fn classify_zone(&self, value: f64) -> Zone {
        let distance = (value - self.mean).abs() / self.sigma;
        if distance <= 1.0 {
            Zone::A
        } else if distance <= 2.0 {
            Zone::B
        } else if distance <= 3.0 {
            Zone::C
        } else {
            Zone::Out
        }
    }

    /// Add an observation: classify its zone and re-run the Western
    /// Electric rules over the accumulated series.
    pub fn add_point(&mut self, timestamp: DateTime<Utc>, value: f64) -> ControlChartPoint {
        let zone = self.classify_zone(value);

        let values: Vec<f64> = self
            .points
            .iter()
            .map(|p| p.value)
            .chain(std::iter::once(value))
            .collect();
        let involving_last = WesternElectricRules::new(self.mean, self.sigma)
            .violations_involving_last(&values);
        let violated_rule = involving_last.first().map(|v| v.rule_number);

        let point = ControlChartPoint {
            timestamp,
            value,
            zone,
            in_control: zone != Zone::Out && involving_last.is_empty(),
            violated_rule,
        };
        self.points.push(point.clone());
        point
    }

    /// Chart status from a full-series rule scan.
    pub fn status(&self) -> SpcStatus {
        let values: Vec<f64> = self.points.iter().map(|p| p.value).collect();
        let violations = WesternElectricRules::new(self.mean, self.sigma).check_all_rules(&values);
        summarize(&violations)
    }

    /// `Cp = (UCL - LCL) / 6 sigma`, `Cpk = min` of the one-sided ratios.
    pub fn capability(&self) -> Capability {
        let cp = (self.ucl() - self.lcl()) / (6.0 * self.sigma);
        let upper = (self.ucl() - self.mean) / (3.0 * self.sigma);
        let lower = (self.mean - self.lcl()) / (3.0 * self.sigma);
        Capability {
            cp,
            cpk: upper.min(lower),
        }
    }
}
