//! Tabular CUSUM for small sustained shifts.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CusumSignal {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CusumPoint {
    pub value: f64,
    pub c_plus: f64,
    pub c_minus: f64,
    pub signal: Option<CusumSignal>,
}

/// Parameters in sigma units: `k` the slack (half the shift to detect),
/// `h` the decision interval.
pub struct Cusum {
    target: f64,
    sigma: f64,
    k: f64,
    h: f64,
    c_plus: f64,
    c_minus: f64,
}

impl Cusum {
    pub fn new(target: f64, sigma: f64, k: f64, h: f64) -> Result<Self> {
        if sigma <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "sigma must be positive".to_string(),
            ));
        }
        if k < 0.0 || h <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "k must be non-negative and h positive".to_string(),
            ));
        }
        Ok(Self {
            target,
            sigma,
            k,
            h,
            c_plus: 0.0,
            c_minus: 0.0,
        })
    }

    /// `C+ = max(0, C+ + x - target - k sigma)`,
    /// `C- = max(0, C- - x + target - k sigma)`; signal when either sum
    /// crosses `h sigma`.
    pub fn add(&mut self, value: f64) -> CusumPoint {
        let slack = self.k * self.sigma;
        self.c_plus = (self.c_plus + value - self.target - slack).max(0.0);
        self.c_minus = (self.c_minus - value + self.target - slack).max(0.0);

        let threshold = self.h * self.sigma;
        let signal = if self.c_plus > threshold {
            Some(CusumSignal::High)
        } else if self.c_minus > threshold {
            Some(CusumSignal::Low)
        } else {
            None
        };

        CusumPoint {
            value,
            c_plus: self.c_plus,
            c_minus: self.c_minus,
            signal,
        }
    }

    pub fn reset(&mut self) {
        self.c_plus = 0.0;
        self.c_minus = 0.0;
    }
}
