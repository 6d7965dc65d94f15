//! Exponentially weighted moving-average chart.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EwmaPoint {
    pub value: f64,
    pub z: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub in_control: bool,
}

pub struct Ewma {
    target: f64,
    lambda: f64,
    z: f64,
    /// Asymptotic control limit half-width `L sigma sqrt(lambda/(2-lambda))`.
    limit: f64,
}

impl Ewma {
    pub fn new(target: f64, sigma: f64, lambda: f64, l: f64) -> Result<Self> {
        if sigma <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "sigma must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&lambda) || lambda == 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "lambda must be in (0, 1], got {}",
                lambda
            )));
        }
        if l <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "L must be positive".to_string(),
            ));
        }
        Ok(Self {
            target,
            lambda,
            z: target,
            limit: l * sigma * (lambda / (2.0 - lambda)).sqrt(),
        })
    }

    /// `z = lambda x + (1 - lambda) z`, starting from the target.
    pub fn add(&mut self, value: f64) -> EwmaPoint {
        self.z = self.lambda * value + (1.0 - self.lambda) * self.z;
        let ucl = self.target + self.limit;
        let lcl = self.target - self.limit;
        EwmaPoint {
            value,
            z: self.z,
            ucl,
            lcl,
            in_control: self.z <= ucl && self.z >= lcl,
        }
    }

    pub fn reset(&mut self) {
        self.z = self.target;
    }
}
