//! SIR burnout dynamics.
//!
//! Classic compartment model over the roster: susceptible, burning out
//! (infectious), recovered. Integrated with fourth-order Runge-Kutta at a
//! quarter-day step; daily samples are recorded.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

const DT: f64 = 0.25;
const STEPS_PER_DAY: usize = 4;

/// Transmission and recovery rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SirParams {
    pub beta: f64,
    pub gamma: f64,
}

impl SirParams {
    pub fn new(beta: f64, gamma: f64) -> Result<Self> {
        if beta < 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "beta must be non-negative, got {}",
                beta
            )));
        }
        if gamma <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "gamma must be positive, got {}",
                gamma
            )));
        }
        Ok(Self { beta, gamma })
    }
}

/// Outbreak phase by infectious fraction of the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutbreakPhase {
    NoCases,
    Sporadic,
    Outbreak,
    Epidemic,
    Crisis,
}

/// Daily trajectories plus summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SirForecast {
    pub susceptible: Vec<f64>,
    pub infected: Vec<f64>,
    pub recovered: Vec<f64>,
    pub peak_infected: f64,
    pub peak_day: usize,
    pub total_cases: f64,
}

/// Effect of lowering transmission from a base to an intervention rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionEffect {
    pub cases_prevented: f64,
    pub cases_prevented_pct: f64,
    pub peak_reduction: f64,
    pub peak_delay_days: i64,
}

pub struct SirModel {
    params: SirParams,
}

impl SirModel {
    pub fn new(params: SirParams) -> Self {
        Self { params }
    }

    /// Basic reproduction number `beta / gamma`.
    pub fn r0(&self) -> f64 {
        self.params.beta / self.params.gamma
    }

    /// Herd immunity threshold `1 - 1/R0`; 0 when R0 <= 1.
    pub fn herd_immunity_threshold(&self) -> f64 {
        let r0 = self.r0();
        if r0 <= 1.0 {
            0.0
        } else {
            1.0 - 1.0 / r0
        }
    }

    /// Integrate the ODE for `days` days. The trajectories have `days + 1`
    /// entries; compartments conserve `S + I + R = N` to floating-point
    /// tolerance.
    pub fn simulate(&self, s0: f64, i0: f64, r0: f64, days: usize) -> Result<SirForecast> {
        if s0 < 0.0 || i0 < 0.0 || r0 < 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "compartments must be non-negative".to_string(),
            ));
        }
        let n = s0 + i0 + r0;
        if n <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(
                "population must be positive".to_string(),
            ));
        }

        let mut susceptible = Vec::with_capacity(days + 1);
        let mut infected = Vec::with_capacity(days + 1);
        let mut recovered = Vec::with_capacity(days + 1);
        susceptible.push(s0);
        infected.push(i0);
        recovered.push(r0);

        let deriv = |s: f64, i: f64| {
            let new_infections = self.params.beta * s * i / n;
            let recoveries = self.params.gamma * i;
            (-new_infections, new_infections - recoveries, recoveries)
        };

        let (mut s, mut i, mut r) = (s0, i0, r0);
        for step in 1..=(days * STEPS_PER_DAY) {
            let k1 = deriv(s, i);
            let k2 = deriv(s + DT / 2.0 * k1.0, i + DT / 2.0 * k1.1);
            let k3 = deriv(s + DT / 2.0 * k2.0, i + DT / 2.0 * k2.1);
            let k4 = deriv(s + DT * k3.0, i + DT * k3.1);
            s += DT / 6.0 * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0);
            i += DT / 6.0 * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1);
            r += DT / 6.0 * (k1.2 + 2.0 * k2.2 + 2.0 * k3.2 + k4.2);

            if step % STEPS_PER_DAY == 0 {
                susceptible.push(s);
                infected.push(i);
                recovered.push(r);
            }
        }

        let (peak_day, peak_infected) = infected
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |(best_day, best), (day, value)| {
                if *value > best {
                    (day, *value)
                } else {
                    (best_day, best)
                }
            });
        let total_cases = s0 - s + i0;

        Ok(SirForecast {
            susceptible,
            infected,
            recovered,
            peak_infected,
            peak_day,
            total_cases,
        })
    }

    /// Run base and intervention trajectories and compare.
    pub fn intervention_effect(
        beta_base: f64,
        beta_intervention: f64,
        gamma: f64,
        i0: f64,
        n: f64,
        days: usize,
    ) -> Result<InterventionEffect> {
        let s0 = n - i0;
        let base = SirModel::new(SirParams::new(beta_base, gamma)?).simulate(s0, i0, 0.0, days)?;
        let intervention =
            SirModel::new(SirParams::new(beta_intervention, gamma)?).simulate(s0, i0, 0.0, days)?;

        let cases_prevented = base.total_cases - intervention.total_cases;
        let cases_prevented_pct = if base.total_cases > 0.0 {
            100.0 * cases_prevented / base.total_cases
        } else {
            0.0
        };
        Ok(InterventionEffect {
            cases_prevented,
            cases_prevented_pct,
            peak_reduction: base.peak_infected - intervention.peak_infected,
            peak_delay_days: intervention.peak_day as i64 - base.peak_day as i64,
        })
    }
}

/// Phase thresholds on the infectious fraction: 0, <1%, 1-5%, 5-15%, >15%.
pub fn classify_phase(infected: f64, population: f64) -> OutbreakPhase {
    if population <= 0.0 || infected <= 0.0 {
        return OutbreakPhase::NoCases;
    }
    let fraction = infected / population;
    if fraction < 0.01 {
        OutbreakPhase::Sporadic
    } else if fraction < 0.05 {
        OutbreakPhase::Outbreak
    } else if fraction < 0.15 {
        OutbreakPhase::Epidemic
    } else {
        OutbreakPhase::Crisis
    }
}
