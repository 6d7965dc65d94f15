//! Autocorrelation-based subharmonic cycle detection.
//!
//! Schedules have a natural weekly pulse; longer cycles at integer
//! multiples of it (biweekly alternation, the 4-week window, quarterly
//! patterns) show up as autocorrelation peaks. Periodicity strength comes
//! from a periodogram with the winning period's harmonic family folded
//! together, so a strictly periodic signal scores near 1 regardless of its
//! waveform.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::series::TimeSeries;

/// Smoothing factor for the stability score over recent strengths.
const STABILITY_LAMBDA: f64 = 0.3;
/// Bin tolerance when folding harmonics in the periodogram.
const HARMONIC_BIN_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubharmonicConfig {
    /// Base period in days; detected cycles are integer multiples of it
    pub base_period: usize,
    /// Longest lag examined; defaults to half the series length
    pub max_period: Option<usize>,
    /// Minimum autocorrelation peak height treated as significant
    pub min_significance: f64,
}

impl Default for SubharmonicConfig {
    fn default() -> Self {
        Self {
            base_period: 7,
            max_period: None,
            min_significance: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicityReport {
    pub fundamental_period: Option<usize>,
    pub subharmonic_periods: Vec<usize>,
    pub periodicity_strength: f64,
    pub autocorrelation: Vec<f64>,
    pub detected_patterns: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthTrend {
    Improving,
    Stable,
    Worsening,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicityShift {
    pub strength_change: f64,
    pub new_cycles: Vec<usize>,
    pub strength_trend: StrengthTrend,
}

/// Named cycle lengths in days.
fn pattern_name(period: usize) -> Option<&'static str> {
    match period {
        7 => Some("weekly"),
        14 => Some("biweekly alternation"),
        21 => Some("triweekly"),
        28 => Some("ACGME 4-week"),
        56 => Some("2-month"),
        84 => Some("quarterly"),
        _ => None,
    }
}

/// Biased autocorrelation normalized to `acf[0] = 1`.
pub fn autocorrelation(values: &[f64], max_lag: usize) -> Vec<f64> {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let denom: f64 = centered.iter().map(|v| v * v).sum();

    let mut acf = Vec::with_capacity(max_lag + 1);
    if denom <= f64::EPSILON {
        acf.resize(max_lag + 1, 0.0);
        if !acf.is_empty() {
            acf[0] = 1.0;
        }
        return acf;
    }
    for lag in 0..=max_lag {
        let sum: f64 = (0..n - lag).map(|t| centered[t] * centered[t + lag]).sum();
        acf.push(sum / denom);
    }
    acf
}

/// Local maxima above `min_height`, at least `min_distance` apart, highest
/// first when pruning.
fn find_peaks(acf: &[f64], min_height: f64, min_distance: usize) -> Vec<usize> {
    let mut candidates: Vec<usize> = (1..acf.len().saturating_sub(1))
        .filter(|&k| acf[k] >= min_height && acf[k] >= acf[k - 1] && acf[k] >= acf[k + 1])
        .collect();
    candidates.sort_by(|a, b| acf[*b].partial_cmp(&acf[*a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<usize> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| candidate.abs_diff(*k) >= min_distance)
        {
            kept.push(candidate);
        }
    }
    kept.sort_unstable();
    kept
}

/// Power spectrum over non-DC bins `1..=n/2` by direct DFT.
fn periodogram(centered: &[f64]) -> Vec<f64> {
    let n = centered.len();
    let mut psd = Vec::with_capacity(n / 2);
    for j in 1..=n / 2 {
        let mut re = 0.0;
        let mut im = 0.0;
        for (t, value) in centered.iter().enumerate() {
            let angle = 2.0 * std::f64::consts::PI * j as f64 * t as f64 / n as f64;
            re += value * angle.cos();
            im += value * angle.sin();
        }
        psd.push(re * re + im * im);
    }
    psd
}

/// Fraction of spectral power in the harmonic family of `period`, as an
/// amplitude ratio.
fn harmonic_strength(psd: &[f64], n: usize, period: usize) -> f64 {
    let total: f64 = psd.iter().sum();
    if total <= f64::EPSILON || period == 0 {
        return 0.0;
    }
    let mut captured = 0.0;
    let mut used = vec![false; psd.len()];
    let mut harmonic = 1usize;
    loop {
        let center = harmonic as f64 * n as f64 / period as f64;
        if center > psd.len() as f64 + 1.0 {
            break;
        }
        for (idx, power) in psd.iter().enumerate() {
            let bin = (idx + 1) as f64;
            if (bin - center).abs() <= HARMONIC_BIN_TOLERANCE && !used[idx] {
                used[idx] = true;
                captured += power;
            }
        }
        harmonic += 1;
    }
    (captured / total).sqrt()
}

/// Analyze one series for subharmonic cycles.
pub fn analyze_periodicity(
    series: &TimeSeries,
    config: &SubharmonicConfig,
) -> Result<PeriodicityReport> {
    let n = series.values.len();
    if n < config.base_period * 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "series of {} days cannot resolve a base period of {}",
            n, config.base_period
        )));
    }
    if !(0.0..=1.0).contains(&config.min_significance) {
        return Err(AnalyticsError::InvalidParameter(format!(
            "min_significance must be in [0, 1], got {}",
            config.min_significance
        )));
    }

    let max_period = config.max_period.unwrap_or(n / 2).min(n - 1);
    let acf = autocorrelation(&series.values, max_period);
    let peaks = find_peaks(&acf, config.min_significance, config.base_period / 2);

    // Keep peaks at integer multiples of the base period, +-1 day
    let subharmonic_periods: Vec<usize> = peaks
        .iter()
        .copied()
        .filter(|&lag| {
            let remainder = lag % config.base_period;
            remainder <= 1 || remainder >= config.base_period - 1
        })
        .collect();

    // Fundamental: the highest-ACF subharmonic peak
    let fundamental_period = subharmonic_periods
        .iter()
        .copied()
        .max_by(|a, b| acf[*a].partial_cmp(&acf[*b]).unwrap_or(std::cmp::Ordering::Equal));

    let mean = series.values.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = series.values.iter().map(|v| v - mean).collect();
    let psd = periodogram(&centered);
    let periodicity_strength = match fundamental_period {
        Some(period) => harmonic_strength(&psd, n, period),
        None => {
            // No subharmonic structure: fall back to the single strongest bin
            let total: f64 = psd.iter().sum();
            let max = psd.iter().cloned().fold(0.0, f64::max);
            if total <= f64::EPSILON {
                0.0
            } else {
                (max / total).sqrt()
            }
        }
    };

    let detected_patterns: Vec<String> = subharmonic_periods
        .iter()
        .filter_map(|p| pattern_name(*p))
        .map(str::to_string)
        .collect();

    let mut recommendations = Vec::new();
    if periodicity_strength > 0.8 {
        recommendations
            .push("strong periodic structure; rotation rhythm is stable".to_string());
    } else if periodicity_strength > 0.4 {
        recommendations.push(
            "moderate periodicity; review blocks that break the dominant cycle".to_string(),
        );
    } else {
        recommendations
            .push("weak periodicity; the schedule lacks a consistent rhythm".to_string());
    }
    if subharmonic_periods.len() > 2 {
        recommendations.push(format!(
            "{} nested cycles detected; consider consolidating rotation cadences",
            subharmonic_periods.len()
        ));
    }

    Ok(PeriodicityReport {
        fundamental_period,
        subharmonic_periods,
        periodicity_strength,
        autocorrelation: acf,
        detected_patterns,
        recommendations,
    })
}

/// Stateful detector that remembers prior reports for trend comparison.
#[derive(Default)]
pub struct SubharmonicDetector {
    config: SubharmonicConfig,
    history: Vec<PeriodicityReport>,
}

impl SubharmonicDetector {
    pub fn new(config: SubharmonicConfig) -> Self {
        Self {
            config,
            history: Vec::new(),
        }
    }

    pub fn analyze(&mut self, series: &TimeSeries) -> Result<PeriodicityReport> {
        let report = analyze_periodicity(series, &self.config)?;
        self.history.push(report.clone());
        Ok(report)
    }

    /// Compare a fresh report against the one retained before it. The last
    /// history entry is the report itself, stored by `analyze`.
    pub fn compare_to_previous(&self, report: &PeriodicityReport) -> Option<PeriodicityShift> {
        if self.history.len() < 2 {
            return None;
        }
        let previous = &self.history[self.history.len() - 2];

        let strength_change = report.periodicity_strength - previous.periodicity_strength;
        let new_cycles: Vec<usize> = report
            .subharmonic_periods
            .iter()
            .copied()
            .filter(|p| !previous.subharmonic_periods.contains(p))
            .collect();
        let strength_trend = if strength_change > 0.05 {
            StrengthTrend::Improving
        } else if strength_change < -0.05 {
            StrengthTrend::Worsening
        } else {
            StrengthTrend::Stable
        };

        Some(PeriodicityShift {
            strength_change,
            new_cycles,
            strength_trend,
        })
    }

    /// Exponentially smoothed mean of recent strengths, in `[0, 1]`.
    pub fn stability_score(&self) -> f64 {
        let mut score = 0.0;
        let mut initialized = false;
        for report in &self.history {
            if initialized {
                score = STABILITY_LAMBDA * report.periodicity_strength
                    + (1.0 - STABILITY_LAMBDA) * score;
            } else {
                score = report.periodicity_strength;
                initialized = true;
            }
        }
        score.clamp(0.0, 1.0)
    }
}
