//! The eight Western Electric rules for special-cause detection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_number: u8,
    pub severity: RuleSeverity,
    /// Indexes into the scanned series, ascending.
    pub points_involved: Vec<usize>,
}

/// Chart status after folding rule findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpcStatus {
    OutOfControl,
    Warning,
    Stable,
    InControl,
}

pub struct WesternElectricRules {
    mean: f64,
    sigma: f64,
}

impl WesternElectricRules {
    pub fn new(mean: f64, sigma: f64) -> Self {
        Self { mean, sigma }
    }

    /// Scan the whole series with all eight rules.
    pub fn check_all_rules(&self, values: &[f64]) -> Vec<RuleViolation> {
        let deviations: Vec<f64> = values.iter().map(|v| (v - self.mean) / self.sigma).collect();
        let mut violations = Vec::new();

        self.rule_beyond_three_sigma(&deviations, &mut violations);
        self.rule_two_of_three_beyond_two(&deviations, &mut violations);
        self.rule_four_of_five_beyond_one(&deviations, &mut violations);
        self.rule_eight_same_side(&deviations, &mut violations);
        self.rule_six_trending(values, &mut violations);
        self.rule_fifteen_within_one(&deviations, &mut violations);
        self.rule_fourteen_alternating(values, &mut violations);
        self.rule_eight_beyond_one_either_side(&deviations, &mut violations);

        violations
    }

    /// Rules that implicate the final point of the series; used by charts
    /// to mark a freshly added point.
    pub fn violations_involving_last(&self, values: &[f64]) -> Vec<RuleViolation> {
        let last = values.len().saturating_sub(1);
        self.check_all_rules(values)
            .into_iter()
            .filter(|v| v.points_involved.contains(&last))
            .collect()
    }

    // Rule 1: one point beyond 3 sigma
    fn rule_beyond_three_sigma(&self, dev: &[f64], out: &mut Vec<RuleViolation>) {
        for (i, d) in dev.iter().enumerate() {
            if d.abs() > 3.0 {
                out.push(RuleViolation {
                    rule_number: 1,
                    severity: RuleSeverity::Critical,
                    points_involved: vec![i],
                });
            }
        }
    }

    // Rule 2: 2 of 3 consecutive beyond 2 sigma on the same side
    fn rule_two_of_three_beyond_two(&self, dev: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 2..dev.len() {
            let window = &dev[end - 2..=end];
            for side in [1.0, -1.0] {
                let hits: Vec<usize> = window
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| **d * side > 2.0)
                    .map(|(k, _)| end - 2 + k)
                    .collect();
                if hits.len() >= 2 {
                    out.push(RuleViolation {
                        rule_number: 2,
                        severity: RuleSeverity::Critical,
                        points_involved: (end - 2..=end).collect(),
                    });
                    break;
                }
            }
        }
    }

    // Rule 3: 4 of 5 consecutive beyond 1 sigma on the same side
    fn rule_four_of_five_beyond_one(&self, dev: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 4..dev.len() {
            let window = &dev[end - 4..=end];
            for side in [1.0, -1.0] {
                let hits = window.iter().filter(|d| **d * side > 1.0).count();
                if hits >= 4 {
                    out.push(RuleViolation {
                        rule_number: 3,
                        severity: RuleSeverity::Warning,
                        points_involved: (end - 4..=end).collect(),
                    });
                    break;
                }
            }
        }
    }

    // Rule 4: 8 consecutive on the same side of the center line
    fn rule_eight_same_side(&self, dev: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 7..dev.len() {
            let window = &dev[end - 7..=end];
            let above = window.iter().all(|d| *d > 0.0);
            let below = window.iter().all(|d| *d < 0.0);
            if above || below {
                out.push(RuleViolation {
                    rule_number: 4,
                    severity: RuleSeverity::Warning,
                    points_involved: (end - 7..=end).collect(),
                });
            }
        }
    }

    // Rule 5: 6 consecutive strictly increasing or decreasing
    fn rule_six_trending(&self, values: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 5..values.len() {
            let window = &values[end - 5..=end];
            let increasing = window.windows(2).all(|w| w[1] > w[0]);
            let decreasing = window.windows(2).all(|w| w[1] < w[0]);
            if increasing || decreasing {
                out.push(RuleViolation {
                    rule_number: 5,
                    severity: RuleSeverity::Warning,
                    points_involved: (end - 5..=end).collect(),
                });
            }
        }
    }

    // Rule 6: 15 consecutive within 1 sigma (stratification)
    fn rule_fifteen_within_one(&self, dev: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 14..dev.len() {
            let window = &dev[end - 14..=end];
            if window.iter().all(|d| d.abs() < 1.0) {
                out.push(RuleViolation {
                    rule_number: 6,
                    severity: RuleSeverity::Info,
                    points_involved: (end - 14..=end).collect(),
                });
            }
        }
    }

    // Rule 7: 14 consecutive alternating up and down
    fn rule_fourteen_alternating(&self, values: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 13..values.len() {
            let window = &values[end - 13..=end];
            let alternating = window
                .windows(3)
                .all(|w| (w[1] > w[0] && w[1] > w[2]) || (w[1] < w[0] && w[1] < w[2]));
            if alternating {
                out.push(RuleViolation {
                    rule_number: 7,
                    severity: RuleSeverity::Info,
                    points_involved: (end - 13..=end).collect(),
                });
            }
        }
    }

    // Rule 8: 8 consecutive beyond 1 sigma on either side (mixture)
    fn rule_eight_beyond_one_either_side(&self, dev: &[f64], out: &mut Vec<RuleViolation>) {
        for end in 7..dev.len() {
            let window = &dev[end - 7..=end];
            if window.iter().all(|d| d.abs() > 1.0) {
                out.push(RuleViolation {
                    rule_number: 8,
                    severity: RuleSeverity::Warning,
                    points_involved: (end - 7..=end).collect(),
                });
            }
        }
    }
}

/// Fold rule findings into a chart status.
pub fn summarize(violations: &[RuleViolation]) -> SpcStatus {
    if violations
        .iter()
        .any(|v| v.severity == RuleSeverity::Critical)
    {
        SpcStatus::OutOfControl
    } else if violations
        .iter()
        .any(|v| v.severity == RuleSeverity::Warning)
    {
        SpcStatus::Warning
    } else if !violations.is_empty() {
        SpcStatus::Stable
    } else {
        SpcStatus::InControl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> WesternElectricRules {
        WesternElectricRules::new(10.0, 1.0)
    }

    #[test]
    fn test_rule_1_beyond_three_sigma() {
        let values = [10.0, 10.2, 14.0];
        let violations = rules().check_all_rules(&values);
        assert!(violations
            .iter()
            .any(|v| v.rule_number == 1 && v.points_involved == vec![2]));
    }

    #[test]
    fn test_rule_2_two_of_three_beyond_two() {
        let values = [12.5, 10.0, 12.7];
        let violations = rules().check_all_rules(&values);
        assert!(violations.iter().any(|v| v.rule_number == 2));
    }

    #[test]
    fn test_rule_4_eight_same_side() {
        let values = [10.5; 8];
        let violations = rules().check_all_rules(&values);
        let rule4: Vec<_> = violations.iter().filter(|v| v.rule_number == 4).collect();
        assert_eq!(rule4.len(), 1);
        assert_eq!(rule4[0].points_involved, (0..8).collect::<Vec<_>>());
        assert_eq!(rule4[0].severity, RuleSeverity::Warning);
    }

    #[test]
    fn test_rule_5_six_trending() {
        let values = [10.0, 10.1, 10.2, 10.3, 10.4, 10.5];
        let violations = rules().check_all_rules(&values);
        assert!(violations.iter().any(|v| v.rule_number == 5));
    }

    #[test]
    fn test_rule_6_fifteen_within_one_sigma() {
        let values = [10.1; 15];
        let violations = rules().check_all_rules(&values);
        // Same-side run also fires rule 4; rule 6 must be present too
        assert!(violations.iter().any(|v| v.rule_number == 6));
    }

    #[test]
    fn test_rule_7_fourteen_alternating() {
        let values: Vec<f64> = (0..14)
            .map(|i| if i % 2 == 0 { 9.7 } else { 10.3 })
            .collect();
        let violations = rules().check_all_rules(&values);
        assert!(violations.iter().any(|v| v.rule_number == 7));
    }

    #[test]
    fn test_rule_8_mixture() {
        let values: Vec<f64> = (0..8)
            .map(|i| if i % 2 == 0 { 8.5 } else { 11.5 })
            .collect();
        let violations = rules().check_all_rules(&values);
        assert!(violations.iter().any(|v| v.rule_number == 8));
    }

    #[test]
    fn test_quiet_series_has_no_violations() {
        let values = [10.1, 9.8, 10.3, 9.9, 10.0, 9.7, 10.2];
        assert!(rules().check_all_rules(&values).is_empty());
    }

    #[test]
    fn test_summary_severity_ordering() {
        let critical = RuleViolation {
            rule_number: 1,
            severity: RuleSeverity::Critical,
            points_involved: vec![0],
        };
        let warning = RuleViolation {
            rule_number: 4,
            severity: RuleSeverity::Warning,
            points_involved: vec![0],
        };
        let info = RuleViolation {
            rule_number: 6,
            severity: RuleSeverity::Info,
            points_involved: vec![0],
        };

        assert_eq!(summarize(&[]), SpcStatus::InControl);
        assert_eq!(summarize(&[info.clone()]), SpcStatus::Stable);
        assert_eq!(summarize(&[info.clone(), warning.clone()]), SpcStatus::Warning);
        assert_eq!(summarize(&[info, warning, critical]), SpcStatus::OutOfControl);
    }

    #[test]
    fn test_violations_involving_last() {
        let mut values = vec![10.0; 4];
        values.push(14.0);
        let involving = rules().violations_involving_last(&values);
        assert!(involving.iter().any(|v| v.rule_number == 1));

        // The same series with a trailing quiet point: rule 1 exists in the
        // full scan but does not involve the last point
        values.push(10.0);
        let involving = rules().violations_involving_last(&values);
        assert!(involving.is_empty());
    }
}
