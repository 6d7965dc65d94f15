//! Builds daily time series out of assignment sets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use rota_core::{Assignment, SchedulingContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesAggregation {
    /// Number of assignments per day
    Count,
    /// Total assigned hours per day
    Hours,
    /// 1.0 when anything is scheduled, else 0.0
    Binary,
    /// Distinct people working per day
    UniquePeople,
}

/// A contiguous daily series starting at `start_date`; days without
/// assignments hold zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub start_date: NaiveDate,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Aggregate assignments into a daily series over `[start, end]`.
pub fn build_daily_series(
    assignments: &[Assignment],
    ctx: &SchedulingContext,
    aggregation: SeriesAggregation,
    start: NaiveDate,
    end: NaiveDate,
) -> TimeSeries {
    let mut counts: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut people: BTreeMap<NaiveDate, BTreeSet<Uuid>> = BTreeMap::new();

    for assignment in assignments {
        let date = match ctx.block(assignment.block_id) {
            Some(block) => block.date,
            None => continue,
        };
        if date < start || date > end {
            continue;
        }
        *counts.entry(date).or_insert(0.0) += 1.0;
        *hours.entry(date).or_insert(0.0) += assignment.hours;
        people.entry(date).or_default().insert(assignment.person_id);
    }

    let mut values = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let value = match aggregation {
            SeriesAggregation::Count => counts.get(&cursor).copied().unwrap_or(0.0),
            SeriesAggregation::Hours => hours.get(&cursor).copied().unwrap_or(0.0),
            SeriesAggregation::Binary => {
                if counts.contains_key(&cursor) {
                    1.0
                } else {
                    0.0
                }
            }
            SeriesAggregation::UniquePeople => {
                people.get(&cursor).map(|s| s.len() as f64).unwrap_or(0.0)
            }
        };
        values.push(value);
        cursor += chrono::Duration::days(1);
    }

    TimeSeries {
        start_date: start,
        values,
    }
}
