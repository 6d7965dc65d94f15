//! Shared per-person timeline machinery for regulatory rules.
//!
//! Tier-1 rules all reason about a person's calendar: rolling hour windows,
//! consecutive worked days, duty chains. Building the timeline once keeps
//! every rule a linear scan.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::domain::{ActivityType, Assignment, BlockPeriod, SchedulingContext};

/// Aggregated load for one person on one calendar day.
#[derive(Debug, Clone, Default)]
pub struct DayLoad {
    pub hours: f64,
    pub night_float: bool,
    /// A 24h block spills into the next morning and can chain duty periods.
    pub overnight: bool,
    /// Templates worked this day, in period order (used for continuity).
    pub templates: Vec<Uuid>,
    pub periods: BTreeSet<BlockPeriod>,
}

/// Day-indexed load map for one person.
#[derive(Debug, Clone, Default)]
pub struct PersonTimeline {
    pub days: BTreeMap<NaiveDate, DayLoad>,
}

impl PersonTimeline {
    pub fn worked(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }
}

/// Build per-person timelines from an assignment set.
///
/// Assignments referencing unknown blocks or templates are skipped; the
/// engine validates references before rules run.
pub fn build_timelines(
    assignments: &[Assignment],
    ctx: &SchedulingContext,
) -> BTreeMap<Uuid, PersonTimeline> {
    let mut timelines: BTreeMap<Uuid, PersonTimeline> = BTreeMap::new();

    let mut ordered: Vec<&Assignment> = assignments.iter().collect();
    ordered.sort_by_key(|a| {
        let block = ctx.block(a.block_id);
        (
            a.person_id,
            block.map(|b| (b.date, b.period)),
            a.block_id,
        )
    });

    for assignment in ordered {
        let (block, template) = match (
            ctx.block(assignment.block_id),
            ctx.template(assignment.template_id),
        ) {
            (Some(b), Some(t)) => (b, t),
            _ => continue,
        };

        let timeline = timelines.entry(assignment.person_id).or_default();
        let day = timeline.days.entry(block.date).or_default();
        day.hours += assignment.hours;
        day.night_float |= template.activity_type == ActivityType::NightFloat;
        day.overnight |= block.period.is_overnight();
        day.templates.push(assignment.template_id);
        day.periods.insert(block.period);
    }

    timelines
}

/// Worst rolling window of `window_days` by summed hours.
///
/// Returns `(window_start, total_hours)` for the heaviest window, or `None`
/// for an empty timeline.
pub fn worst_rolling_window(
    timeline: &PersonTimeline,
    window_days: i64,
) -> Option<(NaiveDate, f64)> {
    let first = timeline.first_day()?;
    let last = timeline.last_day()?;

    let mut worst: Option<(NaiveDate, f64)> = None;
    let mut start = first;
    while start <= last {
        let end = start + chrono::Duration::days(window_days - 1);
        let total: f64 = timeline
            .days
            .range(start..=end)
            .map(|(_, load)| load.hours)
            .sum();
        if worst.map(|(_, t)| total > t).unwrap_or(true) {
            worst = Some((start, total));
        }
        start += chrono::Duration::days(1);
    }
    worst
}

/// Longest run of consecutive worked calendar days.
///
/// Returns `(run_start, run_length)`; `(first_day, 0)` never occurs because
/// an empty timeline returns `None`.
pub fn longest_worked_run(timeline: &PersonTimeline) -> Option<(NaiveDate, u32)> {
    let mut best: Option<(NaiveDate, u32)> = None;
    let mut run_start: Option<NaiveDate> = None;
    let mut run_len: u32 = 0;
    let mut prev: Option<NaiveDate> = None;

    for date in timeline.days.keys() {
        match prev {
            Some(p) if *date == p + chrono::Duration::days(1) => {
                run_len += 1;
            }
            _ => {
                run_start = Some(*date);
                run_len = 1;
            }
        }
        prev = Some(*date);
        if best.map(|(_, l)| run_len > l).unwrap_or(true) {
            best = Some((run_start.unwrap(), run_len));
        }
    }
    best
}

/// Longest run of consecutive night-float days.
pub fn longest_night_float_run(timeline: &PersonTimeline) -> Option<(NaiveDate, u32)> {
    let mut best: Option<(NaiveDate, u32)> = None;
    let mut run_start: Option<NaiveDate> = None;
    let mut run_len: u32 = 0;
    let mut prev: Option<NaiveDate> = None;

    for (date, load) in &timeline.days {
        if !load.night_float {
            prev = None;
            run_len = 0;
            continue;
        }
        match prev {
            Some(p) if *date == p + chrono::Duration::days(1) => {
                run_len += 1;
            }
            _ => {
                run_start = Some(*date);
                run_len = 1;
            }
        }
        prev = Some(*date);
        if best.map(|(_, l)| run_len > l).unwrap_or(true) {
            best = Some((run_start.unwrap(), run_len));
        }
    }
    best
}

/// Longest continuous duty chain in hours.
///
/// Hours on the same day chain together; an overnight (24h) block also
/// chains into the following worked day. A calendar gap breaks the chain.
pub fn longest_duty_chain(timeline: &PersonTimeline) -> f64 {
    let mut longest: f64 = 0.0;
    let mut chain: f64 = 0.0;
    let mut prev: Option<(NaiveDate, bool)> = None;

    for (date, load) in &timeline.days {
        let continues = matches!(
            prev,
            Some((p, overnight)) if overnight && *date == p + chrono::Duration::days(1)
        );
        if continues {
            chain += load.hours;
        } else {
            chain = load.hours;
        }
        longest = longest.max(chain);
        prev = Some((*date, load.overnight));
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{daily_blocks, small_context, BLOCKS_PER_DAY};
    use crate::domain::Assignment;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_timeline_aggregates_hours_per_day() {
        let ctx = small_context(2, 4);
        let person = ctx.residents()[0].id;
        let template = ctx.templates()[0].id;
        let blocks = daily_blocks(&ctx);

        // Two blocks on day 0 (AM + PM)
        let assignments = vec![
            Assignment {
                person_id: person,
                block_id: blocks[0][0].id,
                template_id: template,
                hours: 6.0,
            },
            Assignment {
                person_id: person,
                block_id: blocks[0][1].id,
                template_id: template,
                hours: 6.0,
            },
        ];

        let timelines = build_timelines(&assignments, &ctx);
        let timeline = &timelines[&person];
        assert_eq!(timeline.days.len(), 1);
        let load = timeline.days.values().next().unwrap();
        assert!((load.hours - 12.0).abs() < 1e-9);
        assert_eq!(load.templates.len(), 2);
        assert_eq!(BLOCKS_PER_DAY, 2);
    }

    #[test]
    fn test_worst_rolling_window_empty() {
        let timeline = PersonTimeline::default();
        assert!(worst_rolling_window(&timeline, 28).is_none());
    }

    #[test]
    fn test_worst_rolling_window_sums_only_in_window() {
        let mut timeline = PersonTimeline::default();
        timeline.days.insert(
            date(1),
            DayLoad {
                hours: 10.0,
                ..Default::default()
            },
        );
        timeline.days.insert(
            date(2),
            DayLoad {
                hours: 10.0,
                ..Default::default()
            },
        );
        // Out of any 2-day window with the first two
        timeline.days.insert(
            date(20),
            DayLoad {
                hours: 5.0,
                ..Default::default()
            },
        );

        let (start, total) = worst_rolling_window(&timeline, 2).unwrap();
        assert_eq!(start, date(1));
        assert!((total - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_longest_worked_run_detects_break() {
        let mut timeline = PersonTimeline::default();
        for d in [1, 2, 3, 5, 6, 7, 8] {
            timeline.days.insert(date(d), DayLoad::default());
        }
        let (start, len) = longest_worked_run(&timeline).unwrap();
        assert_eq!(start, date(5));
        assert_eq!(len, 4);
    }

    #[test]
    fn test_night_float_run_ignores_day_shifts() {
        let mut timeline = PersonTimeline::default();
        for d in 1..=5 {
            timeline.days.insert(
                date(d),
                DayLoad {
                    night_float: d != 3,
                    ..Default::default()
                },
            );
        }
        let (start, len) = longest_night_float_run(&timeline).unwrap();
        assert_eq!(len, 2);
        assert!(start == date(1) || start == date(4));
    }

    #[test]
    fn test_duty_chain_links_overnight_blocks() {
        let mut timeline = PersonTimeline::default();
        timeline.days.insert(
            date(1),
            DayLoad {
                hours: 24.0,
                overnight: true,
                ..Default::default()
            },
        );
        timeline.days.insert(
            date(2),
            DayLoad {
                hours: 6.0,
                ..Default::default()
            },
        );
        // Gap, then an isolated day
        timeline.days.insert(
            date(4),
            DayLoad {
                hours: 12.0,
                ..Default::default()
            },
        );

        assert!((longest_duty_chain(&timeline) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_duty_chain_without_overnight_does_not_link_days() {
        let mut timeline = PersonTimeline::default();
        timeline.days.insert(
            date(1),
            DayLoad {
                hours: 12.0,
                ..Default::default()
            },
        );
        timeline.days.insert(
            date(2),
            DayLoad {
                hours: 12.0,
                ..Default::default()
            },
        );
        assert!((longest_duty_chain(&timeline) - 12.0).abs() < 1e-9);
    }
}
