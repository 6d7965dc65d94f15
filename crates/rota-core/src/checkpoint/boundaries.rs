//! Computes when the next checkpoint boundary falls due.
//!
//! Week starts are Mondays at 00:00 UTC; the 4-week window repeats every 28
//! days from a caller-supplied anchor; block ends are a caller-supplied
//! schedule (block lengths vary, so the core never infers them).

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use std::collections::BTreeSet;

use crate::domain::CheckpointBoundary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueCheckpoint {
    pub boundary: CheckpointBoundary,
    pub at: DateTime<Utc>,
}

pub struct CheckpointScheduler {
    enabled: BTreeSet<CheckpointBoundary>,
    acgme_anchor: DateTime<Utc>,
    block_ends: Vec<DateTime<Utc>>,
}

impl CheckpointScheduler {
    pub fn new(enabled: BTreeSet<CheckpointBoundary>, acgme_anchor: DateTime<Utc>) -> Self {
        Self {
            enabled,
            acgme_anchor,
            block_ends: Vec::new(),
        }
    }

    pub fn from_config(
        config: &crate::config::CheckpointConfig,
        acgme_anchor: DateTime<Utc>,
    ) -> Self {
        Self::new(config.boundaries_enabled.clone(), acgme_anchor)
    }

    /// Supply the block-end instants (sorted internally).
    pub fn with_block_ends(mut self, mut ends: Vec<DateTime<Utc>>) -> Self {
        ends.sort();
        self.block_ends = ends;
        self
    }

    /// Earliest enabled boundary strictly after `now`. Manual checkpoints
    /// are never auto-due.
    pub fn next_due(&self, now: DateTime<Utc>) -> Option<DueCheckpoint> {
        let mut candidates: Vec<DueCheckpoint> = Vec::new();

        if self.enabled.contains(&CheckpointBoundary::WeekStart) {
            candidates.push(DueCheckpoint {
                boundary: CheckpointBoundary::WeekStart,
                at: next_week_start(now),
            });
        }
        if self.enabled.contains(&CheckpointBoundary::AcgmeWindow) {
            candidates.push(DueCheckpoint {
                boundary: CheckpointBoundary::AcgmeWindow,
                at: self.next_acgme_window(now),
            });
        }
        if self.enabled.contains(&CheckpointBoundary::BlockEnd) {
            if let Some(at) = self.block_ends.iter().find(|t| **t > now) {
                candidates.push(DueCheckpoint {
                    boundary: CheckpointBoundary::BlockEnd,
                    at: *at,
                });
            }
        }

        candidates.into_iter().min_by_key(|c| (c.at, c.boundary))
    }

    fn next_acgme_window(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if now < self.acgme_anchor {
            return self.acgme_anchor;
        }
        let elapsed_days = (now - self.acgme_anchor).num_days();
        let windows_passed = elapsed_days / 28 + 1;
        self.acgme_anchor + Duration::days(windows_passed * 28)
    }
}

/// The next Monday 00:00 UTC strictly after `now`.
pub fn next_week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let days_until_monday = (7 - today.weekday().num_days_from_monday()) % 7;
    let mut candidate_date = today + Duration::days(days_until_monday as i64);
    let mut candidate = Utc
        .from_utc_datetime(&candidate_date.and_hms_opt(0, 0, 0).unwrap());
    if candidate <= now {
        candidate_date += Duration::days(7);
        candidate = Utc.from_utc_datetime(&candidate_date.and_hms_opt(0, 0, 0).unwrap());
    }
    candidate
}
