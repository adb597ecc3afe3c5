//! Statistics derived from a ledger snapshot.
//!
//! All counts are taken over the snapshot handed in; nothing here holds state
//! between calls. Start records (attacks without `hit`) are reconciled against
//! successful hits purely by count:
//!
//! 1. Each successful hit consumes one start record
//! 2. Start records left over are assumed to have missed
//! 3. Real misses are the explicit misses plus the leftover start records

use serde::{Deserialize, Serialize};

use crate::event::{Event, RecordKind};

/// Aggregate statistics over a set of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub attack_count: u64,
    pub dash_count: u64,
    pub successful_hits: u64,
    pub explicit_misses: u64,
    /// Attacks whose `hit` was a boolean.
    pub attacks_with_hit: u64,
    pub started_count: u64,
    pub leftover_started_misses: u64,
    pub real_misses: u64,
    /// `hits / (hits + realMisses)` as a rounded percent.
    pub success_rate: Option<i64>,
    /// `hits / (attacks - hits)` as a rounded percent. Not clamped; may exceed 100.
    pub success_rate_by_user_formula: Option<i64>,
}

/// Computes [`EventStats`] from event snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsEngine {
    exclude_ignored: bool,
}

impl StatsEngine {
    /// Create an engine that counts every event, ignored or not.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip events flagged as ignored before counting.
    pub fn with_exclude_ignored(mut self, exclude: bool) -> Self {
        self.exclude_ignored = exclude;
        self
    }

    pub fn excludes_ignored(&self) -> bool {
        self.exclude_ignored
    }

    /// Compute statistics over a snapshot.
    pub fn compute(&self, events: &[Event]) -> EventStats {
        let mut stats = EventStats::default();

        for event in events {
            if self.exclude_ignored && event.ignored {
                continue;
            }

            if event.is_dash() {
                stats.dash_count += 1;
                continue;
            }

            let Some(attack) = event.as_attack() else {
                continue;
            };
            stats.attack_count += 1;
            match attack.hit() {
                Some(true) => stats.successful_hits += 1,
                Some(false) => stats.explicit_misses += 1,
                None => {}
            }
            if attack.outcome_known() {
                stats.attacks_with_hit += 1;
            }
            if attack.record_kind() == RecordKind::Start {
                stats.started_count += 1;
            }
        }

        stats.leftover_started_misses = stats.started_count.saturating_sub(stats.successful_hits);
        stats.real_misses = stats.explicit_misses + stats.leftover_started_misses;

        stats.success_rate = percent(
            stats.successful_hits,
            stats.successful_hits + stats.real_misses,
        );
        stats.success_rate_by_user_formula = if stats.attack_count > stats.successful_hits {
            percent(
                stats.successful_hits,
                stats.attack_count - stats.successful_hits,
            )
        } else {
            None
        };

        stats
    }
}

/// `numerator / denominator * 100`, rounded half away from zero.
fn percent(numerator: u64, denominator: u64) -> Option<i64> {
    if denominator == 0 {
        return None;
    }
    Some((numerator as f64 / denominator as f64 * 100.0).round() as i64)
}
