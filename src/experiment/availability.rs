//! Availability Checker - plant/time-window exclusivity
//!
//! Two reservations conflict when they share a plant and their windows
//! overlap. Windows are half-open, `[start, stop)`, so an experiment may
//! start at the instant the previous one on the same plant stops.
//! Experiments in a terminal state hold no plants.

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use super::ExperimentEntry;

/// Half-open interval overlap test.
#[must_use]
pub fn windows_overlap(
    a_start: DateTime<FixedOffset>,
    a_stop: DateTime<FixedOffset>,
    b_start: DateTime<FixedOffset>,
    b_stop: DateTime<FixedOffset>,
) -> bool {
    a_start < b_stop && b_start < a_stop
}

/// Find the first tracked experiment that blocks the candidate reservation.
///
/// The entry whose ID equals `candidate_id` is skipped, so re-checking an
/// already tracked experiment never conflicts with itself.
pub fn find_conflict<'a, I>(
    entries: I,
    candidate_id: &str,
    plants: &[String],
    start: DateTime<FixedOffset>,
    stop: DateTime<FixedOffset>,
) -> Option<&'a ExperimentEntry>
where
    I: IntoIterator<Item = &'a ExperimentEntry>,
{
    entries.into_iter().find(|entry| {
        let record = entry.record();
        record.experiment_id() != candidate_id
            && !entry.state().is_terminal()
            && record.shares_plant(plants)
            && windows_overlap(start, stop, record.start_time(), record.stop_time())
    })
}

/// Whether the plants are free for the whole window.
pub fn is_available<'a, I>(
    entries: I,
    candidate_id: &str,
    plants: &[String],
    start: DateTime<FixedOffset>,
    stop: DateTime<FixedOffset>,
) -> bool
where
    I: IntoIterator<Item = &'a ExperimentEntry>,
{
    match find_conflict(entries, candidate_id, plants, start, stop) {
        None => true,
        Some(blocking) => {
            let record = blocking.record();
            warn!(
                experiment_id = candidate_id,
                blocking_id = record.experiment_id(),
                blocking_start = %record.start_time(),
                blocking_stop = %record.stop_time(),
                "Overlapping time window with another experiment using the same plants"
            );
            false
        }
    }
}
