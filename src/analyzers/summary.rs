//! Dashboard-facing views over enriched visits.

use chrono::Timelike;
use std::collections::{BTreeMap, HashSet};

use crate::analyzers::types::{HourBucket, OnTimeSummary};
use crate::analyzers::utility::fraction;
use crate::pipeline::EnrichedVisit;

/// Counts on-time and late visits. Visits with a null delay are late.
pub fn summarize(visits: &[EnrichedVisit]) -> OnTimeSummary {
    let total = visits.len();
    let on_time = visits.iter().filter(|v| v.on_time).count();
    OnTimeSummary {
        total,
        on_time,
        late: total - on_time,
        otp_percentage: fraction(on_time, total).map(|f| f * 100.0),
    }
}

/// Visit counts per scheduled arrival hour, ascending, skipping empty hours.
pub fn arrival_hour_histogram(visits: &[EnrichedVisit]) -> Vec<HourBucket> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for arrival in visits.iter().filter_map(|v| v.arrival_time) {
        *counts.entry(arrival.hour()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(hour, count)| HourBucket { hour, count })
        .collect()
}

pub fn distinct_stop_ids(visits: &[EnrichedVisit]) -> Vec<String> {
    distinct(visits.iter().map(|v| v.stop_id.as_str()))
}

pub fn distinct_route_ids(visits: &[EnrichedVisit]) -> Vec<String> {
    distinct(visits.iter().map(|v| v.route_id.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Visits at `stop_id` on `route_id`; a `None` selection matches anything.
pub fn select_visits(
    visits: &[EnrichedVisit],
    stop_id: Option<&str>,
    route_id: Option<&str>,
) -> Vec<EnrichedVisit> {
    visits
        .iter()
        .filter(|v| stop_id.is_none_or(|s| v.stop_id == s))
        .filter(|v| route_id.is_none_or(|r| v.route_id == r))
        .cloned()
        .collect()
}
