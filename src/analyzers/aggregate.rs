use std::collections::BTreeMap;
use tracing::debug;

use crate::analyzers::grade::grade;
use crate::analyzers::types::{GroupBy, PerformancePattern};
use crate::analyzers::utility::{fraction, mean, stddev};
use crate::pipeline::EnrichedVisit;

#[derive(Default)]
struct GroupSeries {
    delays: Vec<f64>,
    on_time: usize,
    visits: usize,
}

/// Aggregates enriched visits into one [`PerformancePattern`] per group.
///
/// Mean delay ignores null delays. The on-time rate counts every visit in
/// the group, so visits with a null delay count as not on time. Rows come
/// back sorted by group key; empty input yields an empty table.
pub fn aggregate_patterns(visits: &[EnrichedVisit], group_by: GroupBy) -> Vec<PerformancePattern> {
    let mut groups: BTreeMap<(Option<&str>, &str), GroupSeries> = BTreeMap::new();

    for visit in visits {
        let route = match group_by {
            GroupBy::Stop => None,
            GroupBy::RouteStop => Some(visit.route_id.as_str()),
        };
        let series = groups.entry((route, visit.stop_id.as_str())).or_default();

        series.visits += 1;
        if visit.on_time {
            series.on_time += 1;
        }
        if let Some(delay) = visit.delay_seconds {
            series.delays.push(delay);
        }
    }

    let patterns: Vec<PerformancePattern> = groups
        .into_iter()
        .map(|((route_id, stop_id), series)| {
            let on_time_percentage = fraction(series.on_time, series.visits).unwrap_or(0.0);
            let (avg_delay, delay_stddev) = if series.delays.is_empty() {
                (None, None)
            } else {
                let avg = mean(&series.delays);
                (Some(avg), Some(stddev(&series.delays, avg)))
            };

            PerformancePattern {
                route_id: route_id.map(str::to_string),
                stop_id: stop_id.to_string(),
                avg_delay,
                delay_stddev,
                on_time_percentage,
                visit_count: series.visits,
                grade: grade(on_time_percentage),
            }
        })
        .collect();

    debug!(groups = patterns.len(), ?group_by, "Aggregated performance patterns");
    patterns
}

/// Returns the patterns whose on-time rate is strictly below
/// `threshold_percent / 100`.
pub fn filter_poor_performance(
    patterns: &[PerformancePattern],
    threshold_percent: f64,
) -> Vec<PerformancePattern> {
    let cutoff = threshold_percent / 100.0;
    patterns
        .iter()
        .filter(|p| p.on_time_percentage < cutoff)
        .cloned()
        .collect()
}
