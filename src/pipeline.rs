//! Join, simulate, classify.
//!
//! [`load_and_enrich`] turns the three raw tables into one [`EnrichedVisit`]
//! per scheduled stop visit that resolves to a known trip and stop.

use chrono::{Duration, NaiveDateTime};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{OnTimeWindow, PipelineConfig};
use crate::delay::DelaySource;
use crate::error::LoadWarning;
use crate::gtfs::time::parse_gtfs_time;
use crate::gtfs::{GtfsTables, Stop, StopTime, Trip};
use crate::output::TableRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedVisit {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: Option<u32>,
    pub route_id: String,
    pub service_id: String,
    pub stop_name: String,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub arrival_time: Option<NaiveDateTime>,
    pub departure_time: Option<NaiveDateTime>,
    pub actual_arrival_time: Option<NaiveDateTime>,
    pub delay_seconds: Option<f64>,
    pub on_time: bool,
}

impl TableRow for EnrichedVisit {
    const COLUMNS: &'static [&'static str] = &[
        "trip_id",
        "stop_id",
        "stop_sequence",
        "route_id",
        "service_id",
        "stop_name",
        "stop_lat",
        "stop_lon",
        "arrival_time",
        "departure_time",
        "actual_arrival_time",
        "delay_seconds",
        "on_time",
    ];
}

/// Output of one enrichment run.
///
/// An empty join is not an error: `visits` is empty and `warnings`
/// contains [`LoadWarning::EmptyResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enrichment {
    pub visits: Vec<EnrichedVisit>,
    pub warnings: Vec<LoadWarning>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn parse_warnings(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, LoadWarning::ParseWarning { .. }))
            .count()
    }
}

/// Stop ids are compared as trimmed text on both sides of the join.
fn stop_key(stop_id: &str) -> &str {
    stop_id.trim()
}

/// Inner-joins stop times with trips and stops, then simulates arrivals.
///
/// One offset is drawn from `delays` per joined row, in row order, even
/// when the scheduled arrival is null.
#[tracing::instrument(skip_all, fields(
    stops = stops.len(),
    stop_times = stop_times.len(),
    trips = trips.len()
))]
pub fn load_and_enrich<D: DelaySource>(
    stops: &[Stop],
    stop_times: &[StopTime],
    trips: &[Trip],
    window: &OnTimeWindow,
    mut delays: D,
) -> Enrichment {
    let mut trips_by_id: FxHashMap<&str, Vec<&Trip>> = FxHashMap::default();
    for trip in trips {
        trips_by_id.entry(trip.trip_id.trim()).or_default().push(trip);
    }
    let mut stops_by_id: FxHashMap<&str, Vec<&Stop>> = FxHashMap::default();
    for stop in stops {
        stops_by_id.entry(stop_key(&stop.stop_id)).or_default().push(stop);
    }

    let mut enrichment = Enrichment::default();
    let mut dropped = 0usize;

    for (index, stop_time) in stop_times.iter().enumerate() {
        let (Some(matched_trips), Some(matched_stops)) = (
            trips_by_id.get(stop_time.trip_id.trim()),
            stops_by_id.get(stop_key(&stop_time.stop_id)),
        ) else {
            dropped += 1;
            continue;
        };

        let row = index + 1;
        let arrival =
            parse_time_column(row, "arrival_time", &stop_time.arrival_time, &mut enrichment);
        let departure = parse_time_column(
            row,
            "departure_time",
            &stop_time.departure_time,
            &mut enrichment,
        );

        for trip in matched_trips {
            for stop in matched_stops {
                let offset = delays.next_offset();
                let actual = arrival.and_then(|t| t.checked_add_signed(Duration::seconds(offset)));
                let delay_seconds = match (arrival, actual) {
                    (Some(scheduled), Some(actual)) => {
                        Some((actual - scheduled).num_milliseconds() as f64 / 1000.0)
                    }
                    _ => None,
                };

                enrichment.visits.push(EnrichedVisit {
                    trip_id: trip.trip_id.clone(),
                    stop_id: stop_key(&stop.stop_id).to_string(),
                    stop_sequence: stop_time.stop_sequence,
                    route_id: trip.route_id.clone(),
                    service_id: trip.service_id.clone(),
                    stop_name: stop.stop_name.clone(),
                    stop_lat: stop.stop_lat,
                    stop_lon: stop.stop_lon,
                    arrival_time: arrival,
                    departure_time: departure,
                    actual_arrival_time: actual,
                    delay_seconds,
                    on_time: delay_seconds.is_some_and(|d| window.contains(d)),
                });
            }
        }
    }

    if enrichment.visits.is_empty() {
        warn!(dropped, "Join produced no stop visits");
        enrichment.warnings.push(LoadWarning::EmptyResult);
    }

    info!(
        visits = enrichment.visits.len(),
        dropped,
        parse_warnings = enrichment.parse_warnings(),
        "Enriched stop visits"
    );
    enrichment
}

/// Runs [`load_and_enrich`] over loaded tables with the configured window.
pub fn enrich_tables<D: DelaySource>(
    tables: &GtfsTables,
    config: &PipelineConfig,
    delays: D,
) -> Enrichment {
    load_and_enrich(
        &tables.stops,
        &tables.stop_times,
        &tables.trips,
        &config.on_time_window,
        delays,
    )
}

fn parse_time_column(
    row: usize,
    column: &str,
    value: &str,
    enrichment: &mut Enrichment,
) -> Option<NaiveDateTime> {
    let parsed = parse_gtfs_time(value);
    // Blank times are legitimately absent; only non-empty junk is warned about.
    if parsed.is_none() && !value.trim().is_empty() {
        debug!(row, column, value, "Unparseable time, keeping null");
        enrichment.warnings.push(LoadWarning::ParseWarning {
            row,
            column: column.to_string(),
            value: value.to_string(),
        });
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::{FixedDelay, ScriptedDelay};

    fn stop(id: &str, name: &str) -> Stop {
        Stop {
            stop_id: id.to_string(),
            stop_name: name.to_string(),
            stop_lat: None,
            stop_lon: None,
        }
    }

    fn trip(id: &str, route: &str) -> Trip {
        Trip {
            trip_id: id.to_string(),
            route_id: route.to_string(),
            service_id: "WKDY".to_string(),
        }
    }

    fn stop_time(trip_id: &str, stop_id: &str, arrival: &str) -> StopTime {
        StopTime {
            trip_id: trip_id.to_string(),
            stop_id: stop_id.to_string(),
            stop_sequence: Some(1),
            arrival_time: arrival.to_string(),
            departure_time: arrival.to_string(),
        }
    }

    #[test]
    fn test_single_visit_with_forced_offset() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[stop_time("T1", "S1", "08:00:00")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(120),
        );

        assert_eq!(result.visits.len(), 1);
        let visit = &result.visits[0];
        assert_eq!(visit.route_id, "R1");
        assert_eq!(visit.stop_name, "Main St");
        assert_eq!(visit.delay_seconds, Some(120.0));
        assert!(visit.on_time);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_window_boundaries() {
        let times = vec![stop_time("T1", "S1", "08:00:00"); 4];
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &times,
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            ScriptedDelay::new(vec![-60, 300, -61, 301]),
        );

        let flags: Vec<_> = result.visits.iter().map(|v| v.on_time).collect();
        assert_eq!(flags, vec![true, true, false, false]);
        for visit in &result.visits {
            let delay = visit.delay_seconds.unwrap();
            assert_eq!(visit.on_time, (-60.0..=300.0).contains(&delay));
        }
    }

    #[test]
    fn test_unmatched_rows_are_dropped() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[
                stop_time("T1", "S1", "08:00:00"),
                stop_time("T9", "S1", "08:05:00"),
                stop_time("T1", "S9", "08:10:00"),
            ],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );

        assert_eq!(result.visits.len(), 1);
        assert_eq!(result.visits[0].trip_id, "T1");
        assert_eq!(result.visits[0].stop_id, "S1");
    }

    #[test]
    fn test_stop_ids_match_after_trimming() {
        let result = load_and_enrich(
            &[stop(" 1001", "Main St")],
            &[stop_time("T1", "1001 ", "08:00:00")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );
        assert_eq!(result.visits.len(), 1);
        assert_eq!(result.visits[0].stop_id, "1001");
    }

    #[test]
    fn test_malformed_arrival_is_null_and_late() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[stop_time("T1", "S1", "25:99:99")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );

        let visit = &result.visits[0];
        assert_eq!(visit.arrival_time, None);
        assert_eq!(visit.actual_arrival_time, None);
        assert_eq!(visit.delay_seconds, None);
        assert!(!visit.on_time);
        assert_eq!(result.parse_warnings(), 2);
        assert!(result.warnings.contains(&LoadWarning::ParseWarning {
            row: 1,
            column: "arrival_time".to_string(),
            value: "25:99:99".to_string(),
        }));
    }

    #[test]
    fn test_blank_arrival_is_null_without_warning() {
        let mut row = stop_time("T1", "S1", "");
        row.departure_time = "08:00:00".to_string();
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[row],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );
        assert_eq!(result.visits[0].delay_seconds, None);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_join_is_flagged() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[stop_time("T1", "S2", "08:00:00")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );
        assert!(result.is_empty());
        assert_eq!(result.warnings, vec![LoadWarning::EmptyResult]);
    }

    #[test]
    fn test_duplicate_reference_keys_fan_out() {
        let result = load_and_enrich(
            &[stop("S1", "Main St"), stop("S1", "Main St (dup)")],
            &[stop_time("T1", "S1", "08:00:00")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );
        assert_eq!(result.visits.len(), 2);
    }

    #[test]
    fn test_actual_time_crosses_midnight() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[stop_time("T1", "S1", "23:59:00")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(120),
        );
        assert_eq!(result.visits[0].delay_seconds, Some(120.0));
    }

    #[test]
    fn test_columns_match_serialized_header() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[stop_time("T1", "S1", "08:00:00")],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            FixedDelay(0),
        );
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&result.visits[0]).unwrap();
        let written = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(written.lines().next(), Some(EnrichedVisit::COLUMNS.join(",").as_str()));
    }

    #[test]
    fn test_one_draw_per_row_even_when_null() {
        let result = load_and_enrich(
            &[stop("S1", "Main St")],
            &[
                stop_time("T1", "S1", "bad"),
                stop_time("T1", "S1", "08:00:00"),
            ],
            &[trip("T1", "R1")],
            &OnTimeWindow::default(),
            ScriptedDelay::new(vec![999, 30]),
        );
        assert_eq!(result.visits[1].delay_seconds, Some(30.0));
    }
}
