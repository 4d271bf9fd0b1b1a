//! Row types for `stops.txt`, `trips.txt` and `stop_times.txt`.
//!
//! Only the columns the pipeline reads are modelled; extra columns in a
//! feed are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_lat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_lon: Option<f64>,
}

impl Stop {
    pub const REQUIRED_COLUMNS: &'static [&'static str] = &["stop_id", "stop_name"];
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
}

impl Trip {
    pub const REQUIRED_COLUMNS: &'static [&'static str] = &["trip_id", "route_id", "service_id"];
}

/// Arrival and departure stay as raw text here; parsing happens during
/// enrichment so a malformed value only nulls its own row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_sequence: Option<u32>,
    pub arrival_time: String,
    pub departure_time: String,
}

impl StopTime {
    pub const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "trip_id",
        "stop_id",
        "arrival_time",
        "departure_time",
        "stop_sequence",
    ];
}
