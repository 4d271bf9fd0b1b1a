//! Tables produced by the analysis stage.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::output::TableRow;

/// Grouping used by [`aggregate_patterns`](super::aggregate_patterns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GroupBy {
    /// One row per stop.
    Stop,
    /// One row per (route, stop) pair.
    #[default]
    RouteStop,
}

/// Delay and on-time rate for one group of stop visits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformancePattern {
    /// Empty when grouping by stop only.
    pub route_id: Option<String>,
    pub stop_id: String,
    /// Mean of non-null delays; `None` if every delay in the group is null.
    pub avg_delay: Option<f64>,
    pub delay_stddev: Option<f64>,
    /// Fraction (0.0-1.0) of visits classified on time.
    pub on_time_percentage: f64,
    pub visit_count: usize,
    pub grade: String,
}

impl TableRow for PerformancePattern {
    const COLUMNS: &'static [&'static str] = &[
        "route_id",
        "stop_id",
        "avg_delay",
        "delay_stddev",
        "on_time_percentage",
        "visit_count",
        "grade",
    ];
}

/// Counts behind the on-time vs late bar chart.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OnTimeSummary {
    pub total: usize,
    pub on_time: usize,
    pub late: usize,
    /// 0-100; `None` when there are no visits.
    pub otp_percentage: Option<f64>,
}

/// Visits whose scheduled arrival falls in `hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub hour: u32,
    pub count: usize,
}
