//! On-time performance aggregation and grading.
//!
//! This module groups enriched stop visits by stop or by route and stop,
//! computes mean delay and on-time rate per group, assigns letter grades,
//! and derives the summary tables a dashboard renders.

pub mod aggregate;
pub mod grade;
pub mod summary;
pub mod types;
pub mod utility;

pub use aggregate::{aggregate_patterns, filter_poor_performance};
pub use summary::{
    arrival_hour_histogram, distinct_route_ids, distinct_stop_ids, select_visits, summarize,
};
pub use types::{GroupBy, HourBucket, OnTimeSummary, PerformancePattern};
