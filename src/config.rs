//! Pipeline knobs: on-time window, simulated delay range, threshold.
//!
//! Stored as a JSON object on disk, every field optional:
//! ```json
//! {
//!   "on_time_window": { "early_seconds": -60, "late_seconds": 300 },
//!   "delay_range": { "min_seconds": -60, "max_seconds": 300 },
//!   "threshold_percent": 80.0
//! }
//! ```
//! Environment variables (`OTP_*`) override the file.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::error::PipelineError;

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 80.0;
/// Threshold slider bounds, in percent.
pub const MIN_THRESHOLD_PERCENT: f64 = 50.0;
pub const MAX_THRESHOLD_PERCENT: f64 = 100.0;
pub const DEFAULT_PREVIEW_ROWS: usize = 5;
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;

/// Closed interval of delays, in seconds, classified as on time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnTimeWindow {
    pub early_seconds: f64,
    pub late_seconds: f64,
}

impl Default for OnTimeWindow {
    fn default() -> Self {
        Self {
            early_seconds: -60.0,
            late_seconds: 300.0,
        }
    }
}

impl OnTimeWindow {
    pub fn contains(&self, delay_seconds: f64) -> bool {
        delay_seconds >= self.early_seconds && delay_seconds <= self.late_seconds
    }
}

/// Half-open range `[min_seconds, max_seconds)` of simulated offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_seconds: i64,
    pub max_seconds: i64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_seconds: -60,
            max_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub on_time_window: OnTimeWindow,
    pub delay_range: DelayRange,
    pub threshold_percent: f64,
    pub preview_rows: usize,
    pub max_archive_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_time_window: OnTimeWindow::default(),
            delay_range: DelayRange::default(),
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Applies `OTP_*` environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, PipelineError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "OTP_ON_TIME_EARLY")? {
            self.on_time_window.early_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "OTP_ON_TIME_LATE")? {
            self.on_time_window.late_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "OTP_DELAY_MIN")? {
            self.delay_range.min_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "OTP_DELAY_MAX")? {
            self.delay_range.max_seconds = v;
        }
        if let Some(v) = parse_var(&lookup, "OTP_THRESHOLD")? {
            self.threshold_percent = v;
        }
        if let Some(v) = parse_var(&lookup, "OTP_MAX_ARCHIVE_BYTES")? {
            self.max_archive_bytes = v;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let window = self.on_time_window;
        if window.early_seconds > window.late_seconds {
            return Err(PipelineError::InvalidConfig(format!(
                "on-time window [{}, {}] is inverted",
                window.early_seconds, window.late_seconds
            )));
        }
        if self.delay_range.min_seconds >= self.delay_range.max_seconds {
            return Err(PipelineError::InvalidConfig(format!(
                "delay range [{}, {}) is empty",
                self.delay_range.min_seconds, self.delay_range.max_seconds
            )));
        }
        if !(MIN_THRESHOLD_PERCENT..=MAX_THRESHOLD_PERCENT).contains(&self.threshold_percent) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold {} is outside {MIN_THRESHOLD_PERCENT}-{MAX_THRESHOLD_PERCENT}",
                self.threshold_percent
            )));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    debug!(key, value = %raw, "Config override from environment");
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| PipelineError::InvalidConfig(format!("{key}={raw:?} is not a valid value")))
}
