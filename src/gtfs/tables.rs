use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::info;

use super::model::{Stop, StopTime, Trip};
use super::source::InputSource;
use super::{REQUIRED_FILES, STOP_TIMES_FILE, STOPS_FILE, TRIPS_FILE};
use crate::config::PipelineConfig;
use crate::error::PipelineError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The three tables of one feed, as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GtfsTables {
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
}

impl GtfsTables {
    #[tracing::instrument(skip_all, fields(source = %source))]
    pub fn load(source: &InputSource, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let members = source.read_members(REQUIRED_FILES, config.max_archive_bytes)?;
        let tables = Self::from_members(&members)?;
        info!(
            stops = tables.stops.len(),
            trips = tables.trips.len(),
            stop_times = tables.stop_times.len(),
            "Loaded GTFS tables"
        );
        Ok(tables)
    }

    /// Parses the tables from file contents keyed by file name.
    pub fn from_members(members: &HashMap<String, Vec<u8>>) -> Result<Self, PipelineError> {
        let member = |name: &str| {
            members
                .get(name)
                .map(Vec::as_slice)
                .ok_or_else(|| PipelineError::missing(name))
        };

        Ok(Self {
            stops: read_table(STOPS_FILE, member(STOPS_FILE)?, Stop::REQUIRED_COLUMNS)?,
            trips: read_table(TRIPS_FILE, member(TRIPS_FILE)?, Trip::REQUIRED_COLUMNS)?,
            stop_times: read_table(
                STOP_TIMES_FILE,
                member(STOP_TIMES_FILE)?,
                StopTime::REQUIRED_COLUMNS,
            )?,
        })
    }
}

/// Deserializes every row of a GTFS CSV file after checking its header.
pub fn read_table<T: DeserializeOwned>(
    file: &str,
    contents: &[u8],
    required_columns: &[&str],
) -> Result<Vec<T>, PipelineError> {
    let contents = contents.strip_prefix(UTF8_BOM).unwrap_or(contents);
    let csv_error = |source| PipelineError::Csv {
        file: file.to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(contents);

    let headers = reader.headers().map_err(csv_error)?;
    for column in required_columns {
        if !headers.iter().any(|h| h == *column) {
            return Err(PipelineError::MissingColumn {
                file: file.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result.map_err(csv_error)?);
    }
    Ok(rows)
}
