//! Error and warning types for loading and enriching a GTFS feed.
//!
//! [`PipelineError`] aborts a load attempt. [`LoadWarning`] is carried on a
//! successful result and never stops the pipeline.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing required input: {name}")]
    MissingInput { name: String },

    #[error("invalid zip archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    #[error("archive uncompressed size {size} bytes exceeds limit {limit} bytes")]
    ArchiveTooLarge { size: u64, limit: u64 },

    #[error("{file} is missing required column {column:?}")]
    MissingColumn { file: String, column: String },

    #[error("failed to parse {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn missing(name: &str) -> Self {
        PipelineError::MissingInput {
            name: name.to_string(),
        }
    }
}

/// A non-fatal condition noticed while enriching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    /// The join produced zero rows. Downstream stages see an empty table.
    EmptyResult,
    /// A time value that did not parse as `HH:MM:SS`; the row keeps a null.
    ParseWarning {
        row: usize,
        column: String,
        value: String,
    },
}
