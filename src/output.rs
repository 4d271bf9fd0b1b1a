//! Output formatting and persistence for pipeline tables.
//!
//! Supports pretty-printing, JSON serialization, and CSV export (optionally
//! gzip-compressed).

use anyhow::{Result, anyhow};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A row type that can be exported as a CSV table.
///
/// `COLUMNS` must list the serialized field names in declaration order; it
/// is written as the header when the table has no rows.
pub trait TableRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `rows` as a CSV table named `name` under `dir`, returning the
/// path written. With `gzip`, the file gets a `.csv.gz` extension.
pub fn write_table<T: TableRow>(
    dir: &Path,
    name: &str,
    rows: &[T],
    gzip: bool,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = if gzip {
        dir.join(format!("{name}.csv.gz"))
    } else {
        dir.join(format!("{name}.csv"))
    };
    write_csv(&path, rows, gzip)?;
    Ok(path)
}

/// Writes `rows` to `path` as CSV with a header row, replacing any
/// existing file.
pub fn write_csv<T: TableRow>(path: &Path, rows: &[T], gzip: bool) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), gzip, "Writing CSV table");
    let file = File::create(path)?;

    if gzip {
        let encoder = GzEncoder::new(file, Compression::default());
        let encoder = write_rows(encoder, rows, path)?;
        encoder.finish()?;
    } else {
        write_rows(file, rows, path)?;
    }

    info!(path = %path.display(), rows = rows.len(), "Wrote table");
    Ok(())
}

fn write_rows<W: Write, T: TableRow>(sink: W, rows: &[T], path: &Path) -> Result<W> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(sink);
    // Headers are otherwise derived from the first serialized row.
    if rows.is_empty() {
        writer.write_record(T::COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush {}: {}", path.display(), e.error()))
}
