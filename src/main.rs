//! CLI entry point for the GTFS on-time performance tool.
//!
//! Loads a static GTFS feed from a directory, zip archive or URL, simulates
//! arrivals, and reports on-time performance per stop and route.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtfs_otp::analyzers::GroupBy;
use gtfs_otp::delay::{FixedDelay, UniformDelay};
use gtfs_otp::fetch::{BasicClient, fetch_bytes, is_remote};
use gtfs_otp::gtfs::{GtfsTables, InputSource};
use gtfs_otp::output::{print_json, print_pretty, write_table};
use gtfs_otp::pipeline::enrich_tables;
use gtfs_otp::{Dashboard, DashboardView, LoadWarning, PipelineConfig, Selection};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_otp")]
#[command(about = "On-time performance report for a static GTFS feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate arrivals and report on-time performance
    Analyze {
        /// Feed directory, .zip archive, or http(s) URL of an archive
        #[arg(value_name = "DIR_ZIP_OR_URL")]
        source: String,

        /// Stop to show visits for (defaults to the first stop in the feed)
        #[arg(long)]
        stop: Option<String>,

        /// Route to show visits for (defaults to the first route in the feed)
        #[arg(long)]
        route: Option<String>,

        /// On-time threshold in percent; groups below it are reported
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(50..=100))]
        threshold: Option<u8>,

        /// Aggregate per stop or per route and stop
        #[arg(short, long, value_enum, default_value_t = GroupBy::RouteStop)]
        group_by: GroupBy,

        /// Number of enriched rows to preview
        #[arg(long)]
        preview: Option<usize>,

        /// Seed for the simulated delays (random on every run when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// JSON file with pipeline settings
        #[arg(short, long)]
        config: Option<String>,

        /// Directory to write visits, patterns and poor_performance CSVs to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Gzip compress written CSV files
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Log the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check that a feed loads and report table sizes
    Inspect {
        /// Feed directory, .zip archive, or http(s) URL of an archive
        #[arg(value_name = "DIR_ZIP_OR_URL")]
        source: String,

        /// JSON file with pipeline settings
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_otp.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_otp.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            source,
            stop,
            route,
            threshold,
            group_by,
            preview,
            seed,
            config,
            output_dir,
            gzip,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(rows) = preview {
                config.preview_rows = rows;
            }
            let input = resolve_source(&source).await?;

            let delays = match seed {
                Some(seed) => UniformDelay::seeded(config.delay_range, seed),
                None => UniformDelay::from_entropy(config.delay_range),
            };
            let selection = Selection {
                stop_id: stop,
                route_id: route,
                threshold_percent: threshold
                    .map(f64::from)
                    .unwrap_or(config.threshold_percent),
                group_by,
            };

            let mut dashboard = Dashboard::new(config, delays);
            let view = dashboard.view(&input, &selection)?;
            log_view(&view);

            if json {
                print_json(&view)?;
            }

            if let Some(dir) = output_dir {
                let enrichment = dashboard.load(&input)?;
                write_table(&dir, "visits", &enrichment.visits, gzip)?;
                write_table(&dir, "patterns", &view.patterns, gzip)?;
                write_table(&dir, "poor_performance", &view.poor_performance, gzip)?;
                info!(dir = %dir.display(), "Tables written");
            }
        }
        Commands::Inspect { source, config } => {
            let config = load_config(config.as_deref())?;
            let input = resolve_source(&source).await?;

            let tables = GtfsTables::load(&input, &config)?;
            let enrichment = enrich_tables(&tables, &config, FixedDelay(0));

            info!(
                source = %input,
                stops = tables.stops.len(),
                trips = tables.trips.len(),
                stop_times = tables.stop_times.len(),
                joined = enrichment.visits.len(),
                parse_warnings = enrichment.parse_warnings(),
                "Feed inspected"
            );
            if enrichment.is_empty() {
                warn!("No stop time matched both a trip and a stop");
            }
        }
    }

    Ok(())
}

/// Reads the optional JSON config, then applies `OTP_*` environment overrides.
fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => PipelineConfig::default(),
    };
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Fetches remote archives over HTTP; local paths are read lazily.
#[tracing::instrument(skip_all, fields(source = %source))]
async fn resolve_source(source: &str) -> Result<InputSource> {
    if is_remote(source) {
        let client = BasicClient::new()?;
        let bytes = fetch_bytes(&client, source).await?;
        info!(bytes = bytes.len(), "Downloaded feed archive");
        Ok(InputSource::upload(source, bytes))
    } else {
        Ok(InputSource::from_path(source))
    }
}

fn log_view(view: &DashboardView) {
    for row in &view.preview {
        print_pretty(row);
    }

    info!(
        total = view.summary.total,
        on_time = view.summary.on_time,
        late = view.summary.late,
        otp_percentage = view.summary.otp_percentage,
        "On-time performance"
    );

    for bucket in &view.hour_histogram {
        info!(hour = bucket.hour, count = bucket.count, "Arrivals by hour");
    }

    info!(
        stop_id = ?view.selected_stop_id,
        route_id = ?view.selected_route_id,
        visits = view.selected_visits.len(),
        "Selected stop and route"
    );

    info!(
        threshold = view.threshold_percent,
        groups = view.patterns.len(),
        poor = view.poor_performance.len(),
        group_by = ?view.group_by,
        "Poor performance summary"
    );
    for pattern in &view.poor_performance {
        info!(
            route_id = pattern.route_id.as_deref().unwrap_or(""),
            stop_id = %pattern.stop_id,
            avg_delay = pattern.avg_delay,
            on_time_percentage = pattern.on_time_percentage,
            grade = %pattern.grade,
            "Poor performance"
        );
    }

    let parse_warnings = view
        .warnings
        .iter()
        .filter(|w| matches!(w, LoadWarning::ParseWarning { .. }))
        .count();
    if parse_warnings > 0 {
        warn!(parse_warnings, "Unparseable times were kept as nulls");
    }
    if view.warnings.contains(&LoadWarning::EmptyResult) {
        warn!("Join produced no stop visits; all tables are empty");
    }
}
