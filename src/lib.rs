pub mod analyzers;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod delay;
pub mod error;
pub mod fetch;
pub mod gtfs;
pub mod output;
pub mod pipeline;

pub use config::PipelineConfig;
pub use dashboard::{Dashboard, DashboardView, Selection};
pub use error::{LoadWarning, PipelineError};
pub use pipeline::{EnrichedVisit, Enrichment, load_and_enrich};
