//! Stateful session over one or more feeds.
//!
//! A [`Dashboard`] owns the configuration, the delay source and the
//! enrichment cache. Each interaction (picking a stop, moving the threshold)
//! calls [`Dashboard::view`], which re-filters the cached enrichment instead
//! of reloading the feed.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyzers::{
    GroupBy, HourBucket, OnTimeSummary, PerformancePattern, aggregate_patterns,
    arrival_hour_histogram, distinct_route_ids, distinct_stop_ids, filter_poor_performance,
    select_visits, summarize,
};
use crate::cache::EnrichmentCache;
use crate::config::{MAX_THRESHOLD_PERCENT, MIN_THRESHOLD_PERCENT, PipelineConfig};
use crate::delay::DelaySource;
use crate::error::{LoadWarning, PipelineError};
use crate::gtfs::{GtfsTables, InputSource};
use crate::pipeline::{EnrichedVisit, Enrichment, enrich_tables};

/// What the user has picked.
///
/// An unset stop or route falls back to the first value present in the
/// feed, the way a drop-down shows its first entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub stop_id: Option<String>,
    pub route_id: Option<String>,
    pub threshold_percent: f64,
    pub group_by: GroupBy,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            stop_id: None,
            route_id: None,
            threshold_percent: crate::config::DEFAULT_THRESHOLD_PERCENT,
            group_by: GroupBy::default(),
        }
    }
}

/// Everything a renderer needs for one screen.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub source: String,
    pub preview: Vec<EnrichedVisit>,
    pub stop_ids: Vec<String>,
    pub route_ids: Vec<String>,
    pub selected_stop_id: Option<String>,
    pub selected_route_id: Option<String>,
    pub selected_visits: Vec<EnrichedVisit>,
    pub summary: OnTimeSummary,
    pub hour_histogram: Vec<HourBucket>,
    pub group_by: GroupBy,
    pub patterns: Vec<PerformancePattern>,
    pub threshold_percent: f64,
    pub poor_performance: Vec<PerformancePattern>,
    pub warnings: Vec<LoadWarning>,
}

pub struct Dashboard<D> {
    config: PipelineConfig,
    delays: D,
    cache: EnrichmentCache,
}

impl<D: DelaySource> Dashboard<D> {
    pub fn new(config: PipelineConfig, delays: D) -> Self {
        Self {
            config,
            delays,
            cache: EnrichmentCache::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }

    /// Registers freshly uploaded archive bytes, dropping everything cached.
    pub fn upload(&mut self, name: &str, bytes: impl Into<bytes::Bytes>) -> InputSource {
        self.cache.invalidate();
        let source = InputSource::upload(name, bytes);
        info!(source = %source, "New feed uploaded");
        source
    }

    /// Loads and enriches `source`, or returns the cached enrichment.
    pub fn load(&mut self, source: &InputSource) -> Result<Arc<Enrichment>, PipelineError> {
        let Self {
            config,
            delays,
            cache,
        } = self;
        let config = &*config;
        cache.get_or_try_insert_with(source.key(), || {
            let tables = GtfsTables::load(source, config)?;
            Ok(enrich_tables(&tables, config, &mut *delays))
        })
    }

    /// Builds the tables for one screen from the (cached) enrichment.
    #[tracing::instrument(skip_all, fields(source = %source))]
    pub fn view(
        &mut self,
        source: &InputSource,
        selection: &Selection,
    ) -> Result<DashboardView, PipelineError> {
        let threshold = selection.threshold_percent;
        if !(MIN_THRESHOLD_PERCENT..=MAX_THRESHOLD_PERCENT).contains(&threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "threshold {threshold} is outside {MIN_THRESHOLD_PERCENT}-{MAX_THRESHOLD_PERCENT}"
            )));
        }

        let enrichment = self.load(source)?;
        let visits = &enrichment.visits;

        let stop_ids = distinct_stop_ids(visits);
        let route_ids = distinct_route_ids(visits);
        let selected_stop_id = selection
            .stop_id
            .clone()
            .or_else(|| stop_ids.first().cloned());
        let selected_route_id = selection
            .route_id
            .clone()
            .or_else(|| route_ids.first().cloned());

        let selected_visits = select_visits(
            visits,
            selected_stop_id.as_deref(),
            selected_route_id.as_deref(),
        );
        if selected_visits.is_empty() && !visits.is_empty() {
            warn!(
                stop_id = ?selected_stop_id,
                route_id = ?selected_route_id,
                "Selection matches no stop visits"
            );
        }

        let patterns = aggregate_patterns(visits, selection.group_by);
        let poor_performance = filter_poor_performance(&patterns, threshold);

        Ok(DashboardView {
            source: source.to_string(),
            preview: visits.iter().take(self.config.preview_rows).cloned().collect(),
            stop_ids,
            route_ids,
            selected_stop_id,
            selected_route_id,
            selected_visits,
            summary: summarize(visits),
            hour_histogram: arrival_hour_histogram(visits),
            group_by: selection.group_by,
            patterns,
            threshold_percent: threshold,
            poor_performance,
            warnings: enrichment.warnings.clone(),
        })
    }
}
