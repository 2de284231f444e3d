use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the clustering series.
    /// Fails if a recorder is already installed in this process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("cluster_items_total", "Items run through match-or-create.");
    describe_counter!("cluster_created_total", "Groups founded.");
    describe_counter!(
        "cluster_matched_total",
        "Items assigned to an existing group, by reason."
    );
    describe_counter!(
        "cluster_stale_skipped_total",
        "Candidate groups skipped as stale."
    );
    describe_counter!(
        "cluster_prefilter_skipped_total",
        "Candidate groups skipped by the keyword pre-filter."
    );
    describe_counter!(
        "cluster_scoring_degraded_total",
        "Similarity computations that degraded to 0."
    );
    describe_histogram!("cluster_match_ms", "Time spent finding a match, in milliseconds.");
}
