// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::error::ClusterError;
use crate::ingest::types::PostSource;
use crate::item::Item;
use crate::service::{ClusterService, IngestOutcome};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_fetched_total", "Posts parsed from sources.");
        describe_counter!(
            "ingest_duplicates_total",
            "Posts skipped because their id was already clustered."
        );
        describe_counter!("ingest_invalid_total", "Posts rejected as invalid input.");
        describe_counter!(
            "ingest_failed_total",
            "Valid posts that could not be clustered or stored."
        );
        describe_counter!("ingest_runs_total", "Completed ingest pipeline runs.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Source fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Listing parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when the ingest pipeline last ran.");
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub created: usize,
    pub matched: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// Valid posts lost to a repository or store failure.
    pub failed: usize,
    pub source_errors: usize,
}

/// Oldest first; equal timestamps keep fetch order.
pub fn order_for_clustering(items: &mut [Item]) {
    items.sort_by_key(|it| it.created_at);
}

/// Fetch from every source once and feed the posts through the service.
/// A failing source is logged and skipped; the others still run.
pub async fn run_once(sources: &[Box<dyn PostSource>], service: &ClusterService) -> IngestReport {
    ensure_metrics_described();
    let mut report = IngestReport::default();

    let mut items = Vec::new();
    for s in sources {
        match s.fetch_latest().await {
            Ok(mut v) => items.append(&mut v),
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = s.name(), "source error");
                counter!("ingest_provider_errors_total").increment(1);
                report.source_errors += 1;
            }
        }
    }
    report.fetched = items.len();
    order_for_clustering(&mut items);

    for item in items {
        let id = item.id.clone();
        match service.ingest(item) {
            Ok(IngestOutcome::Created { .. }) => report.created += 1,
            Ok(IngestOutcome::Matched { .. }) => report.matched += 1,
            Ok(IngestOutcome::Duplicate { .. }) => report.duplicates += 1,
            Err(e) if e.downcast_ref::<ClusterError>().is_some() => {
                tracing::debug!(target: "ingest", post = %id, error = %e, "invalid post skipped");
                counter!("ingest_invalid_total").increment(1);
                report.invalid += 1;
            }
            Err(e) => {
                tracing::warn!(target: "ingest", post = %id, error = ?e, "clustering failed");
                counter!("ingest_failed_total").increment(1);
                report.failed += 1;
            }
        }
    }

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    gauge!("ingest_last_run_ts").set(now as f64);
    counter!("ingest_runs_total").increment(1);
    tracing::info!(
        target: "ingest",
        fetched = report.fetched,
        created = report.created,
        matched = report.matched,
        duplicates = report.duplicates,
        failed = report.failed,
        "ingest run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn ordering_is_stable_by_creation_time() {
        let t = |s| Utc.timestamp_opt(s, 0).unwrap();
        let mut items = vec![
            Item::new("late", "x").with_created_at(t(20)),
            Item::new("tie-a", "x").with_created_at(t(10)),
            Item::new("tie-b", "x").with_created_at(t(10)),
        ];
        order_for_clustering(&mut items);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["tie-a", "tie-b", "late"]);
    }
}
