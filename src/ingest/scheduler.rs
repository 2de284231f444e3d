// src/ingest/scheduler.rs
use crate::ingest::types::PostSource;
use crate::service::ClusterService;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
}

/// Run the ingest pipeline on a fixed interval. The first tick fires immediately.
pub fn spawn_scheduler(
    cfg: IngestSchedulerCfg,
    sources: Vec<Box<dyn PostSource>>,
    service: Arc<ClusterService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = crate::ingest::run_once(&sources, &service).await;
            tracing::info!(
                target: "ingest",
                fetched = report.fetched,
                created = report.created,
                matched = report.matched,
                failed = report.failed,
                source_errors = report.source_errors,
                "scheduled ingest tick"
            );
        }
    })
}
