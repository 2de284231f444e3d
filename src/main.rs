//! storyclust service: binary entrypoint.
//! Boots the clustering service, the optional ingest scheduler and the Axum HTTP server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use storyclust::api::{self, AppState};
use storyclust::config::ClusterConfig;
use storyclust::ingest::config::IngestConfig;
use storyclust::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use storyclust::metrics::Metrics;
use storyclust::service::ClusterService;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOG_FILTER: &str = "storyclust=info,cluster=info,ingest=info,warn";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    storyclust::init_tracing(DEFAULT_LOG_FILTER);

    let cfg = ClusterConfig::load_default().context("loading clustering config")?;
    info!(
        threshold = cfg.clustering.similarity_threshold,
        stale_after_hours = cfg.clustering.stale_after_hours,
        "clustering config loaded"
    );
    let service = Arc::new(ClusterService::in_memory(&cfg)?);

    let ingest_cfg = IngestConfig::from_env()?;
    let sources = ingest_cfg.build_sources()?;
    if sources.is_empty() {
        info!(target: "ingest", "no sources configured, scheduler disabled");
    } else {
        info!(
            target: "ingest",
            sources = sources.len(),
            interval_secs = ingest_cfg.interval_secs,
            "starting ingest scheduler"
        );
        spawn_scheduler(
            IngestSchedulerCfg {
                interval_secs: ingest_cfg.interval_secs,
            },
            sources,
            service.clone(),
        );
    }

    let mut router = api::create_router(AppState {
        service: service.clone(),
    });
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => warn!(error = ?e, "metrics disabled"),
    }

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, router).await.context("http server")?;
    Ok(())
}
