// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod error;
pub mod item;

// Clustering core: normalize -> features -> similarity -> assignment
pub mod cluster;
pub mod domain;
pub mod features;
pub mod normalize;
pub mod similarity;

// Outer shell: records, service, sources, HTTP, metrics
pub mod api;
pub mod ingest;
pub mod metrics;
pub mod persist;
pub mod service;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::cluster::{Assignment, ClusterStore, Clusterer, Group, GroupId, MatchReason};
pub use crate::config::ClusterConfig;
pub use crate::error::{ClusterError, ClusterResult};
pub use crate::item::Item;
pub use crate::service::{ClusterService, IngestOutcome};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: `RUST_LOG` (or `default_filter`), compact output,
/// JSON lines when `LOG_FORMAT=json`. Safe to call more than once.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
