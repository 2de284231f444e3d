// src/ingest/config.rs
use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::ingest::providers::reddit::{RedditListingSource, DEFAULT_USER_AGENT};
use crate::ingest::providers::sample::JsonFileSource;
use crate::ingest::types::PostSource;

pub const ENV_SUBREDDITS: &str = "INGEST_SUBREDDITS";
pub const ENV_LIMIT: &str = "INGEST_LIMIT";
pub const ENV_INTERVAL_SECS: &str = "INGEST_INTERVAL_SECS";
pub const ENV_FIXTURE_PATH: &str = "INGEST_FIXTURE_PATH";
pub const ENV_USER_AGENT: &str = "INGEST_USER_AGENT";

const DEFAULT_LIMIT: u32 = 25;
const DEFAULT_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub subreddits: Vec<String>,
    pub limit: u32,
    pub interval_secs: u64,
    pub fixture_path: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            subreddits: Vec::new(),
            limit: DEFAULT_LIMIT,
            interval_secs: DEFAULT_INTERVAL_SECS,
            fixture_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Comma/whitespace separated list, `r/` prefixes dropped, duplicates removed.
pub fn parse_subreddits(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let s = s.trim().trim_start_matches("r/");
        if !s.is_empty() && !out.iter().any(|x| x.eq_ignore_ascii_case(s)) {
            out.push(s.to_string());
        }
    }
    out
}

impl IngestConfig {
    /// Read the ingest settings from env. Unset values keep their defaults; set but
    /// unparsable values are errors.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var(ENV_SUBREDDITS) {
            cfg.subreddits = parse_subreddits(&raw);
        }
        if let Ok(raw) = std::env::var(ENV_LIMIT) {
            cfg.limit = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("{ENV_LIMIT} must be a positive integer, got `{raw}`"))?;
        }
        if let Ok(raw) = std::env::var(ENV_INTERVAL_SECS) {
            cfg.interval_secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| anyhow!("{ENV_INTERVAL_SECS} must be > 0, got `{raw}`"))?;
        }
        if let Ok(p) = std::env::var(ENV_FIXTURE_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_FIXTURE_PATH} points to non-existent path"));
            }
            cfg.fixture_path = Some(pb);
        }
        if let Ok(ua) = std::env::var(ENV_USER_AGENT) {
            if !ua.trim().is_empty() {
                cfg.user_agent = ua.trim().to_string();
            }
        }
        Ok(cfg)
    }

    /// One listing source per subreddit, plus the sample file if configured.
    pub fn build_sources(&self) -> Result<Vec<Box<dyn PostSource>>> {
        let mut out: Vec<Box<dyn PostSource>> = Vec::new();
        for s in &self.subreddits {
            out.push(Box::new(RedditListingSource::new(
                s,
                self.limit,
                &self.user_agent,
            )?));
        }
        if let Some(p) = &self.fixture_path {
            out.push(Box::new(JsonFileSource::new(p.clone())));
        }
        Ok(out)
    }
}
