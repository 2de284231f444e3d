// src/ingest/providers/reddit.rs
//! Newest submissions of one subreddit via the public `new.json` listing.
//! One page per fetch, no auth, no pagination.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{PostSource, RawPost};
use crate::item::Item;

pub const DEFAULT_USER_AGENT: &str = "storyclust/0.1 (news clustering)";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RawPost,
}

pub struct RedditListingSource {
    name: String,
    subreddit: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RedditListingSource {
    pub fn new(subreddit: &str, limit: u32, user_agent: &str) -> Result<Self> {
        let subreddit = subreddit.trim().trim_start_matches("r/").to_string();
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building reddit http client")?;
        Ok(Self {
            name: format!("r/{subreddit}"),
            mode: Mode::Http {
                url: listing_url(&subreddit, limit),
                client,
            },
            subreddit,
        })
    }

    /// Serve a captured listing document instead of calling out.
    pub fn from_fixture(subreddit: &str, json: &str) -> Self {
        let subreddit = subreddit.trim().trim_start_matches("r/").to_string();
        Self {
            name: format!("r/{subreddit}"),
            subreddit,
            mode: Mode::Fixture(json.to_string()),
        }
    }

    /// Listing children as items; the subreddit is filled in where the listing omits it.
    pub fn parse_listing(&self, body: &str) -> Result<Vec<Item>> {
        let t0 = std::time::Instant::now();
        let listing: Listing =
            serde_json::from_str(body).with_context(|| format!("parsing {} listing", self.name))?;

        let out: Vec<Item> = listing
            .data
            .children
            .into_iter()
            .map(|c| {
                let mut raw = c.data;
                if raw.subreddit.is_empty() {
                    raw.subreddit = self.subreddit.clone();
                }
                raw.into_item()
            })
            .filter(|it| it.validate().is_ok())
            .collect();

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_fetched_total").increment(out.len() as u64);
        Ok(out)
    }
}

pub fn listing_url(subreddit: &str, limit: u32) -> String {
    format!(
        "https://www.reddit.com/r/{}/new.json?limit={}&raw_json=1",
        subreddit,
        limit.clamp(1, 100)
    )
}

#[async_trait]
impl PostSource for RedditListingSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_listing(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("{} http get", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http body", self.name))?;
                self.parse_listing(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
