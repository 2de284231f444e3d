// src/item.rs
//! Incoming postings. Owned by the caller; the clustering core only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Origin channel, e.g. the subreddit name.
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u32,
}

impl Item {
    /// Minimal item with just the fields the matcher needs.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: None,
            link: None,
            channel: String::new(),
            author: None,
            created_at: Utc::now(),
            score: 0,
            num_comments: 0,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_created_at(mut self, ts: DateTime<Utc>) -> Self {
        self.created_at = ts;
        self
    }

    pub fn body_or_empty(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    pub fn link_or_empty(&self) -> &str {
        self.link.as_deref().unwrap_or_default()
    }

    /// Id and title are the only fields the core refuses to work without.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.id.trim().is_empty() {
            return Err(ClusterError::InvalidInput("id"));
        }
        if self.title.trim().is_empty() {
            return Err(ClusterError::InvalidInput("title"));
        }
        Ok(())
    }
}
