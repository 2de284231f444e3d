// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::item::Item;

/// A submission as listing APIs and sample files deliver it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subreddit: String,
    /// Unix seconds, possibly fractional.
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u32,
}

impl RawPost {
    pub fn into_item(self) -> Item {
        let created_at = unix_to_utc(self.created_utc);
        let body = (!self.selftext.trim().is_empty()).then_some(self.selftext);
        let link = self.url.filter(|u| !u.trim().is_empty());
        Item {
            id: self.id,
            title: self.title,
            body,
            link,
            channel: self.subreddit,
            author: Some(self.author.unwrap_or_else(|| "[deleted]".to_string())),
            created_at,
            score: self.score,
            num_comments: self.num_comments,
        }
    }
}

// 0 / garbage falls back to the epoch rather than "now"; ordering stays stable
fn unix_to_utc(ts: f64) -> DateTime<Utc> {
    if !ts.is_finite() || ts < 0.0 {
        return DateTime::<Utc>::UNIX_EPOCH;
    }
    let secs = ts.trunc() as i64;
    let nanos = ((ts - ts.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Item>>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_post_maps_listing_fields() {
        let raw: RawPost = serde_json::from_str(
            r#"{"id":"abc","title":"Quake","selftext":"","url":"https://apnews.com/a",
                "author":null,"subreddit":"worldnews","created_utc":1700000000.5,
                "score":12,"num_comments":3}"#,
        )
        .unwrap();
        let item = raw.into_item();
        assert_eq!(item.body, None);
        assert_eq!(item.link.as_deref(), Some("https://apnews.com/a"));
        assert_eq!(item.author.as_deref(), Some("[deleted]"));
        assert_eq!(item.channel, "worldnews");
        assert_eq!(item.created_at.timestamp(), 1_700_000_000);
        assert_eq!(item.created_at.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn bad_timestamps_fall_back_to_epoch() {
        assert_eq!(unix_to_utc(-5.0), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(unix_to_utc(f64::NAN), DateTime::<Utc>::UNIX_EPOCH);
    }
}
