// src/ingest/providers/sample.rs
//! Sample-data loader. Accepts either a flat array of posts or an object of
//! `{ "category": [posts] }`; the category stands in for a missing subreddit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::{PostSource, RawPost};
use crate::item::Item;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SampleFile {
    Flat(Vec<RawPost>),
    Categorized(BTreeMap<String, Vec<RawPost>>),
}

/// Parse sample JSON into items, categories in name order, file order within each.
pub fn parse_sample(json: &str) -> Result<Vec<Item>> {
    let file: SampleFile = serde_json::from_str(json).context("parsing sample posts")?;
    let raws: Vec<RawPost> = match file {
        SampleFile::Flat(v) => v,
        SampleFile::Categorized(map) => map
            .into_iter()
            .flat_map(|(category, posts)| {
                posts.into_iter().map(move |mut p| {
                    if p.subreddit.is_empty() {
                        p.subreddit = category.clone();
                    }
                    p
                })
            })
            .collect(),
    };
    Ok(raws.into_iter().map(RawPost::into_item).collect())
}

pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Item>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading sample posts from {}", self.path.display()))?;
        parse_sample(&content)
    }
}

#[async_trait]
impl PostSource for JsonFileSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        let items = self.load()?;
        counter!("ingest_fetched_total").increment(items.len() as u64);
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
