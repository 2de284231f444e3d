// src/persist.rs
//! Post and cluster records, and the repository the service writes them to.
//!
//! The record shapes mirror the relational layout the clustering output is stored in:
//! one post row per item (with its cluster id) and one cluster row per group (with its
//! representative post id, post count, generated title and a JSON keyword summary).

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::cluster::GroupId;
use crate::item::Item;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub channel: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub num_comments: u32,
    pub cluster_id: Option<GroupId>,
    pub processed: bool,
}

impl PostRecord {
    pub fn from_item(item: &Item, cluster_id: GroupId) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            body: item.body.clone(),
            link: item.link.clone(),
            author: item.author.clone(),
            channel: item.channel.clone(),
            created_at: item.created_at,
            score: item.score,
            num_comments: item.num_comments,
            cluster_id: Some(cluster_id),
            processed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterRecord {
    pub id: GroupId,
    pub representative_post_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub post_count: u32,
    pub title: String,
    /// JSON array of the top keywords across the cluster's posts.
    pub keywords: String,
}

impl ClusterRecord {
    pub fn keyword_list(&self) -> Vec<String> {
        serde_json::from_str(&self.keywords).unwrap_or_default()
    }
}

/// Storage for clustering output. Implementations must be safe to share across tasks.
pub trait ClusterRepository: Send + Sync {
    fn has_post(&self, id: &str) -> Result<bool>;
    fn save_post(&self, post: PostRecord) -> Result<()>;
    fn get_post(&self, id: &str) -> Result<Option<PostRecord>>;
    /// Remove a post row; a missing id is not an error.
    fn delete_post(&self, id: &str) -> Result<()>;
    /// Posts of one cluster, oldest first.
    fn posts_in_cluster(&self, cluster_id: GroupId) -> Result<Vec<PostRecord>>;
    fn upsert_cluster(&self, cluster: ClusterRecord) -> Result<()>;
    fn get_cluster(&self, id: GroupId) -> Result<Option<ClusterRecord>>;
    /// All clusters in id order.
    fn list_clusters(&self) -> Result<Vec<ClusterRecord>>;
}

#[derive(Debug, Default)]
struct Tables {
    posts: BTreeMap<String, PostRecord>,
    clusters: BTreeMap<GroupId, ClusterRecord>,
}

/// Process-local repository, used by default and in tests.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    inner: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T> {
        let guard = self
            .inner
            .read()
            .map_err(|_| anyhow!("repository lock poisoned"))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow!("repository lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl ClusterRepository for InMemoryRepository {
    fn has_post(&self, id: &str) -> Result<bool> {
        self.read(|t| t.posts.contains_key(id))
    }

    fn save_post(&self, post: PostRecord) -> Result<()> {
        self.write(|t| {
            t.posts.insert(post.id.clone(), post);
        })
    }

    fn get_post(&self, id: &str) -> Result<Option<PostRecord>> {
        self.read(|t| t.posts.get(id).cloned())
    }

    fn delete_post(&self, id: &str) -> Result<()> {
        self.write(|t| {
            t.posts.remove(id);
        })
    }

    fn posts_in_cluster(&self, cluster_id: GroupId) -> Result<Vec<PostRecord>> {
        self.read(|t| {
            let mut v: Vec<PostRecord> = t
                .posts
                .values()
                .filter(|p| p.cluster_id == Some(cluster_id))
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            v
        })
    }

    fn upsert_cluster(&self, cluster: ClusterRecord) -> Result<()> {
        self.write(|t| {
            t.clusters.insert(cluster.id, cluster);
        })
    }

    fn get_cluster(&self, id: GroupId) -> Result<Option<ClusterRecord>> {
        self.read(|t| t.clusters.get(&id).cloned())
    }

    fn list_clusters(&self) -> Result<Vec<ClusterRecord>> {
        self.read(|t| t.clusters.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn posts_come_back_grouped_and_ordered() {
        let repo = InMemoryRepository::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Item::new("b", "later").with_created_at(t0 + Duration::minutes(5));
        let early = Item::new("a", "earlier").with_created_at(t0);
        let other = Item::new("c", "elsewhere").with_created_at(t0);

        repo.save_post(PostRecord::from_item(&late, 1)).unwrap();
        repo.save_post(PostRecord::from_item(&early, 1)).unwrap();
        repo.save_post(PostRecord::from_item(&other, 2)).unwrap();

        assert!(repo.has_post("a").unwrap());
        assert!(!repo.has_post("zzz").unwrap());
        let ids: Vec<String> = repo
            .posts_in_cluster(1)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        repo.delete_post("a").unwrap();
        repo.delete_post("a").unwrap();
        assert!(!repo.has_post("a").unwrap());
        assert_eq!(repo.posts_in_cluster(1).unwrap().len(), 1);
    }

    #[test]
    fn cluster_upsert_replaces_and_keywords_parse() {
        let repo = InMemoryRepository::new();
        let now = Utc::now();
        let mut rec = ClusterRecord {
            id: 1,
            representative_post_id: "a".into(),
            created_at: now,
            updated_at: now,
            post_count: 1,
            title: "Quake".into(),
            keywords: r#"["earthquake","japan"]"#.into(),
        };
        repo.upsert_cluster(rec.clone()).unwrap();
        rec.post_count = 2;
        repo.upsert_cluster(rec).unwrap();

        let all = repo.list_clusters().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].post_count, 2);
        assert_eq!(all[0].keyword_list(), vec!["earthquake", "japan"]);
    }
}
