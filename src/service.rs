// src/service.rs
//! Clustering service: the engine, its store and the repository behind one lock.
//!
//! Duplicate check, match-or-create and the record writes for one item happen inside a
//! single critical section, so concurrent callers (HTTP handlers, scheduler ticks) can't
//! both found a group for the same story.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cluster::{Assignment, ClusterStore, Clusterer, Comparison, Group, GroupId, MatchReason};
use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::item::Item;
use crate::persist::{ClusterRecord, ClusterRepository, InMemoryRepository, PostRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created { cluster_id: GroupId },
    Matched { cluster_id: GroupId, reason: MatchReason },
    /// The post id was already clustered; nothing changed.
    Duplicate { cluster_id: Option<GroupId> },
}

impl IngestOutcome {
    pub fn cluster_id(&self) -> Option<GroupId> {
        match self {
            IngestOutcome::Created { cluster_id } | IngestOutcome::Matched { cluster_id, .. } => {
                Some(*cluster_id)
            }
            IngestOutcome::Duplicate { cluster_id } => *cluster_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub id: GroupId,
    pub title: String,
    pub representative_post_id: String,
    pub domain: String,
    pub post_count: u32,
    pub created_at: DateTime<Utc>,
    pub stale: bool,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterDetail {
    #[serde(flatten)]
    pub summary: ClusterSummary,
    pub posts: Vec<PostRecord>,
}

pub struct ClusterService {
    clusterer: Clusterer,
    store: Mutex<ClusterStore>,
    repo: Arc<dyn ClusterRepository>,
}

impl ClusterService {
    pub fn new(clusterer: Clusterer, repo: Arc<dyn ClusterRepository>) -> Self {
        Self {
            clusterer,
            store: Mutex::new(ClusterStore::new()),
            repo,
        }
    }

    pub fn in_memory(cfg: &ClusterConfig) -> Result<Self> {
        Ok(Self::new(
            Clusterer::from_config(cfg)?,
            Arc::new(InMemoryRepository::new()),
        ))
    }

    pub fn clusterer(&self) -> &Clusterer {
        &self.clusterer
    }

    pub fn repository(&self) -> &Arc<dyn ClusterRepository> {
        &self.repo
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, ClusterStore>> {
        self.store
            .lock()
            .map_err(|_| anyhow!("cluster store lock poisoned"))
    }

    pub fn ingest(&self, item: Item) -> Result<IngestOutcome> {
        self.ingest_at(item, Utc::now())
    }

    /// Cluster one item as of `now` and persist the post and its cluster record.
    pub fn ingest_at(&self, item: Item, now: DateTime<Utc>) -> Result<IngestOutcome> {
        item.validate()?;
        let mut store = self.lock_store()?;

        if let Some(existing) = self.repo.get_post(&item.id)? {
            counter!("ingest_duplicates_total").increment(1);
            debug!(target: "cluster", item = %item.id, "post already clustered");
            return Ok(IngestOutcome::Duplicate {
                cluster_id: existing.cluster_id,
            });
        }

        let assignment = self.clusterer.process_at(&mut store, &item, now)?;
        if let Err(e) = self.persist(&store, &item, &assignment, now) {
            // the store must not count a post the repository never got
            self.clusterer.undo(&mut store, &assignment)?;
            warn!(target: "cluster", item = %item.id, error = ?e, "record write failed, assignment undone");
            return Err(e);
        }

        Ok(match assignment.reason {
            Some(reason) => IngestOutcome::Matched {
                cluster_id: assignment.group_id,
                reason,
            },
            None => IngestOutcome::Created {
                cluster_id: assignment.group_id,
            },
        })
    }

    /// Post row, then the cluster row. A failure takes back the post row, so the
    /// repository is left as it was.
    fn persist(
        &self,
        store: &ClusterStore,
        item: &Item,
        assignment: &Assignment,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let group = store
            .get(assignment.group_id)
            .ok_or(ClusterError::UnknownGroup(assignment.group_id))?;
        self.repo
            .save_post(PostRecord::from_item(item, assignment.group_id))?;
        let written = self
            .build_record(group, now)
            .and_then(|record| self.repo.upsert_cluster(record));
        if let Err(e) = written {
            self.repo.delete_post(&item.id)?;
            return Err(e);
        }
        Ok(())
    }

    fn build_record(&self, group: &Group, now: DateTime<Utc>) -> Result<ClusterRecord> {
        let posts = self.repo.posts_in_cluster(group.id)?;
        let norm = self.clusterer.scorer().normalizer();
        let titles: Vec<String> = posts
            .iter()
            .map(|p| norm.normalize_title(&p.title).into_string())
            .collect();
        let keywords = self
            .clusterer
            .keywords()
            .summarize_keywords(&titles);

        Ok(ClusterRecord {
            id: group.id,
            representative_post_id: group.representative.id.clone(),
            created_at: group.created_at,
            updated_at: now,
            post_count: group.item_count,
            title: group.representative.title.clone(),
            keywords: serde_json::to_string(&keywords)?,
        })
    }

    fn summarize(&self, group: &Group, now: DateTime<Utc>) -> Result<ClusterSummary> {
        let keywords = self
            .repo
            .get_cluster(group.id)?
            .map(|r| r.keyword_list())
            .unwrap_or_default();
        Ok(ClusterSummary {
            id: group.id,
            title: group.representative.title.clone(),
            representative_post_id: group.representative.id.clone(),
            domain: group.domain.clone(),
            post_count: group.item_count,
            created_at: group.created_at,
            stale: group.is_stale_at(now, self.clusterer.stale_window()),
            keywords,
        })
    }

    /// Clusters in id order; stale ones only when asked for.
    pub fn cluster_summaries(
        &self,
        include_stale: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClusterSummary>> {
        let store = self.lock_store()?;
        let mut out = Vec::with_capacity(store.len());
        for group in store.iter() {
            let summary = self.summarize(group, now)?;
            if include_stale || !summary.stale {
                out.push(summary);
            }
        }
        Ok(out)
    }

    pub fn cluster_detail(&self, id: GroupId) -> Result<Option<ClusterDetail>> {
        let store = self.lock_store()?;
        let Some(group) = store.get(id) else {
            return Ok(None);
        };
        Ok(Some(ClusterDetail {
            summary: self.summarize(group, Utc::now())?,
            posts: self.repo.posts_in_cluster(id)?,
        }))
    }

    pub fn compare(&self, a: &Item, b: &Item) -> Comparison {
        self.clusterer.compare(a, b)
    }

    pub fn cluster_count(&self) -> Result<usize> {
        Ok(self.lock_store()?.len())
    }
}
