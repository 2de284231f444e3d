// src/cluster.rs
//! Cluster store and the online assignment policy.
//!
//! For an incoming item, every group is visited in ascending id order:
//! - stale groups (age >= window) are skipped, never removed
//! - a shared non-generic link domain returns that group immediately
//! - keyword overlap below the pre-filter threshold skips the group
//! - otherwise title similarity (+ event boost) competes for the single best score
//!
//! The best score must be strictly above the similarity threshold to match; ties keep the
//! group seen first. No match means a new group is founded by the item.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::domain::DomainPolicy;
use crate::error::{ClusterError, ClusterResult};
use crate::features::KeywordMatcher;
use crate::item::Item;
use crate::normalize::NormalizedText;
use crate::similarity::Scorer;

pub type GroupId = u64;

/// A group of items believed to report the same event.
///
/// Only `item_count` changes after creation; the representative, its domain and the
/// creation time stay fixed, so the cached normalized texts never go stale.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub representative: Item,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub item_count: u32,
    #[serde(skip)]
    representative_text: NormalizedText,
    #[serde(skip)]
    representative_title: NormalizedText,
}

impl Group {
    pub fn is_stale_at(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now - self.created_at >= window
    }

    /// Normalized title + body of the representative.
    pub fn representative_text(&self) -> &NormalizedText {
        &self.representative_text
    }

    pub fn representative_title(&self) -> &NormalizedText {
        &self.representative_title
    }
}

/// Groups by id. Iteration is ascending id, i.e. creation order.
#[derive(Debug, Clone, Default)]
pub struct ClusterStore {
    groups: BTreeMap<GroupId, Group>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Store-local, 1-based. Unique only because groups are never removed.
    fn next_id(&self) -> GroupId {
        self.groups.len() as GroupId + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchReason {
    Domain,
    Similarity { score: f32, event_match: bool },
}

impl MatchReason {
    pub fn label(&self) -> &'static str {
        match self {
            MatchReason::Domain => "domain",
            MatchReason::Similarity { .. } => "similarity",
        }
    }
}

/// The group chosen for an item and why.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub group_id: GroupId,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assignment {
    pub group_id: GroupId,
    pub created: bool,
    /// `None` when the item founded a new group.
    pub reason: Option<MatchReason>,
}

/// Every signal the matcher looks at for one pair of items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub same_domain: bool,
    pub keyword_overlap: f32,
    pub passes_prefilter: bool,
    pub title_similarity: f32,
    pub event_match: bool,
    pub boosted: f32,
    pub would_match: bool,
}

#[derive(Debug, Clone)]
pub struct Clusterer {
    scorer: Scorer,
    keywords: KeywordMatcher,
    domains: DomainPolicy,
    similarity_threshold: f32,
    prefilter_threshold: f32,
    stale_window: chrono::Duration,
}

impl Clusterer {
    pub fn from_config(cfg: &ClusterConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            scorer: Scorer::from_config(cfg)?,
            keywords: KeywordMatcher::new(&cfg.keywords, &cfg.vocabulary.stop_words),
            domains: DomainPolicy::from_config(&cfg.domains),
            similarity_threshold: cfg.clustering.similarity_threshold,
            prefilter_threshold: cfg.clustering.prefilter_threshold,
            stale_window: cfg.stale_window(),
        })
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn keywords(&self) -> &KeywordMatcher {
        &self.keywords
    }

    pub fn domains(&self) -> &DomainPolicy {
        &self.domains
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    pub fn stale_window(&self) -> chrono::Duration {
        self.stale_window
    }

    /// Best non-stale group for `item` as of `now`, with the reason it was chosen.
    pub fn find_best_at(
        &self,
        store: &ClusterStore,
        item: &Item,
        now: DateTime<Utc>,
    ) -> ClusterResult<Option<Candidate>> {
        item.validate()?;
        let started = Instant::now();
        let norm = self.scorer.normalizer();

        let domain = self.domains.extract_domain(item.link_or_empty());
        let text = norm.normalize(&item.title, item.body_or_empty());
        let title = norm.normalize_title(&item.title);

        let mut best: Option<(GroupId, f32, bool)> = None;
        for group in store.iter() {
            if group.is_stale_at(now, self.stale_window) {
                counter!("cluster_stale_skipped_total").increment(1);
                continue;
            }

            if self.domains.shortcut_applies(&domain, &group.domain) {
                debug!(target: "cluster", item = %item.id, group = group.id, %domain, "domain shortcut");
                histogram!("cluster_match_ms").record(started.elapsed().as_secs_f64() * 1000.0);
                return Ok(Some(Candidate {
                    group_id: group.id,
                    reason: MatchReason::Domain,
                }));
            }

            let overlap = self
                .keywords
                .keyword_overlap(text.as_str(), group.representative_text.as_str());
            if overlap < self.prefilter_threshold {
                counter!("cluster_prefilter_skipped_total").increment(1);
                continue;
            }

            let raw = self
                .scorer
                .text_similarity(title.as_str(), group.representative_title.as_str());
            let event = self.scorer.event_match(&item.title, &group.representative.title);
            let score = self.scorer.boosted(raw, event);
            debug!(
                target: "cluster",
                item = %item.id,
                group = group.id,
                overlap,
                raw,
                event,
                score,
                "candidate scored"
            );

            if best.map_or(true, |(_, s, _)| score > s) {
                best = Some((group.id, score, event));
            }
        }

        histogram!("cluster_match_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(best
            .filter(|(_, score, _)| *score > self.similarity_threshold)
            .map(|(group_id, score, event_match)| Candidate {
                group_id,
                reason: MatchReason::Similarity { score, event_match },
            }))
    }

    pub fn find_best(&self, store: &ClusterStore, item: &Item) -> ClusterResult<Option<Candidate>> {
        self.find_best_at(store, item, Utc::now())
    }

    pub fn find_match_at(
        &self,
        store: &ClusterStore,
        item: &Item,
        now: DateTime<Utc>,
    ) -> ClusterResult<Option<GroupId>> {
        Ok(self.find_best_at(store, item, now)?.map(|c| c.group_id))
    }

    pub fn find_match(&self, store: &ClusterStore, item: &Item) -> ClusterResult<Option<GroupId>> {
        self.find_match_at(store, item, Utc::now())
    }

    /// Found a new group with `item` as its representative, created at `now`.
    pub fn create_at(
        &self,
        store: &mut ClusterStore,
        item: &Item,
        now: DateTime<Utc>,
    ) -> ClusterResult<GroupId> {
        item.validate()?;
        let norm = self.scorer.normalizer();
        let id = store.next_id();
        let group = Group {
            id,
            representative: item.clone(),
            domain: self.domains.extract_domain(item.link_or_empty()),
            created_at: now,
            item_count: 1,
            representative_text: norm.normalize(&item.title, item.body_or_empty()),
            representative_title: norm.normalize_title(&item.title),
        };
        info!(target: "cluster", group = id, item = %item.id, domain = %group.domain, "group created");
        store.groups.insert(id, group);
        counter!("cluster_created_total").increment(1);
        Ok(id)
    }

    pub fn create(&self, store: &mut ClusterStore, item: &Item) -> ClusterResult<GroupId> {
        self.create_at(store, item, Utc::now())
    }

    /// Count `item` towards an existing group. Nothing else about the group changes.
    pub fn add(&self, store: &mut ClusterStore, group_id: GroupId, item: &Item) -> ClusterResult<()> {
        item.validate()?;
        let group = store
            .groups
            .get_mut(&group_id)
            .ok_or(ClusterError::UnknownGroup(group_id))?;
        group.item_count = group.item_count.saturating_add(1);
        Ok(())
    }

    /// Match-or-create in one step.
    pub fn process_at(
        &self,
        store: &mut ClusterStore,
        item: &Item,
        now: DateTime<Utc>,
    ) -> ClusterResult<Assignment> {
        item.validate()?;
        counter!("cluster_items_total").increment(1);
        match self.find_best_at(store, item, now)? {
            Some(c) => {
                self.add(store, c.group_id, item)?;
                counter!("cluster_matched_total", "reason" => c.reason.label()).increment(1);
                info!(target: "cluster", group = c.group_id, item = %item.id, reason = c.reason.label(), "item matched");
                Ok(Assignment {
                    group_id: c.group_id,
                    created: false,
                    reason: Some(c.reason),
                })
            }
            None => Ok(Assignment {
                group_id: self.create_at(store, item, now)?,
                created: true,
                reason: None,
            }),
        }
    }

    pub fn process(&self, store: &mut ClusterStore, item: &Item) -> ClusterResult<Assignment> {
        self.process_at(store, item, Utc::now())
    }

    /// Take back the store change made by `assignment`, the latest `process_at` on
    /// `store`. A founded group is removed again (it holds the highest id, so ids stay
    /// dense); a match gives its count back.
    pub fn undo(&self, store: &mut ClusterStore, assignment: &Assignment) -> ClusterResult<()> {
        let id = assignment.group_id;
        if assignment.created {
            if store.next_id() != id + 1 {
                return Err(ClusterError::UnknownGroup(id));
            }
            store.groups.remove(&id);
        } else {
            let group = store
                .groups
                .get_mut(&id)
                .ok_or(ClusterError::UnknownGroup(id))?;
            group.item_count = group.item_count.saturating_sub(1).max(1);
        }
        debug!(target: "cluster", group = id, created = assignment.created, "assignment undone");
        Ok(())
    }

    /// Score `a` against `b` as if `b` founded a fresh group. Staleness is not considered.
    pub fn compare(&self, a: &Item, b: &Item) -> Comparison {
        let norm = self.scorer.normalizer();
        let da = self.domains.extract_domain(a.link_or_empty());
        let db = self.domains.extract_domain(b.link_or_empty());
        let same_domain = self.domains.shortcut_applies(&da, &db);

        let keyword_overlap = self.keywords.keyword_overlap(
            norm.normalize(&a.title, a.body_or_empty()).as_str(),
            norm.normalize(&b.title, b.body_or_empty()).as_str(),
        );
        let passes_prefilter = keyword_overlap >= self.prefilter_threshold;
        let title_similarity = self.scorer.title_similarity(a, b);
        let event_match = self.scorer.event_match(&a.title, &b.title);
        let boosted = self.scorer.boosted(title_similarity, event_match);

        Comparison {
            same_domain,
            keyword_overlap,
            passes_prefilter,
            title_similarity,
            event_match,
            boosted,
            would_match: same_domain || (passes_prefilter && boosted > self.similarity_threshold),
        }
    }
}
