// tests/ingest_pipeline.rs
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use storyclust::cluster::{Clusterer, GroupId};
use storyclust::config::ClusterConfig;
use storyclust::ingest::providers::reddit::RedditListingSource;
use storyclust::ingest::providers::sample::JsonFileSource;
use storyclust::ingest::run_once;
use storyclust::ingest::types::PostSource;
use storyclust::persist::{ClusterRecord, ClusterRepository, InMemoryRepository, PostRecord};
use storyclust::{ClusterService, Item};

const REDDIT_FIXTURE: &str = include_str!("fixtures/reddit_new.json");

struct MockSource {
    items: Vec<Item>,
}

#[async_trait]
impl PostSource for MockSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        Ok(self.items.clone())
    }
    fn name(&self) -> &str {
        "mock"
    }
}

struct FailingSource;

#[async_trait]
impl PostSource for FailingSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        Err(anyhow!("upstream unavailable"))
    }
    fn name(&self) -> &str {
        "failing"
    }
}

fn service() -> ClusterService {
    ClusterService::in_memory(&ClusterConfig::default()).unwrap()
}

#[tokio::test]
async fn reddit_fixture_is_clustered_oldest_first() {
    let svc = service();
    let sources: Vec<Box<dyn PostSource>> = vec![Box::new(RedditListingSource::from_fixture(
        "worldnews",
        REDDIT_FIXTURE,
    ))];

    let report = run_once(&sources, &svc).await;
    assert_eq!(report.fetched, 4);
    assert_eq!(report.created, 2);
    assert_eq!(report.matched, 2);
    assert_eq!(report.source_errors, 0);

    // r1 is the oldest post even though the listing is newest-first
    let quake = svc.repository().get_cluster(1).unwrap().unwrap();
    assert_eq!(quake.representative_post_id, "r1");
    assert_eq!(quake.post_count, 3);
    let tesla = svc.repository().get_cluster(2).unwrap().unwrap();
    assert_eq!(tesla.representative_post_id, "r4");
}

#[tokio::test]
async fn second_run_reports_duplicates_only() {
    let svc = service();
    let sources: Vec<Box<dyn PostSource>> = vec![Box::new(RedditListingSource::from_fixture(
        "worldnews",
        REDDIT_FIXTURE,
    ))];
    run_once(&sources, &svc).await;
    let again = run_once(&sources, &svc).await;
    assert_eq!(again.duplicates, 4);
    assert_eq!(again.created + again.matched, 0);
    assert_eq!(svc.cluster_count().unwrap(), 2);
}

#[tokio::test]
async fn failing_source_does_not_stop_the_others() {
    let svc = service();
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let sources: Vec<Box<dyn PostSource>> = vec![
        Box::new(FailingSource),
        Box::new(MockSource {
            items: vec![
                Item::new("m1", "Tesla announces new Model Y").with_created_at(t),
                Item::new("", "no id").with_created_at(t),
            ],
        }),
    ];
    let report = run_once(&sources, &svc).await;
    assert_eq!(report.source_errors, 1);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.created, 1);
    assert_eq!(report.invalid, 1);
}

#[tokio::test]
async fn sample_file_source_feeds_the_service() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample_posts.json");
    let src = JsonFileSource::new(path);
    let items = src.load().unwrap();
    assert_eq!(items.len(), 9);

    let svc = service();
    let sources: Vec<Box<dyn PostSource>> = vec![Box::new(src)];
    let report = run_once(&sources, &svc).await;
    assert_eq!(report.fetched, 9);
    assert_eq!(report.invalid, 0);

    // the shared news.example.com link lands both posts together
    let du1 = svc.repository().get_post("du1").unwrap().unwrap();
    let du2 = svc.repository().get_post("du2").unwrap().unwrap();
    assert_eq!(du1.cluster_id, du2.cluster_id);

    // the three quake reports share a cluster
    let eq: Vec<_> = ["eq1", "eq2", "eq3"]
        .iter()
        .map(|id| svc.repository().get_post(id).unwrap().unwrap().cluster_id)
        .collect();
    assert!(eq.iter().all(|c| *c == eq[0]));

    // two youtube links are not a reason to merge
    let un1 = svc.repository().get_post("un1").unwrap().unwrap();
    let un2 = svc.repository().get_post("un2").unwrap().unwrap();
    assert_ne!(un1.cluster_id, un2.cluster_id);
}

/// Reads work, post writes never do.
#[derive(Default)]
struct ReadOnlyRepo {
    inner: InMemoryRepository,
}

impl ClusterRepository for ReadOnlyRepo {
    fn has_post(&self, id: &str) -> Result<bool> {
        self.inner.has_post(id)
    }
    fn save_post(&self, _post: PostRecord) -> Result<()> {
        Err(anyhow!("read-only"))
    }
    fn get_post(&self, id: &str) -> Result<Option<PostRecord>> {
        self.inner.get_post(id)
    }
    fn delete_post(&self, id: &str) -> Result<()> {
        self.inner.delete_post(id)
    }
    fn posts_in_cluster(&self, cluster_id: GroupId) -> Result<Vec<PostRecord>> {
        self.inner.posts_in_cluster(cluster_id)
    }
    fn upsert_cluster(&self, cluster: ClusterRecord) -> Result<()> {
        self.inner.upsert_cluster(cluster)
    }
    fn get_cluster(&self, id: GroupId) -> Result<Option<ClusterRecord>> {
        self.inner.get_cluster(id)
    }
    fn list_clusters(&self) -> Result<Vec<ClusterRecord>> {
        self.inner.list_clusters()
    }
}

#[tokio::test]
async fn storage_failures_are_reported_apart_from_invalid_posts() {
    let clusterer = Clusterer::from_config(&ClusterConfig::default()).unwrap();
    let svc = ClusterService::new(clusterer, Arc::new(ReadOnlyRepo::default()));
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let sources: Vec<Box<dyn PostSource>> = vec![Box::new(MockSource {
        items: vec![
            Item::new("m1", "Tesla announces new Model Y").with_created_at(t),
            Item::new("m2", "").with_created_at(t),
        ],
    })];

    let report = run_once(&sources, &svc).await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.created, 0);
    // nothing half-written
    assert_eq!(svc.cluster_count().unwrap(), 0);
}
