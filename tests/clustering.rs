// tests/clustering.rs
//
// End-to-end behaviour of the assignment policy on an explicit store:
// - scenarios: same quake, unrelated stories, shared link, 25h later
// - staleness boundary, global best match, tie-break, generic domains
// - determinism, idempotence and threshold monotonicity

use chrono::{DateTime, Duration, TimeZone, Utc};
use storyclust::cluster::{ClusterStore, Clusterer, MatchReason};
use storyclust::config::ClusterConfig;
use storyclust::{ClusterError, Item};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

fn clusterer_with_threshold(t: f32) -> Clusterer {
    let mut cfg = ClusterConfig::default();
    cfg.clustering.similarity_threshold = t;
    Clusterer::from_config(&cfg).unwrap()
}

fn quake_items() -> Vec<Item> {
    vec![
        Item::new("a1", "Magnitude 7.2 earthquake strikes Japan"),
        Item::new("a2", "7.1 quake hits Japan, tsunami warning issued"),
        Item::new("a3", "Japan earthquake: aftershocks reported"),
    ]
}

fn unrelated_items() -> Vec<Item> {
    vec![
        Item::new("b1", "Tesla announces new Model Y"),
        Item::new("b2", "Local election results announced"),
    ]
}

#[test]
fn scenario_a_quake_reports_form_one_group() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let ids: Vec<u64> = quake_items()
        .iter()
        .map(|it| c.process_at(&mut store, it, t0()).unwrap().group_id)
        .collect();
    assert_eq!(ids, vec![1, 1, 1]);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(1).unwrap().item_count, 3);
}

#[test]
fn scenario_a_matches_are_by_similarity_with_event_boost() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let items = quake_items();
    c.process_at(&mut store, &items[0], t0()).unwrap();
    let a = c.process_at(&mut store, &items[1], t0()).unwrap();
    match a.reason {
        Some(MatchReason::Similarity { score, event_match }) => {
            assert!(event_match);
            assert!(score > 0.25, "score {score}");
        }
        other => panic!("expected similarity match, got {other:?}"),
    }
}

#[test]
fn scenario_b_unrelated_titles_stay_apart() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    for it in unrelated_items() {
        let a = c.process_at(&mut store, &it, t0()).unwrap();
        assert!(a.created);
    }
    assert_eq!(store.len(), 2);
}

#[test]
fn scenario_c_shared_link_uses_domain_shortcut() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let a = Item::new("c1", "City council approves new budget")
        .with_link("https://news.example.com/story");
    let b = Item::new("c2", "Residents react to spending plan")
        .with_link("https://news.example.com/story");

    c.process_at(&mut store, &a, t0()).unwrap();
    let out = c.process_at(&mut store, &b, t0()).unwrap();
    assert_eq!(out.group_id, 1);
    assert_eq!(out.reason, Some(MatchReason::Domain));
    assert!(c.scorer().title_similarity(&a, &b) < 0.1);
}

#[test]
fn scenario_d_identical_title_after_25h_founds_new_group() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let first = Item::new("d1", "Magnitude 7.2 earthquake strikes Japan");
    let again = Item::new("d2", "Magnitude 7.2 earthquake strikes Japan");

    c.process_at(&mut store, &first, t0()).unwrap();
    let out = c
        .process_at(&mut store, &again, t0() + Duration::hours(25))
        .unwrap();
    assert!(out.created);
    assert_eq!(out.group_id, 2);
    assert_eq!(store.get(1).unwrap().item_count, 1);
    assert_eq!(store.len(), 2);
}

#[test]
fn stale_window_edge_is_inclusive() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let it = Item::new("s1", "Magnitude 7.2 earthquake strikes Japan");
    c.create_at(&mut store, &it, t0()).unwrap();

    let just_before = t0() + Duration::hours(24) - Duration::seconds(1);
    assert_eq!(c.find_match_at(&store, &it, just_before).unwrap(), Some(1));
    assert_eq!(
        c.find_match_at(&store, &it, t0() + Duration::hours(24)).unwrap(),
        None
    );
}

#[test]
fn stale_groups_ignore_the_domain_shortcut_too() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let a = Item::new("x1", "One story").with_link("https://apnews.com/a");
    let b = Item::new("x2", "Another story").with_link("https://apnews.com/b");
    c.create_at(&mut store, &a, t0()).unwrap();
    assert_eq!(
        c.find_match_at(&store, &b, t0() + Duration::hours(30)).unwrap(),
        None
    );
}

#[test]
fn generic_platform_links_do_not_merge() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let a = Item::new("g1", "Local election results announced")
        .with_link("https://www.youtube.com/watch?v=abc");
    let b = Item::new("g2", "Recipe thread: best sourdough tips")
        .with_link("https://youtube.com/watch?v=xyz");
    c.process_at(&mut store, &a, t0()).unwrap();
    let out = c.process_at(&mut store, &b, t0()).unwrap();
    assert!(out.created);
}

#[test]
fn self_links_do_not_merge() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let a = Item::new("r1", "Local election results announced")
        .with_link("https://www.reddit.com/r/news/comments/1/");
    let b = Item::new("r2", "Recipe thread: best sourdough tips")
        .with_link("https://www.reddit.com/r/cooking/comments/2/");
    c.process_at(&mut store, &a, t0()).unwrap();
    assert!(c.process_at(&mut store, &b, t0()).unwrap().created);
}

#[test]
fn best_match_wins_over_first_match() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    c.create_at(
        &mut store,
        &Item::new("m1", "Magnitude 7.2 earthquake strikes Japan"),
        t0(),
    )
    .unwrap();
    c.create_at(
        &mut store,
        &Item::new("m2", "7.1 quake hits Japan, tsunami warning issued"),
        t0(),
    )
    .unwrap();

    let incoming = Item::new("m3", "7.1 quake hits Japan, tsunami warning issued today");
    // group 1 alone would already accept it
    assert!(c
        .compare(&incoming, &store.get(1).unwrap().representative)
        .would_match);
    assert_eq!(c.find_match_at(&store, &incoming, t0()).unwrap(), Some(2));
}

#[test]
fn ties_go_to_the_lowest_id() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let title = "Wildfire forces evacuation in California";
    c.create_at(&mut store, &Item::new("t1", title), t0()).unwrap();
    c.create_at(&mut store, &Item::new("t2", title), t0()).unwrap();
    assert_eq!(
        c.find_match_at(&store, &Item::new("t3", title), t0()).unwrap(),
        Some(1)
    );
}

#[test]
fn processing_is_deterministic() {
    let run = || {
        let c = clusterer_with_threshold(0.25);
        let mut store = ClusterStore::new();
        quake_items()
            .into_iter()
            .chain(unrelated_items())
            .map(|it| c.process_at(&mut store, &it, t0()).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn same_item_twice_lands_in_the_same_group() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let it = Item::new("i1", "Tesla announces new Model Y");
    let first = c.process_at(&mut store, &it, t0()).unwrap();
    let second = c.process_at(&mut store, &it, t0()).unwrap();
    assert_eq!(first.group_id, second.group_id);
    assert!(!second.created);
}

#[test]
fn raising_the_threshold_never_adds_matches() {
    let items: Vec<Item> = quake_items().into_iter().chain(unrelated_items()).collect();
    let mut previous = usize::MAX;
    for t in [0.05, 0.25, 0.5, 0.9, 0.99] {
        let c = clusterer_with_threshold(t);
        let mut store = ClusterStore::new();
        let matched = items
            .iter()
            .filter(|it| !c.process_at(&mut store, it, t0()).unwrap().created)
            .count();
        assert!(matched <= previous, "threshold {t}: {matched} > {previous}");
        previous = matched;
    }
    assert_eq!(previous, 0);
}

#[test]
fn invalid_items_are_rejected_everywhere() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    let no_id = Item::new("", "A title");
    let no_title = Item::new("x", "");
    assert_eq!(
        c.find_match_at(&store, &no_id, t0()),
        Err(ClusterError::InvalidInput("id"))
    );
    assert_eq!(
        c.create_at(&mut store, &no_title, t0()),
        Err(ClusterError::InvalidInput("title"))
    );
    assert!(store.is_empty());
}

#[test]
fn unknown_group_on_add() {
    let c = clusterer_with_threshold(0.25);
    let mut store = ClusterStore::new();
    assert_eq!(
        c.add(&mut store, 3, &Item::new("a", "b")),
        Err(ClusterError::UnknownGroup(3))
    );
}
