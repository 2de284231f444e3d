//! Walks a sample file through the clusterer and prints what it sees.
//!
//! Usage: `cluster_debug [posts.json] [threshold ...]`
//! Defaults to `tests/fixtures/sample_posts.json` and the configured threshold.

use anyhow::{Context, Result};
use storyclust::cluster::{ClusterStore, Clusterer};
use storyclust::config::ClusterConfig;
use storyclust::ingest::order_for_clustering;
use storyclust::ingest::providers::sample::JsonFileSource;
use storyclust::Item;

const DEFAULT_SAMPLE: &str = "tests/fixtures/sample_posts.json";

fn short(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(n).collect::<String>())
    }
}

fn main() -> Result<()> {
    storyclust::init_tracing("warn");

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| DEFAULT_SAMPLE.to_string());
    let thresholds = args
        .map(|a| a.parse::<f32>().with_context(|| format!("bad threshold `{a}`")))
        .collect::<Result<Vec<_>>>()?;

    let base = ClusterConfig::load_default()?;
    let mut items = JsonFileSource::new(&path).load()?;
    order_for_clustering(&mut items);
    let clusterer = Clusterer::from_config(&base)?;

    println!("== normalized text ({} posts from {path})", items.len());
    let norm = clusterer.scorer().normalizer();
    for (i, it) in items.iter().enumerate() {
        println!("{:>3}. {}", i + 1, short(&it.title, 70));
        println!("     {}", norm.normalize(&it.title, it.body_or_empty()));
    }

    println!("\n== pairwise (overlap / title sim / event / boosted / match)");
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let c = clusterer.compare(&items[j], &items[i]);
            println!(
                "{:>3} vs {:<3} {:.3} / {:.3} / {} / {:.3} / {}{}",
                j + 1,
                i + 1,
                c.keyword_overlap,
                c.title_similarity,
                if c.event_match { "E" } else { "-" },
                c.boosted,
                if c.would_match { "yes" } else { "no" },
                if c.same_domain { " (domain)" } else { "" },
            );
        }
    }

    let thresholds = if thresholds.is_empty() {
        vec![base.clustering.similarity_threshold]
    } else {
        thresholds
    };
    for t in thresholds {
        let mut cfg = base.clone();
        cfg.clustering.similarity_threshold = t;
        run_assignment(&cfg, &items)?;
    }
    Ok(())
}

fn run_assignment(cfg: &ClusterConfig, items: &[Item]) -> Result<()> {
    let clusterer = Clusterer::from_config(cfg)?;
    let mut store = ClusterStore::new();
    println!(
        "\n== assignment at threshold {:.2}",
        cfg.clustering.similarity_threshold
    );
    for it in items {
        // sample data is replayed as if it arrived now
        let a = clusterer.process(&mut store, it)?;
        let how = match a.reason {
            None => "new".to_string(),
            Some(r) => serde_json::to_string(&r)?,
        };
        println!("  {:<12} -> group {:<3} {}", it.id, a.group_id, how);
    }

    println!("  groups:");
    for g in store.iter() {
        println!(
            "  #{:<3} x{:<3} {:<20} {}",
            g.id,
            g.item_count,
            if g.domain.is_empty() { "-" } else { g.domain.as_str() },
            short(&g.representative.title, 60)
        );
    }
    Ok(())
}
