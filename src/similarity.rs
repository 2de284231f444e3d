// src/similarity.rs
//! Pairwise title similarity and the event-match heuristic.
//!
//! Similarity is TF-IDF cosine over unigrams + bigrams, fit on exactly the two texts
//! being compared. The vocabulary (and therefore idf) changes with every pair; this is
//! intentional and changes outcomes compared to a shared corpus vocabulary.
//!
//! Weighting: raw term counts, idf = ln((1 + n) / (1 + df)) + 1 with n = 2, L2 norm.

use anyhow::Result;
use metrics::counter;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::item::Item;
use crate::normalize::Normalizer;

#[derive(Debug, Clone)]
pub struct Scorer {
    normalizer: Normalizer,
    stop_words: HashSet<String>,
    min_term_chars: usize,
    event_boost: f32,
    numeric_tolerance: f64,
}

impl Scorer {
    pub fn from_config(cfg: &ClusterConfig) -> Result<Self> {
        Ok(Self::new(Normalizer::from_config(cfg)?, cfg))
    }

    pub fn new(normalizer: Normalizer, cfg: &ClusterConfig) -> Self {
        Self {
            normalizer,
            stop_words: cfg
                .vocabulary
                .stop_words
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            min_term_chars: cfg.clustering.min_term_chars.max(1),
            event_boost: cfg.clustering.event_boost,
            numeric_tolerance: cfg.clustering.numeric_tolerance,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn event_boost(&self) -> f32 {
        self.event_boost
    }

    /// Similarity of the two items' titles (bodies ignored). Never fails: degraded
    /// scoring counts as 0.
    pub fn title_similarity(&self, a: &Item, b: &Item) -> f32 {
        let ta = self.normalizer.normalize_title(&a.title);
        let tb = self.normalizer.normalize_title(&b.title);
        self.text_similarity(ta.as_str(), tb.as_str())
    }

    /// Soft-failing wrapper around [`Scorer::tfidf_cosine`] for normalized texts.
    pub fn text_similarity(&self, a: &str, b: &str) -> f32 {
        match self.tfidf_cosine(a, b) {
            Ok(s) => s,
            Err(e) => {
                counter!("cluster_scoring_degraded_total").increment(1);
                debug!(target: "cluster", error = %e, "similarity degraded, scoring as 0");
                0.0
            }
        }
    }

    /// Unigram + bigram terms after dropping short tokens and stop words.
    fn terms(&self, text: &str) -> BTreeMap<String, f64> {
        let toks: Vec<&str> = text
            .split_whitespace()
            .filter(|t| t.chars().count() >= self.min_term_chars && !self.stop_words.contains(*t))
            .collect();

        let mut counts = BTreeMap::new();
        for t in &toks {
            *counts.entry((*t).to_string()).or_insert(0.0) += 1.0;
        }
        for w in toks.windows(2) {
            *counts.entry(format!("{} {}", w[0], w[1])).or_insert(0.0) += 1.0;
        }
        counts
    }

    /// Cosine similarity of TF-IDF vectors fit on `{a, b}`.
    ///
    /// Both texts without any term is `ScoringDegraded`; one empty side scores 0.
    pub fn tfidf_cosine(&self, a: &str, b: &str) -> ClusterResult<f32> {
        let ta = self.terms(a);
        let tb = self.terms(b);
        if ta.is_empty() && tb.is_empty() {
            return Err(ClusterError::ScoringDegraded("empty vocabulary".into()));
        }
        if ta.is_empty() || tb.is_empty() {
            return Ok(0.0);
        }

        const N_DOCS: f64 = 2.0;
        let idf = |term: &str| {
            let df = f64::from(u8::from(ta.contains_key(term)) + u8::from(tb.contains_key(term)));
            ((1.0 + N_DOCS) / (1.0 + df)).ln() + 1.0
        };

        let wa: BTreeMap<&str, f64> = ta
            .iter()
            .map(|(t, tf)| (t.as_str(), tf * idf(t.as_str())))
            .collect();
        let wb: BTreeMap<&str, f64> = tb
            .iter()
            .map(|(t, tf)| (t.as_str(), tf * idf(t.as_str())))
            .collect();

        let norm = |w: &BTreeMap<&str, f64>| w.values().map(|x| x * x).sum::<f64>().sqrt();
        let (na, nb) = (norm(&wa), norm(&wb));
        if na == 0.0 || nb == 0.0 {
            return Err(ClusterError::ScoringDegraded("zero-length vector".into()));
        }

        let dot: f64 = wa
            .iter()
            .filter_map(|(t, x)| wb.get(t).map(|y| x * y))
            .sum();
        let cos = dot / (na * nb);
        if !cos.is_finite() {
            return Err(ClusterError::ScoringDegraded(format!("non-finite cosine {cos}")));
        }
        Ok(cos.clamp(0.0, 1.0) as f32)
    }

    /// Same event type in both titles, plus a shared location or a close magnitude.
    pub fn event_match(&self, title_a: &str, title_b: &str) -> bool {
        let vocab = self.normalizer.vocabulary();
        let ea = vocab.entities(&self.normalizer.canonical_title(title_a));
        let eb = vocab.entities(&self.normalizer.canonical_title(title_b));
        if !ea.shares_event(&eb) {
            return false;
        }
        ea.shares_location(&eb) || ea.has_close_number(&eb, self.numeric_tolerance)
    }

    pub fn boosted(&self, raw: f32, event_match: bool) -> f32 {
        if event_match {
            raw + self.event_boost
        } else {
            raw
        }
    }
}
