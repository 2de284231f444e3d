// src/features.rs
//! Cheap lexical features: vocabulary-driven entity extraction (events, locations,
//! magnitudes), the keyword-overlap pre-filter, and keyword summaries for cluster records.

use anyhow::{Context, Result};
use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

use crate::config::{KeywordSection, VocabularySection};

/// One configured vocabulary entry (e.g. `aftershocks?`), compiled as a whole-word,
/// case-insensitive pattern. Entities are identified by entry, not by spelling.
#[derive(Debug, Clone)]
pub struct VocabEntry {
    pub pattern: String,
    re: Regex,
}

fn compile_word_pattern(fragment: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b(?:{fragment})\b"))
}

fn compile_entries(kind: &str, fragments: &[String]) -> Result<Vec<VocabEntry>> {
    fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(|f| {
            let re = compile_word_pattern(f)
                .with_context(|| format!("{kind} entry `{f}` regex error"))?;
            Ok(VocabEntry {
                pattern: f.to_string(),
                re,
            })
        })
        .collect()
}

/// Entities found in a piece of text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    /// Indices into the event vocabulary.
    pub events: BTreeSet<usize>,
    /// Indices into the location gazetteer.
    pub locations: BTreeSet<usize>,
    pub numbers: Vec<f64>,
}

impl Entities {
    pub fn shares_event(&self, other: &Entities) -> bool {
        !self.events.is_disjoint(&other.events)
    }

    pub fn shares_location(&self, other: &Entities) -> bool {
        !self.locations.is_disjoint(&other.locations)
    }

    /// True if some number here is within `tolerance` of some number in `other`.
    pub fn has_close_number(&self, other: &Entities, tolerance: f64) -> bool {
        self.numbers
            .iter()
            .any(|a| other.numbers.iter().any(|b| (a - b).abs() <= tolerance))
    }
}

/// Compiled event vocabulary, gazetteer and number pattern.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    numbers: Regex,
    events: Vec<VocabEntry>,
    locations: Vec<VocabEntry>,
}

impl Vocabulary {
    pub fn from_config(cfg: &VocabularySection) -> Result<Self> {
        let numbers = compile_word_pattern(cfg.numbers.trim())
            .with_context(|| format!("numbers pattern `{}` regex error", cfg.numbers))?;
        Ok(Self {
            numbers,
            events: compile_entries("event", &cfg.events)?,
            locations: compile_entries("location", &cfg.locations)?,
        })
    }

    pub fn events(&self) -> &[VocabEntry] {
        &self.events
    }

    pub fn locations(&self) -> &[VocabEntry] {
        &self.locations
    }

    pub fn numbers_in(&self, text: &str) -> Vec<String> {
        let hits = self
            .numbers
            .find_iter(text)
            .map(|m| (m.start(), m.as_str().to_string()))
            .collect();
        distinct_in_text_order(hits)
    }

    pub fn locations_in(&self, text: &str) -> Vec<String> {
        distinct_in_text_order(entry_hits(&self.locations, text))
    }

    pub fn events_in(&self, text: &str) -> Vec<String> {
        distinct_in_text_order(entry_hits(&self.events, text))
    }

    /// Salient tokens in the order they get amplified: numbers, locations, events.
    pub fn salient_tokens(&self, text: &str) -> Vec<String> {
        let mut out = self.numbers_in(text);
        out.extend(self.locations_in(text));
        out.extend(self.events_in(text));
        out
    }

    pub fn entities(&self, text: &str) -> Entities {
        let matching = |entries: &[VocabEntry]| {
            entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.re.is_match(text))
                .map(|(i, _)| i)
                .collect::<BTreeSet<_>>()
        };
        Entities {
            events: matching(&self.events),
            locations: matching(&self.locations),
            numbers: self
                .numbers
                .find_iter(text)
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect(),
        }
    }
}

fn entry_hits(entries: &[VocabEntry], text: &str) -> Vec<(usize, String)> {
    entries
        .iter()
        .flat_map(|e| e.re.find_iter(text).map(|m| (m.start(), m.as_str().to_string())))
        .collect()
}

/// Lower-case, order by first position in the text, keep each spelling once.
fn distinct_in_text_order(mut hits: Vec<(usize, String)>) -> Vec<String> {
    hits.sort_by_key(|(pos, _)| *pos);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (_, s) in hits {
        let lc = s.to_lowercase();
        if seen.insert(lc.clone()) {
            out.push(lc);
        }
    }
    out
}

/// Keyword-overlap pre-filter and summary builder.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    min_token_len: usize,
    important: HashSet<String>,
    bonus_per_keyword: f32,
    bonus_cap: f32,
    summary_size: usize,
    stop_words: HashSet<String>,
    stop_list: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(cfg: &KeywordSection, stop_words: &[String]) -> Self {
        Self {
            min_token_len: cfg.min_token_len,
            important: cfg.important.iter().map(|s| s.to_lowercase()).collect(),
            bonus_per_keyword: cfg.bonus_per_keyword,
            bonus_cap: cfg.bonus_cap,
            summary_size: cfg.summary_size,
            stop_words: stop_words.iter().map(|s| s.to_lowercase()).collect(),
            stop_list: stop_words.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Whitespace tokens of at least `min_token_len` characters.
    pub fn token_set<'a>(&self, text: &'a str) -> BTreeSet<&'a str> {
        text.split_whitespace()
            .filter(|t| t.chars().count() >= self.min_token_len)
            .collect()
    }

    /// Jaccard overlap of the token sets plus a capped bonus for shared important
    /// keywords. 0 when either side has no tokens.
    pub fn keyword_overlap(&self, a: &str, b: &str) -> f32 {
        let wa = self.token_set(a);
        let wb = self.token_set(b);
        if wa.is_empty() || wb.is_empty() {
            return 0.0;
        }

        let shared: Vec<&str> = wa.intersection(&wb).copied().collect();
        let union = wa.union(&wb).count() as f32;
        let jaccard = shared.len() as f32 / union;

        let important_hits = shared
            .iter()
            .filter(|t| self.important.contains(**t))
            .count() as f32;
        let bonus = (important_hits * self.bonus_per_keyword).min(self.bonus_cap);

        (jaccard + bonus).min(1.0)
    }

    /// Top `summary_size` keywords of a cluster, one document per text.
    ///
    /// Words are ranked by TF-IDF score across the documents, ties alphabetical. Short
    /// tokens, stop words and bare numbers never make the list.
    pub fn summarize_keywords<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        let docs: Vec<String> = texts
            .iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if docs.is_empty() || self.summary_size == 0 {
            return Vec::new();
        }

        // upper bound on the vocabulary, so every word comes back ranked
        let vocab_bound = docs
            .iter()
            .flat_map(|d| d.split(|c: char| !c.is_alphanumeric()))
            .collect::<HashSet<_>>()
            .len();

        let tfidf = TfIdf::new(TfIdfParams::UnprocessedDocuments(
            &docs,
            &self.stop_list,
            None,
        ));
        let mut ranked: Vec<(String, f32)> = tfidf
            .get_ranked_word_scores(vocab_bound)
            .into_iter()
            .map(|(w, score)| (w.to_lowercase(), score))
            .filter(|(w, _)| self.is_summary_word(w))
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(self.summary_size)
            .map(|(w, _)| w)
            .collect()
    }

    fn is_summary_word(&self, w: &str) -> bool {
        w.chars().count() >= self.min_token_len
            && !self.stop_words.contains(w)
            && !w.chars().all(|c| c.is_ascii_digit() || c == '.')
    }
}
