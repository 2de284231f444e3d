// src/normalize.rs
//! Text normalizer: turns a raw (title, body) pair into the canonical, lower-cased token
//! string used by every comparison.
//!
//! Steps, in order:
//! 1) HTML entity decode (listings deliver `&amp;` and friends)
//! 2) title repeated `title_repeat` times + body truncated to `body_snippet_chars`
//! 3) term canonicalization from the configured table (whole word, case-insensitive)
//! 4) salient tokens (numbers, locations, event terms) collected from this pre-strip text
//! 5) noise stripping: `[...]`, `(...)`, "breaking", "live update(s)", URLs, punctuation
//! 6) each salient token re-appended `salient_repeat` times
//! 7) lower-case

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Serialize;
use std::fmt;

use crate::config::ClusterConfig;
use crate::features::Vocabulary;

static RE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static RE_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());
static RE_LIVE_UPDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blive\s+updates?\b").unwrap());
static RE_BREAKING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bbreaking\b").unwrap());
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap());
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Output of [`Normalizer::normalize`]. Cheap to recompute, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
struct TermRewrite {
    re: Regex,
    canonical: String,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    title_repeat: usize,
    body_snippet_chars: usize,
    salient_repeat: usize,
    terms: Vec<TermRewrite>,
    vocabulary: Vocabulary,
}

impl Normalizer {
    pub fn from_config(cfg: &ClusterConfig) -> Result<Self> {
        let terms = cfg
            .terms
            .iter()
            .filter(|t| !t.pattern.trim().is_empty())
            .map(|t| {
                let re = Regex::new(&format!(r"(?i)\b(?:{})\b", t.pattern.trim()))
                    .with_context(|| format!("term `{}` regex error", t.pattern))?;
                Ok(TermRewrite {
                    re,
                    canonical: t.canonical.to_lowercase(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            title_repeat: cfg.clustering.title_repeat.max(1),
            body_snippet_chars: cfg.clustering.body_snippet_chars,
            salient_repeat: cfg.clustering.salient_repeat,
            terms,
            vocabulary: Vocabulary::from_config(&cfg.vocabulary)?,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Apply the canonicalization table only (no stripping, case kept outside matches).
    pub fn canonicalize(&self, text: &str) -> String {
        let mut out = text.to_string();
        for t in &self.terms {
            if t.re.is_match(&out) {
                out = t.re.replace_all(&out, NoExpand(&t.canonical)).into_owned();
            }
        }
        out
    }

    /// Entity-decoded, canonicalized title, as used for event matching.
    pub fn canonical_title(&self, title: &str) -> String {
        self.canonicalize(&decode(title))
    }

    pub fn normalize(&self, title: &str, body: &str) -> NormalizedText {
        let title = decode(title);
        let snippet: String = decode(body).chars().take(self.body_snippet_chars).collect();

        let mut text = String::with_capacity((title.len() + 1) * self.title_repeat + snippet.len());
        for _ in 0..self.title_repeat {
            text.push_str(&title);
            text.push(' ');
        }
        text.push_str(&snippet);

        let text = self.canonicalize(&text);
        let salient = self.vocabulary.salient_tokens(&text);

        let mut out = strip_noise(&text);
        for tok in &salient {
            for _ in 0..self.salient_repeat {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(tok);
            }
        }

        NormalizedText(out.to_lowercase())
    }

    pub fn normalize_title(&self, title: &str) -> NormalizedText {
        self.normalize(title, "")
    }
}

fn decode(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

fn strip_noise(text: &str) -> String {
    let out = RE_BRACKETS.replace_all(text, " ");
    let out = RE_PARENS.replace_all(&out, " ");
    let out = RE_LIVE_UPDATE.replace_all(&out, "update");
    let out = RE_BREAKING.replace_all(&out, " ");
    let out = RE_URL.replace_all(&out, " ");
    let out = RE_PUNCT.replace_all(&out, " ");
    let out = RE_WS.replace_all(&out, " ");
    out.trim().to_string()
}
