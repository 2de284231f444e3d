// src/config.rs
//! Clustering configuration: thresholds, windows, domain lists and the data-driven
//! vocabularies (event types, gazetteer, canonicalization table, stop words).
//!
//! Every field has a default, so an empty TOML file yields the built-in seismic-news
//! setup. Lookup order for `load_default()`:
//! 1) `$CLUSTER_CONFIG_PATH`
//! 2) `config/clustering.toml`
//! 3) `config/clustering.json`
//! 4) built-in defaults
//!
//! `$SIMILARITY_THRESHOLD` overrides the threshold from any of the above.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stop_words::{get, LANGUAGE};

pub const DEFAULT_CLUSTER_CONFIG_PATH: &str = "config/clustering.toml";
pub const DEFAULT_CLUSTER_CONFIG_JSON_PATH: &str = "config/clustering.json";

pub const ENV_CLUSTER_CONFIG_PATH: &str = "CLUSTER_CONFIG_PATH";
pub const ENV_SIMILARITY_THRESHOLD: &str = "SIMILARITY_THRESHOLD";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub clustering: ClusteringSection,
    pub keywords: KeywordSection,
    pub domains: DomainSection,
    pub vocabulary: VocabularySection,
    /// Ordered canonicalization table; a `[[terms]]` list replaces the defaults.
    pub terms: Vec<TermRule>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clustering: ClusteringSection::default(),
            keywords: KeywordSection::default(),
            domains: DomainSection::default(),
            vocabulary: VocabularySection::default(),
            terms: default_terms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusteringSection {
    /// Boosted title similarity must be strictly above this to match.
    pub similarity_threshold: f32,
    /// Keyword overlap below this skips the candidate without scoring.
    pub prefilter_threshold: f32,
    /// Groups at least this old no longer accept items.
    pub stale_after_hours: u32,
    pub event_boost: f32,
    pub numeric_tolerance: f64,
    pub title_repeat: usize,
    pub body_snippet_chars: usize,
    pub salient_repeat: usize,
    /// Shortest token kept in TF-IDF vectors.
    pub min_term_chars: usize,
}

impl Default for ClusteringSection {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.25,
            prefilter_threshold: 0.15,
            stale_after_hours: 24,
            event_boost: 0.15,
            numeric_tolerance: 0.5,
            title_repeat: 3,
            body_snippet_chars: 200,
            salient_repeat: 3,
            min_term_chars: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeywordSection {
    pub min_token_len: usize,
    pub important: Vec<String>,
    pub bonus_per_keyword: f32,
    pub bonus_cap: f32,
    /// How many keywords end up in a cluster record's summary.
    pub summary_size: usize,
}

impl Default for KeywordSection {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            important: to_strings(&[
                "earthquake",
                "tsunami",
                "aftershocks",
                "aftershock",
                "mag",
                "hurricane",
                "typhoon",
                "tornado",
                "wildfire",
                "flood",
                "flooding",
                "eruption",
                "evacuation",
                "outage",
            ]),
            bonus_per_keyword: 0.1,
            bonus_cap: 0.2,
            summary_size: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DomainSection {
    /// Links to these hosts (or their subdomains) carry no signal: domain becomes empty.
    pub self_hosted: Vec<String>,
    /// Shared platforms that never trigger the domain shortcut.
    pub generic: Vec<String>,
}

impl Default for DomainSection {
    fn default() -> Self {
        Self {
            self_hosted: to_strings(&["reddit.com", "redd.it"]),
            generic: to_strings(&[
                "twitter.com",
                "x.com",
                "youtube.com",
                "youtu.be",
                "facebook.com",
                "instagram.com",
                "tiktok.com",
                "imgur.com",
            ]),
        }
    }
}

/// Pattern sets. Entries are regex fragments matched case-insensitively as whole words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VocabularySection {
    pub numbers: String,
    pub events: Vec<String>,
    pub locations: Vec<String>,
    pub stop_words: Vec<String>,
}

impl Default for VocabularySection {
    fn default() -> Self {
        Self {
            numbers: r"\d+(?:\.\d+)?".to_string(),
            events: to_strings(&[
                "earthquake",
                "aftershocks?",
                "tsunami",
                "hurricane",
                "typhoon",
                "cyclone",
                "tornado(?:es)?",
                "wildfires?",
                "floods?|flooding",
                "eruption|erupts?",
                "landslides?",
                "explosion",
                "power outage|blackout",
            ]),
            locations: to_strings(&[
                "japan",
                "tokyo",
                "osaka",
                "china",
                "taiwan",
                "indonesia",
                "philippines",
                "nepal",
                "india",
                "turkey",
                "syria",
                "iran",
                "greece",
                "italy",
                "chile",
                "peru",
                "ecuador",
                "mexico",
                "haiti",
                "new zealand",
                "australia",
                "alaska",
                "hawaii",
                "california",
                "los angeles",
                "san francisco",
                "texas",
                "florida",
                "oregon",
                "washington",
            ]),
            stop_words: default_stop_words(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermRule {
    pub pattern: String,
    pub canonical: String,
}

fn default_terms() -> Vec<TermRule> {
    [
        ("quakes?", "earthquake"),
        ("hits?", "strikes"),
        ("magnitude", "mag"),
        ("updat(?:e|es|ed|ing)", "update"),
        ("report(?:s|ed|ing)?", "report"),
        ("power outages", "power outage"),
    ]
    .into_iter()
    .map(|(pattern, canonical)| TermRule {
        pattern: pattern.to_string(),
        canonical: canonical.to_string(),
    })
    .collect()
}

/// English list from the `stop-words` crate, lower-cased. `[vocabulary] stop_words`
/// replaces it wholesale.
fn default_stop_words() -> Vec<String> {
    get(LANGUAGE::English)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect()
}

fn to_strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl ClusterConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ClusterConfig = toml::from_str(s).context("parsing clustering TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: ClusterConfig = serde_json::from_str(s).context("parsing clustering JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path. The extension picks the format (`.json` or TOML).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading clustering config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext == "json" {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Env path, then the `config/` fallbacks, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CLUSTER_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CLUSTER_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CLUSTER_CONFIG_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_CLUSTER_CONFIG_PATH))?
        } else if Path::new(DEFAULT_CLUSTER_CONFIG_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_CLUSTER_CONFIG_JSON_PATH))?
        } else {
            Self::default()
        };

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_threshold_env(std::env::var(ENV_SIMILARITY_THRESHOLD).ok()) {
            self.clustering.similarity_threshold = t;
        }
    }

    pub fn stale_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.clustering.stale_after_hours))
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.clustering;
        for (name, v) in [
            ("similarity_threshold", c.similarity_threshold),
            ("prefilter_threshold", c.prefilter_threshold),
            ("event_boost", c.event_boost),
            ("bonus_per_keyword", self.keywords.bonus_per_keyword),
            ("bonus_cap", self.keywords.bonus_cap),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                bail!("`{name}` must be within 0.0..=1.0, got {v}");
            }
        }
        if !c.numeric_tolerance.is_finite() || c.numeric_tolerance < 0.0 {
            bail!("`numeric_tolerance` must be a non-negative number");
        }
        if c.title_repeat == 0 {
            bail!("`title_repeat` must be at least 1");
        }
        if self.vocabulary.numbers.trim().is_empty() {
            bail!("`vocabulary.numbers` pattern must not be empty");
        }
        Ok(())
    }
}
