// src/domain.rs
//! Source-link domains for the domain shortcut.
//!
//! - `www.` is dropped, hosts are compared lower-cased.
//! - Links back to the aggregator itself (self-hosted hosts and their subdomains) yield
//!   an empty domain: a self link says nothing about the story.
//! - Generic platforms never trigger the shortcut, even when both sides share them.

use std::collections::HashSet;
use url::Url;

use crate::config::DomainSection;

#[derive(Debug, Clone)]
pub struct DomainPolicy {
    self_hosted: Vec<String>,
    generic: HashSet<String>,
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

impl DomainPolicy {
    pub fn from_config(cfg: &DomainSection) -> Self {
        Self {
            self_hosted: cfg
                .self_hosted
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            generic: cfg
                .generic
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Host of `link` without `www.`, or empty for blank, unparsable and self links.
    pub fn extract_domain(&self, link: &str) -> String {
        let link = link.trim();
        if link.is_empty() {
            return String::new();
        }
        let Ok(parsed) = Url::parse(link) else {
            return String::new();
        };
        let Some(host) = parsed.host_str() else {
            return String::new();
        };
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);

        if self.self_hosted.iter().any(|s| host_matches(host, s)) {
            return String::new();
        }
        host.to_string()
    }

    pub fn is_generic(&self, domain: &str) -> bool {
        self.generic.iter().any(|g| host_matches(domain, g))
    }

    /// Both domains equal, non-empty, and not a shared platform.
    pub fn shortcut_applies(&self, incoming: &str, group_domain: &str) -> bool {
        !incoming.is_empty() && incoming == group_domain && !self.is_generic(incoming)
    }
}
