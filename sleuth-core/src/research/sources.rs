//! Source classification.
//!
//! Maps a source URL to a `SourceType`, which caps how confident a finding taken
//! from that source can be.

use super::confidence::Confidence;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Type of research source, derived from its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Government or intergovernmental body.
    Official,
    /// Academic paper, university, or preprint server.
    Academic,
    /// Encyclopedia or standards/documentation reference.
    Reference,
    /// News outlet.
    News,
    /// Blog post or newsletter.
    Blog,
    /// Forum or Q&A site.
    Forum,
    /// Link aggregator or content farm.
    Aggregator,
    /// Anything else.
    Other,
}

const ACADEMIC_HOSTS: &[&str] = &[
    "arxiv.org",
    "scholar.google.com",
    "semanticscholar.org",
    "pubmed.ncbi.nlm.nih.gov",
    "ncbi.nlm.nih.gov",
    "nature.com",
    "sciencedirect.com",
    "springer.com",
    "ieee.org",
    "acm.org",
    "jstor.org",
    "researchgate.net",
    "ssrn.com",
    "biorxiv.org",
    "plos.org",
];

const OFFICIAL_HOSTS: &[&str] = &[
    "europa.eu",
    "un.org",
    "who.int",
    "worldbank.org",
    "oecd.org",
    "imf.org",
    "iea.org",
];

const REFERENCE_HOSTS: &[&str] = &[
    "wikipedia.org",
    "britannica.com",
    "investopedia.com",
    "w3.org",
    "ietf.org",
    "iso.org",
    "docs.rs",
];

const NEWS_HOSTS: &[&str] = &[
    "reuters.com",
    "apnews.com",
    "bbc.co.uk",
    "bbc.com",
    "nytimes.com",
    "theguardian.com",
    "wsj.com",
    "ft.com",
    "bloomberg.com",
    "economist.com",
    "cnn.com",
    "npr.org",
    "techcrunch.com",
    "wired.com",
    "theverge.com",
];

const BLOG_HOSTS: &[&str] = &[
    "medium.com",
    "substack.com",
    "wordpress.com",
    "blogspot.com",
    "dev.to",
    "hashnode.dev",
    "tumblr.com",
];

const FORUM_HOSTS: &[&str] = &[
    "reddit.com",
    "quora.com",
    "stackoverflow.com",
    "stackexchange.com",
    "news.ycombinator.com",
    "discourse.org",
];

const AGGREGATOR_HOSTS: &[&str] = &[
    "pinterest.com",
    "flipboard.com",
    "scribd.com",
    "slideshare.net",
    "msn.com",
    "yahoo.com",
];

impl SourceType {
    /// Classify a source by its URL. Unparseable URLs are `Other`.
    pub fn classify(url: &str) -> Self {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()))
        else {
            return SourceType::Other;
        };

        // Forum hosts first: news.ycombinator.com would otherwise read as news.
        if matches_any(&host, FORUM_HOSTS) || has_label(&host, &["forum", "forums", "community"]) {
            return SourceType::Forum;
        }
        if host.ends_with(".gov") || host.contains(".gov.") || matches_any(&host, OFFICIAL_HOSTS) {
            return SourceType::Official;
        }
        if host.ends_with(".edu")
            || host.contains(".ac.")
            || matches_any(&host, ACADEMIC_HOSTS)
            || has_label(&host, &["scholar", "journals"])
        {
            return SourceType::Academic;
        }
        if matches_any(&host, REFERENCE_HOSTS) || has_label(&host, &["docs", "wiki"]) {
            return SourceType::Reference;
        }
        if matches_any(&host, NEWS_HOSTS) || has_label(&host, &["news"]) {
            return SourceType::News;
        }
        if matches_any(&host, BLOG_HOSTS) || has_label(&host, &["blog"]) {
            return SourceType::Blog;
        }
        if matches_any(&host, AGGREGATOR_HOSTS) {
            return SourceType::Aggregator;
        }
        SourceType::Other
    }

    /// Highest confidence a finding from this source may carry before corroboration.
    pub fn ceiling(self) -> Confidence {
        match self {
            SourceType::Official | SourceType::Academic => Confidence::High,
            SourceType::Reference | SourceType::News | SourceType::Other => Confidence::Medium,
            SourceType::Blog | SourceType::Forum | SourceType::Aggregator => Confidence::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Official => "official",
            SourceType::Academic => "academic",
            SourceType::Reference => "reference",
            SourceType::News => "news",
            SourceType::Blog => "blog",
            SourceType::Forum => "forum",
            SourceType::Aggregator => "aggregator",
            SourceType::Other => "other",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `host` is one of `domains` or a subdomain of one.
fn matches_any(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|d| host == *d || host.strip_suffix(d).is_some_and(|rest| rest.ends_with('.')))
}

/// True when the first host label is one of `labels` (e.g. `news.example.com`).
fn has_label(host: &str, labels: &[&str]) -> bool {
    host.split('.')
        .next()
        .is_some_and(|first| labels.contains(&first))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_hosts() {
        assert_eq!(SourceType::classify("https://www.energy.gov/eere"), SourceType::Official);
        assert_eq!(SourceType::classify("https://data.gov.uk/x"), SourceType::Official);
        assert_eq!(SourceType::classify("https://arxiv.org/abs/2401.00001"), SourceType::Academic);
        assert_eq!(SourceType::classify("https://cs.stanford.edu/p"), SourceType::Academic);
        assert_eq!(SourceType::classify("https://en.wikipedia.org/wiki/Rust"), SourceType::Reference);
        assert_eq!(SourceType::classify("https://www.reuters.com/a"), SourceType::News);
        assert_eq!(SourceType::classify("https://someone.medium.com/post"), SourceType::Blog);
        assert_eq!(SourceType::classify("https://old.reddit.com/r/x"), SourceType::Forum);
        assert_eq!(SourceType::classify("https://news.ycombinator.com/item?id=1"), SourceType::Forum);
        assert_eq!(SourceType::classify("https://www.pinterest.com/pin/1"), SourceType::Aggregator);
        assert_eq!(SourceType::classify("https://acme-widgets.com/about"), SourceType::Other);
    }

    #[test]
    fn test_classify_simulated_hosts() {
        assert_eq!(
            SourceType::classify("https://scholar.example.edu/papers/x"),
            SourceType::Academic
        );
        assert_eq!(SourceType::classify("https://news.example.com/2024/x"), SourceType::News);
        assert_eq!(SourceType::classify("https://forum.example.net/t/x/1"), SourceType::Forum);
    }

    #[test]
    fn test_lookalike_domain_is_not_matched() {
        assert_eq!(SourceType::classify("https://notreuters.com/a"), SourceType::Other);
    }

    #[test]
    fn test_classify_garbage() {
        assert_eq!(SourceType::classify("not a url"), SourceType::Other);
        assert_eq!(SourceType::classify(""), SourceType::Other);
    }

    #[test]
    fn test_ceilings() {
        assert_eq!(SourceType::Academic.ceiling(), Confidence::High);
        assert_eq!(SourceType::Official.ceiling(), Confidence::High);
        assert_eq!(SourceType::News.ceiling(), Confidence::Medium);
        assert_eq!(SourceType::Other.ceiling(), Confidence::Medium);
        assert_eq!(SourceType::Forum.ceiling(), Confidence::Low);
        assert_eq!(SourceType::Blog.ceiling(), Confidence::Low);
    }
}
