//! Cross-source corroboration of findings.
//!
//! Two findings corroborate each other when they come from different sub-queries
//! and different source URLs and their keyword sets are similar enough. The
//! research question's own words are ignored, since every finding shares them.

use super::analysis::Finding;
use std::collections::BTreeSet;
use tracing::debug;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "shall", "should", "may", "might", "must", "can",
    "could", "of", "in", "to", "for", "with", "on", "at", "from", "by", "about", "as", "into",
    "through", "during", "before", "after", "above", "below", "between", "this", "that",
    "these", "those", "it", "its", "and", "but", "or", "than", "their", "there", "which", "who",
    "what", "when", "where", "how", "not", "more", "most", "also", "such",
];

/// Keyword-overlap corroboration rule.
#[derive(Debug, Clone)]
pub struct CorroborationPolicy {
    threshold: f64,
    query_words: BTreeSet<String>,
}

impl CorroborationPolicy {
    pub fn new(threshold: f64, research_query: &str) -> Self {
        Self {
            threshold,
            query_words: tokenize(research_query).collect(),
        }
    }

    /// Lower-cased content words of `text`, minus stop words and query words.
    pub fn keywords(&self, text: &str) -> BTreeSet<String> {
        tokenize(text)
            .filter(|w| !self.query_words.contains(w))
            .collect()
    }

    /// Jaccard similarity of two keyword sets. Empty sets are never similar.
    pub fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(b).count();
        let union = a.union(b).count();
        intersection as f64 / union as f64
    }

    /// For each finding, whether some independent finding backs it up.
    pub fn corroborated(&self, findings: &[Finding]) -> Vec<bool> {
        let keywords: Vec<_> = findings.iter().map(|f| self.keywords(&f.statement)).collect();
        findings
            .iter()
            .enumerate()
            .map(|(i, finding)| {
                findings.iter().enumerate().any(|(j, other)| {
                    i != j
                        && other.sub_query_id != finding.sub_query_id
                        && other.source_url != finding.source_url
                        && Self::similarity(&keywords[i], &keywords[j]) >= self.threshold
                })
            })
            .collect()
    }

    /// Mark corroborated findings and raise their confidence one level.
    ///
    /// Flags are computed on the whole set before any finding is changed.
    pub fn apply(&self, findings: &mut [Finding]) -> usize {
        let flags = self.corroborated(findings);
        let mut upgraded = 0;
        for (finding, corroborated) in findings.iter_mut().zip(flags) {
            if corroborated {
                finding.corroborated = true;
                finding.confidence = finding.confidence.upgrade();
                upgraded += 1;
            }
        }
        debug!(total = findings.len(), corroborated = upgraded, "Applied corroboration");
        upgraded
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::confidence::Confidence;
    use crate::research::sources::SourceType;
    use uuid::Uuid;

    fn finding(sub_query: Uuid, url: &str, statement: &str, confidence: Confidence) -> Finding {
        Finding {
            sub_query_id: sub_query,
            source_url: url.to_string(),
            source_type: SourceType::classify(url),
            statement: statement.to_string(),
            confidence,
            corroborated: false,
        }
    }

    #[test]
    fn test_keywords_drop_stop_and_query_words() {
        let policy = CorroborationPolicy::new(0.5, "Solar panel efficiency");
        let kw = policy.keywords("The efficiency of solar cells has improved by 20% in a decade");
        let expected: BTreeSet<String> = ["cells", "improved", "decade"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(kw, expected);
    }

    #[test]
    fn test_similarity() {
        let a: BTreeSet<String> = ["x1y", "abc", "def"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["abc", "def", "ghi"].iter().map(|s| s.to_string()).collect();
        assert!((CorroborationPolicy::similarity(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(CorroborationPolicy::similarity(&a, &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_corroboration_requires_independent_source() {
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let policy = CorroborationPolicy::new(0.5, "grid storage");
        let mut findings = vec![
            finding(q1, "https://a.org/1", "Lithium prices fell sharply during 2023", Confidence::Low),
            finding(q2, "https://b.org/2", "Lithium prices fell sharply during 2023", Confidence::Medium),
            // Same sub-query as the first: does not count.
            finding(q1, "https://c.org/3", "Pumped hydro dominates installed capacity", Confidence::Low),
            // Same URL as the second, different sub-query: does not count.
            finding(q1, "https://b.org/2", "Pumped hydro dominates installed capacity", Confidence::Low),
        ];
        let upgraded = policy.apply(&mut findings);
        assert_eq!(upgraded, 2);
        assert!(findings[0].corroborated && findings[1].corroborated);
        assert_eq!(findings[0].confidence, Confidence::Medium);
        assert_eq!(findings[1].confidence, Confidence::High);
        assert!(!findings[2].corroborated && !findings[3].corroborated);
        assert_eq!(findings[2].confidence, Confidence::Low);
    }

    #[test]
    fn test_high_stays_high() {
        let policy = CorroborationPolicy::new(0.5, "topic");
        let mut findings = vec![
            finding(Uuid::new_v4(), "https://a.gov/1", "Emissions dropped nationwide", Confidence::High),
            finding(Uuid::new_v4(), "https://b.gov/1", "Emissions dropped nationwide", Confidence::High),
        ];
        policy.apply(&mut findings);
        assert!(findings.iter().all(|f| f.confidence == Confidence::High && f.corroborated));
    }

    #[test]
    fn test_order_independent() {
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let base = vec![
            finding(ids[0], "https://a.org", "wind turbines blade recycling remains costly", Confidence::Low),
            finding(ids[1], "https://b.org", "blade recycling remains costly for wind turbines", Confidence::Low),
            finding(ids[2], "https://c.org", "offshore installations doubled", Confidence::Medium),
        ];
        let policy = CorroborationPolicy::new(0.5, "energy");
        let mut forward = base.clone();
        policy.apply(&mut forward);
        let mut reversed: Vec<_> = base.into_iter().rev().collect();
        policy.apply(&mut reversed);
        reversed.reverse();
        assert_eq!(forward, reversed);
    }
}
