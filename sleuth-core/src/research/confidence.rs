//! Confidence levels and their aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much a finding can be trusted. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Contribution of one finding to the overall score.
    pub fn weight(self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Medium => 0.6,
            Confidence::Low => 0.3,
        }
    }

    /// One level up, saturating at `High`.
    pub fn upgrade(self) -> Self {
        match self {
            Confidence::Low => Confidence::Medium,
            Confidence::Medium | Confidence::High => Confidence::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    /// Lenient parse of a model's self-rating.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "strong" => Ok(Confidence::High),
            "medium" | "moderate" | "mid" => Ok(Confidence::Medium),
            "low" | "weak" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence level '{other}'")),
        }
    }
}

/// Per-level counts and the weighted overall score of a finding set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
    /// Weighted mean of finding confidence in `[0, 1]`; `0` for an empty set.
    pub overall_score: f64,
}

impl ConfidenceSummary {
    /// Summarize a set of confidence levels.
    pub fn aggregate<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = Confidence>,
    {
        let mut summary = Self::default();
        for level in levels {
            match level {
                Confidence::High => summary.high += 1,
                Confidence::Medium => summary.medium += 1,
                Confidence::Low => summary.low += 1,
            }
        }
        summary.total = summary.high + summary.medium + summary.low;
        if summary.total > 0 {
            let weighted = summary.high as f64 * Confidence::High.weight()
                + summary.medium as f64 * Confidence::Medium.weight()
                + summary.low as f64 * Confidence::Low.weight();
            summary.overall_score = weighted / summary.total as f64;
        }
        summary
    }

    /// Human label for the overall score.
    pub fn label(&self) -> &'static str {
        match self.overall_score {
            s if s >= 0.8 => "high",
            s if s >= 0.5 => "moderate",
            _ if self.total == 0 => "none",
            _ => "low",
        }
    }
}
