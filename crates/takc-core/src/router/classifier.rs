//! Query complexity classification

use crate::compress::CompressionRate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much context a query is likely to need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Low => f.write_str("low"),
            Complexity::Medium => f.write_str("medium"),
            Complexity::High => f.write_str("high"),
        }
    }
}

/// Pluggable complexity classifier
pub trait ComplexityClassifier: Send + Sync {
    fn classify(&self, query: &str) -> Complexity;
}

/// Indicators of analytical queries
const HIGH_INDICATORS: &[&str] = &[
    "analyze",
    "compare",
    "evaluate",
    "assess",
    "contrast",
    "why",
    "how",
    "explain in detail",
];

/// Indicators of descriptive queries
const MEDIUM_INDICATORS: &[&str] = &["explain", "describe", "summarize", "what are"];

/// Keyword classifier: a query matches an indicator when its lower-cased
/// text contains it, so inflections like "compared" or "summarized" count
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ComplexityClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> Complexity {
        let lower = query.to_lowercase();

        if HIGH_INDICATORS.iter().any(|k| lower.contains(k)) {
            Complexity::High
        } else if MEDIUM_INDICATORS.iter().any(|k| lower.contains(k)) {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }
}

/// Map a complexity class to the rate that serves it
pub fn select_rate(complexity: Complexity, low_complexity_rate: CompressionRate) -> CompressionRate {
    match complexity {
        Complexity::Low => low_complexity_rate,
        Complexity::Medium => CompressionRate::Medium,
        Complexity::High => CompressionRate::Light,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(q: &str) -> Complexity {
        KeywordClassifier::new().classify(q)
    }

    #[test]
    fn test_high_indicators() {
        assert_eq!(classify("Analyze the trend"), Complexity::High);
        assert_eq!(classify("Compare Q1 and Q2 margins"), Complexity::High);
        assert_eq!(classify("Why did costs rise?"), Complexity::High);
        assert_eq!(classify("how does pricing work"), Complexity::High);
        assert_eq!(classify("Please explain in detail the churn"), Complexity::High);
    }

    #[test]
    fn test_medium_indicators() {
        assert_eq!(classify("Explain the revenue model"), Complexity::Medium);
        assert_eq!(classify("Summarize the report."), Complexity::Medium);
        assert_eq!(classify("What are the main risks?"), Complexity::Medium);
    }

    #[test]
    fn test_low_by_default() {
        assert_eq!(classify("What is the revenue?"), Complexity::Low);
        assert_eq!(classify(""), Complexity::Low);
    }

    #[test]
    fn test_inflected_keywords_match() {
        assert_eq!(classify("Compared Q1 and Q2 margins"), Complexity::High);
        assert_eq!(classify("Analyzed the trend"), Complexity::High);
        assert_eq!(classify("Explaining the revenue model"), Complexity::Medium);
        assert_eq!(classify("Summarized risks please"), Complexity::Medium);
    }

    #[test]
    fn test_keywords_match_inside_words() {
        // containment, not word boundaries
        assert_eq!(classify("show the revenue"), Complexity::High);
        assert_eq!(classify("descriptions of assets"), Complexity::Low);
        assert_eq!(classify("EXPLAIN the chart"), Complexity::Medium);
    }

    #[test]
    fn test_select_rate() {
        assert_eq!(
            select_rate(Complexity::High, CompressionRate::High),
            CompressionRate::Light
        );
        assert_eq!(
            select_rate(Complexity::Medium, CompressionRate::High),
            CompressionRate::Medium
        );
        assert_eq!(
            select_rate(Complexity::Low, CompressionRate::High),
            CompressionRate::High
        );
        assert_eq!(
            select_rate(Complexity::Low, CompressionRate::Ultra),
            CompressionRate::Ultra
        );
    }
}
