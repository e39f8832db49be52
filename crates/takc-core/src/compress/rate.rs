//! Compression rates and their target ratios

use crate::error::TakcError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named compression level, ordered from most to least aggressive
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CompressionRate {
    /// 64x
    Ultra,
    /// 32x
    High,
    /// 16x
    Medium,
    /// 8x
    Light,
}

impl CompressionRate {
    /// Every rate, most aggressive first
    pub const ALL: [CompressionRate; 4] = [
        CompressionRate::Ultra,
        CompressionRate::High,
        CompressionRate::Medium,
        CompressionRate::Light,
    ];

    /// Target token reduction factor
    pub const fn target_ratio(self) -> usize {
        match self {
            CompressionRate::Ultra => 64,
            CompressionRate::High => 32,
            CompressionRate::Medium => 16,
            CompressionRate::Light => 8,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CompressionRate::Ultra => "ultra",
            CompressionRate::High => "high",
            CompressionRate::Medium => "medium",
            CompressionRate::Light => "light",
        }
    }

    /// Output budget for `original_tokens` of input (floor, at least 1)
    pub fn target_tokens(self, original_tokens: usize) -> usize {
        (original_tokens / self.target_ratio()).max(1)
    }
}

impl fmt::Display for CompressionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionRate {
    type Err = TakcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ultra" => Ok(CompressionRate::Ultra),
            "high" => Ok(CompressionRate::High),
            "medium" => Ok(CompressionRate::Medium),
            "light" => Ok(CompressionRate::Light),
            other => Err(TakcError::InvalidInput(format!(
                "Unknown compression rate '{}' (expected ultra, high, medium or light)",
                other
            ))),
        }
    }
}

/// How the working context is fed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// One call over the whole working context
    #[default]
    SinglePass,
    /// Fold chunks: compress(previous result + next chunk)
    Iterative,
}

impl fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionStrategy::SinglePass => f.write_str("single_pass"),
            CompressionStrategy::Iterative => f.write_str("iterative"),
        }
    }
}

impl FromStr for CompressionStrategy {
    type Err = TakcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single_pass" => Ok(CompressionStrategy::SinglePass),
            "iterative" => Ok(CompressionStrategy::Iterative),
            other => Err(TakcError::InvalidInput(format!(
                "Unknown compression strategy '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_table() {
        let ratios: Vec<usize> = CompressionRate::ALL.iter().map(|r| r.target_ratio()).collect();
        assert_eq!(ratios, vec![64, 32, 16, 8]);
    }

    #[test]
    fn test_ordering_most_aggressive_first() {
        assert!(CompressionRate::Ultra < CompressionRate::High);
        assert!(CompressionRate::Medium < CompressionRate::Light);
        let mut rates = vec![CompressionRate::Light, CompressionRate::Ultra];
        rates.sort();
        assert_eq!(rates, vec![CompressionRate::Ultra, CompressionRate::Light]);
    }

    #[test]
    fn test_target_tokens_floor_min_one() {
        assert_eq!(CompressionRate::Medium.target_tokens(1000), 62);
        assert_eq!(CompressionRate::Ultra.target_tokens(1000), 15);
        assert_eq!(CompressionRate::Ultra.target_tokens(10), 1);
        assert_eq!(CompressionRate::Light.target_tokens(0), 1);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("ULTRA".parse::<CompressionRate>().unwrap(), CompressionRate::Ultra);
        assert_eq!(" light ".parse::<CompressionRate>().unwrap(), CompressionRate::Light);
        assert!("extreme".parse::<CompressionRate>().is_err());
        assert_eq!(CompressionRate::High.to_string(), "high");
        assert_eq!(
            serde_json::to_string(&CompressionRate::Medium).unwrap(),
            "\"medium\""
        );
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "iterative".parse::<CompressionStrategy>().unwrap(),
            CompressionStrategy::Iterative
        );
        assert_eq!(
            "single-pass".parse::<CompressionStrategy>().unwrap(),
            CompressionStrategy::SinglePass
        );
    }
}
