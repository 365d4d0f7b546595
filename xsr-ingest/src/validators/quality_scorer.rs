//! Quality Scorer
//!
//! Maps a scan's quality label to a numeric score.
//!
//! # Vocabulary
//! | label     | score |
//! |-----------|-------|
//! | unknown   | -1    |
//! | unusable  | 0     |
//! | poor      | 1     |
//! | fair      | 2     |
//! | good      | 3     |
//! | excellent | 4     |
//! | usable    | 5     |
//!
//! Deployments extend the table through `[pipeline.quality_scores]`
//! (e.g. `undetermined = 6`). Lookup is exact and case-sensitive.
//!
//! # Fallback
//! Scoring is total: any label not in the table scores
//! [`UNRECOGNIZED_QUALITY`]. That is the contract, not an error, and the
//! sentinel fails every non-negative threshold downstream.

use std::collections::{BTreeMap, HashMap};

/// Score for labels outside the vocabulary
pub const UNRECOGNIZED_QUALITY: i32 = -1;

const DEFAULT_VOCABULARY: [(&str, i32); 7] = [
    ("unknown", -1),
    ("unusable", 0),
    ("poor", 1),
    ("fair", 2),
    ("good", 3),
    ("excellent", 4),
    ("usable", 5),
];

/// Quality label scorer
#[derive(Debug, Clone)]
pub struct QualityScorer {
    scores: HashMap<String, i32>,
}

impl QualityScorer {
    /// Scorer with the default vocabulary
    pub fn new() -> Self {
        Self {
            scores: DEFAULT_VOCABULARY
                .iter()
                .map(|(label, score)| (label.to_string(), *score))
                .collect(),
        }
    }

    /// Default vocabulary plus deployment-specific entries
    pub fn with_overrides(overrides: &BTreeMap<String, i32>) -> Self {
        let mut scorer = Self::new();
        for (label, score) in overrides {
            scorer.scores.insert(label.clone(), *score);
        }
        scorer
    }

    pub fn score(&self, label: &str) -> i32 {
        self.scores
            .get(label)
            .copied()
            .unwrap_or(UNRECOGNIZED_QUALITY)
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}
