//! Naming and filtering configuration
//!
//! Built from the `[pipeline]` TOML section. Exclusion patterns are compiled
//! once here so a bad pattern is reported before any metadata is fetched.

use crate::error::PipelineError;
use regex::Regex;
use std::collections::BTreeMap;
use xsr_common::config::{PipelineSettings, ThresholdComparison};

/// Everything a pipeline run depends on besides its input records
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub quality_threshold: i32,
    pub threshold_comparison: ThresholdComparison,
    pub exclusion_patterns: Vec<Regex>,
    pub special_cases: Vec<String>,
    /// Additions to (or overrides of) the default quality vocabulary
    pub quality_overrides: BTreeMap<String, i32>,
}

impl PipelineConfig {
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, PipelineError> {
        let exclusion_patterns = settings
            .exclusion_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| PipelineError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            quality_threshold: settings.quality_threshold,
            threshold_comparison: settings.threshold_comparison,
            exclusion_patterns,
            special_cases: settings.special_cases.clone(),
            quality_overrides: settings.quality_scores.clone(),
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&PipelineSettings::default())
            .expect("Default exclusion patterns must compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_settings_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.quality_threshold, 3);
        assert_eq!(config.threshold_comparison, ThresholdComparison::AtLeast);
        assert_eq!(config.exclusion_patterns.len(), 2);
        assert!(config.special_cases.contains(&"FieldMap_Phase".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let settings = PipelineSettings {
            exclusion_patterns: vec!["Localizer".to_string(), "(unclosed".to_string()],
            ..PipelineSettings::default()
        };

        let err = PipelineConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }
}
