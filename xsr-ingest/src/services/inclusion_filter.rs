//! Inclusion filter
//!
//! A series is included when its quality score passes the threshold AND its
//! instance name matches none of the exclusion patterns. Excluded records stay
//! in the collection with `included = false` so they can still be reported.

use crate::models::{PipelineConfig, SeriesRecord};
use regex::Regex;
use tracing::debug;
use xsr_common::config::ThresholdComparison;

pub struct InclusionFilter {
    threshold: i32,
    comparison: ThresholdComparison,
    exclusion_patterns: Vec<Regex>,
}

impl InclusionFilter {
    pub fn new(
        threshold: i32,
        comparison: ThresholdComparison,
        exclusion_patterns: Vec<Regex>,
    ) -> Self {
        Self {
            threshold,
            comparison,
            exclusion_patterns,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.quality_threshold,
            config.threshold_comparison,
            config.exclusion_patterns.clone(),
        )
    }

    /// First exclusion pattern found anywhere in `instance_name`
    pub fn matched_exclusion(&self, instance_name: &str) -> Option<&str> {
        self.exclusion_patterns
            .iter()
            .find(|p| p.is_match(instance_name))
            .map(Regex::as_str)
    }

    pub fn include(&self, record: &SeriesRecord) -> bool {
        self.comparison.passes(record.quality_score, self.threshold)
            && self.matched_exclusion(&record.instance_name).is_none()
    }

    /// Set `included` on every record
    pub fn apply(&self, records: &mut [SeriesRecord]) {
        for record in records.iter_mut() {
            record.included = self.include(record);

            if !record.included {
                debug!(
                    series = record.series_number,
                    instance_name = %record.instance_name,
                    quality_score = record.quality_score,
                    exclusion = ?self.matched_exclusion(&record.instance_name),
                    "Series excluded"
                );
            }
        }
    }
}
