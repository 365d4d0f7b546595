//! Series naming pipeline
//!
//! # Stages
//! VALIDATE → SCORE → DISAMBIGUATE → VERIFY → FILTER
//!
//! A run is a pure function of its input records and the [`PipelineConfig`]:
//! no shared state, no I/O. Any error stops the run before a caller can name
//! files after the records.

use crate::error::PipelineError;
use crate::models::{PipelineConfig, SeriesRecord};
use crate::services::disambiguator::Disambiguator;
use crate::services::inclusion_filter::InclusionFilter;
use crate::types::SessionMetadata;
use crate::validators::{duplicate_names, verify_unique_names, QualityScorer, UNRECOGNIZED_QUALITY};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Counts for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub total: usize,
    pub included: usize,
    pub excluded: usize,
}

impl PipelineSummary {
    pub fn of(records: &[SeriesRecord]) -> Self {
        let included = records.iter().filter(|r| r.included).count();
        Self {
            total: records.len(),
            included,
            excluded: records.len() - included,
        }
    }
}

/// Naming pipeline
pub struct SeriesPipeline {
    scorer: QualityScorer,
    disambiguator: Disambiguator,
    filter: InclusionFilter,
}

impl SeriesPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            scorer: QualityScorer::with_overrides(&config.quality_overrides),
            disambiguator: Disambiguator::new(config.special_cases.iter().cloned()),
            filter: InclusionFilter::from_config(config),
        }
    }

    /// Validate raw session entries into records, then run the pipeline
    pub fn run_session(
        &self,
        session: &SessionMetadata,
    ) -> Result<Vec<SeriesRecord>, PipelineError> {
        let records = build_records(session)?;
        self.run(records)
    }

    /// Score, name, verify and filter; returns records ordered by series number
    pub fn run(&self, mut records: Vec<SeriesRecord>) -> Result<Vec<SeriesRecord>, PipelineError> {
        check_series_numbers(&records)?;

        for record in records.iter_mut() {
            record.quality_score = self.scorer.score(&record.quality_label);
            if record.quality_score == UNRECOGNIZED_QUALITY {
                debug!(
                    series = record.series_number,
                    label = %record.quality_label,
                    "Unrecognized quality label"
                );
            }
        }

        self.disambiguator.disambiguate(&mut records);

        if !verify_unique_names(&records) {
            let duplicates = duplicate_names(&records);
            error!(duplicates = ?duplicates, "Instance names not unique");
            return Err(PipelineError::NamingCollision { duplicates });
        }
        info!(count = records.len(), "Instance names verified as unique");

        self.filter.apply(&mut records);

        let summary = PipelineSummary::of(&records);
        info!(
            total = summary.total,
            included = summary.included,
            excluded = summary.excluded,
            "Series pipeline complete"
        );

        Ok(records)
    }
}

impl Default for SeriesPipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

/// Typed records from a session; a missing session date fails every entry
pub fn build_records(session: &SessionMetadata) -> Result<Vec<SeriesRecord>, PipelineError> {
    if session.entries.is_empty() {
        return Ok(Vec::new());
    }

    let date = session
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| PipelineError::malformed("*", "session has no study date"))?;

    session
        .entries
        .iter()
        .map(|entry| SeriesRecord::from_raw(entry, date))
        .collect()
}

fn check_series_numbers(records: &[SeriesRecord]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.series_number) {
            return Err(PipelineError::malformed(
                record.series_number.to_string(),
                "duplicate series number",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawScanEntry;

    fn entry(id: &str, desc: &str, quality: &str, time: &str) -> RawScanEntry {
        RawScanEntry {
            id: Some(id.to_string()),
            description: Some(desc.to_string()),
            quality: Some(quality.to_string()),
            file_count: Some("1".to_string()),
            start_time: Some(time.to_string()),
        }
    }

    #[test]
    fn test_run_session_end_to_end() {
        let session = SessionMetadata {
            date: Some("2012-05-01".to_string()),
            entries: vec![
                entry("1", "Localizer", "usable", "09:00:00"),
                entry("2", "T1w", "excellent", "09:05:00"),
                entry("3", "BOLD", "good", "09:20:00"),
                entry("4", "BOLD", "poor", "09:30:00"),
            ],
        };

        let records = SeriesPipeline::default().run_session(&session).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.instance_name.as_str()).collect();
        let included: Vec<bool> = records.iter().map(|r| r.included).collect();

        assert_eq!(names, vec!["Localizer", "T1w", "BOLD_1", "BOLD_2"]);
        assert_eq!(included, vec![false, true, true, false]);
        assert_eq!(
            PipelineSummary::of(&records),
            PipelineSummary { total: 4, included: 2, excluded: 2 }
        );
    }

    #[test]
    fn test_missing_session_date_is_malformed() {
        let session = SessionMetadata {
            date: None,
            entries: vec![entry("1", "T1w", "good", "09:00:00")],
        };
        assert!(matches!(
            SeriesPipeline::default().run_session(&session),
            Err(PipelineError::MalformedInputRecord { .. })
        ));
    }

    #[test]
    fn test_empty_session_without_date_is_fine() {
        let records = SeriesPipeline::default()
            .run_session(&SessionMetadata::default())
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_duplicate_series_number_rejected() {
        let session = SessionMetadata {
            date: Some("2012-05-01".to_string()),
            entries: vec![
                entry("1", "T1w", "good", "09:00:00"),
                entry("1", "T2w", "good", "09:10:00"),
            ],
        };
        let err = SeriesPipeline::default().run_session(&session).unwrap_err();
        assert!(err.to_string().contains("duplicate series number"));
    }

    #[test]
    fn test_collision_halts_run() {
        // A literal "BOLD_1" description collides with the first of two "BOLD" runs
        let session = SessionMetadata {
            date: Some("2012-05-01".to_string()),
            entries: vec![
                entry("1", "BOLD", "good", "09:00:00"),
                entry("2", "BOLD", "good", "09:10:00"),
                entry("3", "BOLD_1", "good", "09:20:00"),
            ],
        };

        match SeriesPipeline::default().run_session(&session) {
            Err(PipelineError::NamingCollision { duplicates }) => {
                assert_eq!(duplicates, vec!["BOLD_1".to_string()]);
            }
            other => panic!("expected naming collision, got {:?}", other),
        }
    }
}
