//! Series records
//!
//! A [`RawScanEntry`] is what the metadata source hands over: every field
//! optional and untyped. [`SeriesRecord::from_raw`] validates it into a typed
//! record, failing closed on a missing ID, description or start time.

use crate::error::PipelineError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Untyped scan entry as read from the archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScanEntry {
    /// Scan `ID` attribute
    pub id: Option<String>,
    pub description: Option<String>,
    pub quality: Option<String>,
    /// `file_count` of the configured file resource
    pub file_count: Option<String>,
    /// Time of day (`HH:MM:SS`)
    pub start_time: Option<String>,
}

/// One scan series flowing through the naming pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Archive-assigned series number, unique within a session
    pub series_number: u32,
    /// Grouping key for disambiguation
    pub description: String,
    pub quality_label: String,
    /// Set by the quality scorer; `-1` for unrecognized labels
    pub quality_score: i32,
    pub file_count: u32,
    /// Session date combined with the scan start time
    pub timestamp: NaiveDateTime,
    /// Position within the description group, 0 until disambiguated
    pub instance_ordinal: u32,
    /// Final unique label, empty until disambiguated
    pub instance_name: String,
    /// Sole member of its group and not a special case
    pub is_unique: bool,
    /// Survived the inclusion filter
    pub included: bool,
}

impl SeriesRecord {
    pub fn new(
        series_number: u32,
        description: impl Into<String>,
        quality_label: impl Into<String>,
        file_count: u32,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            series_number,
            description: description.into(),
            quality_label: quality_label.into(),
            quality_score: -1,
            file_count,
            timestamp,
            instance_ordinal: 0,
            instance_name: String::new(),
            is_unique: false,
            included: false,
        }
    }

    /// Validate a raw entry against the session date
    ///
    /// A missing quality label becomes `"unknown"` and a missing file count
    /// becomes 0; every other missing or unparsable field is an error.
    pub fn from_raw(raw: &RawScanEntry, session_date: &str) -> Result<Self, PipelineError> {
        let id = required(raw.id.as_deref())
            .ok_or_else(|| PipelineError::malformed("?", "missing scan ID"))?;
        let series_number: u32 = id
            .parse()
            .map_err(|_| PipelineError::malformed(id, format!("scan ID '{}' is not a number", id)))?;

        let description = required(raw.description.as_deref())
            .ok_or_else(|| PipelineError::malformed(id, "missing series description"))?;

        let start_time = required(raw.start_time.as_deref())
            .ok_or_else(|| PipelineError::malformed(id, "missing start time"))?;

        let timestamp = combine_timestamp(session_date, start_time)
            .map_err(|reason| PipelineError::malformed(id, reason))?;

        let file_count = match required(raw.file_count.as_deref()) {
            Some(count) => count.parse().map_err(|_| {
                PipelineError::malformed(id, format!("file count '{}' is not a number", count))
            })?,
            None => 0,
        };

        let quality_label = required(raw.quality.as_deref()).unwrap_or("unknown");

        Ok(Self::new(
            series_number,
            description,
            quality_label,
            file_count,
            timestamp,
        ))
    }

    /// One report line, e.g. `Series 3, Instance Name: BOLD_RL_1, Instance Included: true`
    pub fn summary_line(&self) -> String {
        format!(
            "Series {}, Instance Name: {}, Instance Included: {} ({}, {})",
            self.series_number,
            self.instance_name,
            self.included,
            self.quality_label,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse `YYYY-MM-DD` + `HH:MM:SS` into a timestamp
pub fn combine_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, String> {
    let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|e| format!("invalid session date '{}': {}", date, e))?;
    let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
        .map_err(|e| format!("invalid start time '{}': {}", time, e))?;
    Ok(date.and_time(time))
}
