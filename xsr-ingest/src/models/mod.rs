//! Data models for xsr-ingest
//!
//! - Series records and the raw entries they are validated from
//! - Naming/filtering pipeline configuration

pub mod pipeline_config;
pub mod series_record;

pub use pipeline_config::PipelineConfig;
pub use series_record::{RawScanEntry, SeriesRecord};
