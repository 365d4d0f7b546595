//! xsr-ingest library interface
//!
//! Retrieves imaging series metadata from an XNAT archive, gives every series
//! a stable collision-free instance name, filters by quality and type, and
//! downloads the surviving series' files.
//!
//! The naming pipeline (`services::series_pipeline`) is synchronous and pure;
//! the archive client and downloader are async collaborators around it.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod validators;

pub use crate::error::{IngestError, IngestResult, PipelineError};
pub use crate::models::{PipelineConfig, RawScanEntry, SeriesRecord};
pub use crate::services::SeriesPipeline;
