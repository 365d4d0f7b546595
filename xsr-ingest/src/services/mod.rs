//! Service modules for series retrieval
//!
//! Naming pipeline (synchronous, pure):
//! - `disambiguator` - ordinals and instance names
//! - `inclusion_filter` - quality threshold and exclusion patterns
//! - `series_pipeline` - sequences scoring, naming, verification, filtering
//!
//! Archive collaborators (async):
//! - `archive_client` - XNAT REST session, metadata, file listing and content
//! - `session_parser` - experiment XML to raw scan entries
//! - `file_downloader` - renamed, size-checked series downloads

pub mod archive_client;
pub mod disambiguator;
pub mod file_downloader;
pub mod inclusion_filter;
pub mod series_pipeline;
pub mod session_parser;

pub use archive_client::{ArchiveClient, ArchiveError, Credentials, ExperimentTarget};
pub use disambiguator::Disambiguator;
pub use file_downloader::{DownloadReport, FileOutcome, SeriesDownloader, TransferError};
pub use inclusion_filter::InclusionFilter;
pub use series_pipeline::{PipelineSummary, SeriesPipeline};
pub use session_parser::parse_session_xml;
