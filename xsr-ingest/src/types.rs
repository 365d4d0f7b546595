//! Collaborator traits and the values exchanged with them
//!
//! The naming pipeline never talks to the archive directly. It receives a
//! [`SessionMetadata`] from a [`MetadataSource`]; the downloader lists and
//! fetches files through a [`FileSource`]. `ArchiveClient` implements both
//! against XNAT's REST API; tests substitute in-memory implementations.

use crate::models::RawScanEntry;
use crate::services::archive_client::ArchiveError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Session-level metadata as handed over by the metadata source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Study date (`YYYY-MM-DD`), combined with each scan's start time
    pub date: Option<String>,
    /// Scan entries in document order
    pub entries: Vec<RawScanEntry>,
}

/// One file in a series resource, as listed by the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    /// Size in bytes reported by the archive
    pub size: u64,
    /// Archive-relative URI used to fetch the content
    pub uri: String,
}

/// Stream of content chunks for one remote file
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ArchiveError>>;

/// Supplies the scan entries of one imaging session
///
/// # Example
/// ```rust,ignore
/// #[async_trait::async_trait]
/// impl MetadataSource for FixtureSource {
///     async fn fetch_session(&self) -> Result<SessionMetadata, ArchiveError> {
///         Ok(self.session.clone())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_session(&self) -> Result<SessionMetadata, ArchiveError>;
}

/// Lists and fetches the files of a series
#[async_trait::async_trait]
pub trait FileSource: Send + Sync {
    /// Files of `resource_label` under series `series_number`
    async fn list_files(
        &self,
        series_number: u32,
        resource_label: &str,
    ) -> Result<Vec<RemoteFile>, ArchiveError>;

    /// Open a content stream for a listed file
    async fn fetch(&self, file: &RemoteFile) -> Result<ByteStream, ArchiveError>;
}
