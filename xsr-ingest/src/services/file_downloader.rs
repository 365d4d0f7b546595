//! Series file downloader
//!
//! For every included series:
//! 1. List the files of the configured resource and keep those ending in one
//!    of the configured suffixes.
//! 2. Rename: the first occurrence of the series description in the file name
//!    is replaced by the instance name.
//! 3. Stream the content to `<name>.part` while hashing (SHA-256), then rename
//!    into place.
//! 4. Compare the byte count with the size reported by the listing.
//!
//! A size mismatch is logged and reported under [`SizeMismatchPolicy::Warn`];
//! under [`SizeMismatchPolicy::Strict`] it aborts the run. A `manifest.json`
//! describing every transferred file is written at the end.

use crate::models::SeriesRecord;
use crate::types::{ByteStream, FileSource, RemoteFile};
use crate::services::archive_client::ArchiveError;
use futures::StreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use xsr_common::config::{DownloadSettings, SizeMismatchPolicy};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Downloader errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// Listing or fetching failed
    #[error("Archive error for {0}: {1}")]
    Archive(String, #[source] ArchiveError),

    /// Local file system error
    #[error("File access error {0}: {1}")]
    FileAccess(PathBuf, String),

    /// Transferred byte count differs from the listing (strict mode)
    #[error("Size mismatch for {file}: expected {expected} bytes, received {actual}")]
    SizeMismatch {
        file: String,
        expected: u64,
        actual: u64,
    },

    /// Two planned downloads resolve to the same local file, or one would
    /// replace the manifest
    #[error("Duplicate local file name: {0}")]
    DuplicateTarget(String),

    /// Local name is not a single plain file name inside the output directory
    #[error("Unsafe local file name: {0}")]
    UnsafeName(String),
}

/// One file scheduled for transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDownload {
    pub series_number: u32,
    pub instance_name: String,
    pub remote: RemoteFile,
    pub local_name: String,
}

/// Outcome of one transferred file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub series_number: u32,
    pub instance_name: String,
    pub remote_name: String,
    pub local_name: String,
    pub expected_size: u64,
    pub actual_size: u64,
    pub sha256: String,
}

impl FileOutcome {
    pub fn size_matches(&self) -> bool {
        self.expected_size == self.actual_size
    }
}

/// Result of a download run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub files: Vec<FileOutcome>,
    pub series_downloaded: usize,
}

impl DownloadReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.size_matches())
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.actual_size).sum()
    }
}

/// Local file name: first occurrence of `description` replaced by `instance_name`
pub fn local_file_name(remote_name: &str, description: &str, instance_name: &str) -> String {
    if description.is_empty() {
        return remote_name.to_string();
    }
    remote_name.replacen(description, instance_name, 1)
}

/// True when `name` is exactly one normal path component (no separators,
/// no `..`, not absolute)
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Files of one series worth downloading, renamed after the instance name
pub fn plan_series_downloads(
    record: &SeriesRecord,
    files: &[RemoteFile],
    suffixes: &[String],
) -> Vec<PlannedDownload> {
    files
        .iter()
        .filter(|f| suffixes.is_empty() || suffixes.iter().any(|s| f.name.ends_with(s.as_str())))
        .map(|f| PlannedDownload {
            series_number: record.series_number,
            instance_name: record.instance_name.clone(),
            remote: f.clone(),
            local_name: local_file_name(&f.name, &record.description, &record.instance_name),
        })
        .collect()
}

/// Downloads included series through a [`FileSource`]
pub struct SeriesDownloader<'a, S: FileSource + ?Sized> {
    source: &'a S,
    output_dir: PathBuf,
    resource_label: String,
    file_suffixes: Vec<String>,
    policy: SizeMismatchPolicy,
}

impl<'a, S: FileSource + ?Sized> SeriesDownloader<'a, S> {
    pub fn new(source: &'a S, settings: &DownloadSettings) -> Self {
        Self {
            source,
            output_dir: settings.output_dir.clone(),
            resource_label: settings.resource_label.clone(),
            file_suffixes: settings.file_suffixes.clone(),
            policy: settings.size_mismatch,
        }
    }

    /// Download every `included` record; excluded records are skipped
    pub async fn download_all(
        &self,
        records: &[SeriesRecord],
    ) -> Result<DownloadReport, TransferError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| TransferError::FileAccess(self.output_dir.clone(), e.to_string()))?;

        let mut plan = Vec::new();
        let mut series_downloaded = 0;

        for record in records.iter().filter(|r| r.included) {
            let files = self
                .source
                .list_files(record.series_number, &self.resource_label)
                .await
                .map_err(|e| TransferError::Archive(record.instance_name.clone(), e))?;

            let planned = plan_series_downloads(record, &files, &self.file_suffixes);
            tracing::info!(
                series = record.series_number,
                instance_name = %record.instance_name,
                listed = files.len(),
                selected = planned.len(),
                "Planned series download"
            );

            if !planned.is_empty() {
                series_downloaded += 1;
            }
            plan.extend(planned);
        }

        let mut targets = HashSet::from([MANIFEST_FILE_NAME]);
        for item in &plan {
            if !is_plain_file_name(&item.local_name) {
                tracing::error!(
                    series = item.series_number,
                    remote = %item.remote.name,
                    "Listed file name escapes the output directory"
                );
                return Err(TransferError::UnsafeName(item.local_name.clone()));
            }
            if !targets.insert(item.local_name.as_str()) {
                return Err(TransferError::DuplicateTarget(item.local_name.clone()));
            }
        }

        let mut report = DownloadReport {
            files: Vec::with_capacity(plan.len()),
            series_downloaded,
        };

        for item in &plan {
            let outcome = self.transfer(item).await?;

            if !outcome.size_matches() {
                match self.policy {
                    SizeMismatchPolicy::Warn => {
                        tracing::warn!(
                            file = %outcome.local_name,
                            expected = outcome.expected_size,
                            actual = outcome.actual_size,
                            "Downloaded size does not match archive listing"
                        );
                    }
                    SizeMismatchPolicy::Strict => {
                        tracing::error!(
                            file = %outcome.local_name,
                            expected = outcome.expected_size,
                            actual = outcome.actual_size,
                            "Downloaded size does not match archive listing"
                        );
                        return Err(TransferError::SizeMismatch {
                            file: outcome.local_name,
                            expected: outcome.expected_size,
                            actual: outcome.actual_size,
                        });
                    }
                }
            }

            report.files.push(outcome);
        }

        self.write_manifest(&report).await?;

        tracing::info!(
            series = report.series_downloaded,
            files = report.files.len(),
            bytes = report.total_bytes(),
            mismatches = report.mismatches().count(),
            "Download complete"
        );

        Ok(report)
    }

    async fn transfer(&self, item: &PlannedDownload) -> Result<FileOutcome, TransferError> {
        let target = self.output_dir.join(&item.local_name);
        let part = part_path(&target);

        tracing::debug!(
            remote = %item.remote.name,
            local = %target.display(),
            size = item.remote.size,
            "Transferring file"
        );

        let stream = self
            .source
            .fetch(&item.remote)
            .await
            .map_err(|e| TransferError::Archive(item.remote.name.clone(), e))?;

        let file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| TransferError::FileAccess(part.clone(), e.to_string()))?;

        let (received, sha256) = match write_part(item, stream, file, &part, &target).await {
            Ok(written) => written,
            Err(e) => {
                discard_part(&part).await;
                return Err(e);
            }
        };

        Ok(FileOutcome {
            series_number: item.series_number,
            instance_name: item.instance_name.clone(),
            remote_name: item.remote.name.clone(),
            local_name: item.local_name.clone(),
            expected_size: item.remote.size,
            actual_size: received,
            sha256,
        })
    }

    async fn write_manifest(&self, report: &DownloadReport) -> Result<(), TransferError> {
        let path = self.output_dir.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_vec_pretty(report)
            .map_err(|e| TransferError::FileAccess(path.clone(), e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| TransferError::FileAccess(path.clone(), e.to_string()))
    }
}

/// Stream into `part`, then rename it to `target`; returns byte count and SHA-256
async fn write_part(
    item: &PlannedDownload,
    mut stream: ByteStream,
    mut file: tokio::fs::File,
    part: &Path,
    target: &Path,
) -> Result<(u64, String), TransferError> {
    let mut hasher = Sha256::new();
    let mut received = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransferError::Archive(item.remote.name.clone(), e))?;
        hasher.update(&chunk);
        received += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| TransferError::FileAccess(part.to_path_buf(), e.to_string()))?;
    }

    file.flush()
        .await
        .map_err(|e| TransferError::FileAccess(part.to_path_buf(), e.to_string()))?;
    drop(file);

    tokio::fs::rename(part, target)
        .await
        .map_err(|e| TransferError::FileAccess(target.to_path_buf(), e.to_string()))?;

    Ok((received, format!("{:x}", hasher.finalize())))
}

/// Best-effort removal of an abandoned `.part` file
async fn discard_part(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => tracing::debug!(path = %part.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %part.display(),
            "Failed to remove partial download: {}",
            e
        ),
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
