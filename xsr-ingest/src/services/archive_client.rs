//! XNAT archive client
//!
//! Session handshake, experiment metadata and file access over the XNAT REST
//! API:
//!
//! | call | endpoint |
//! |------|----------|
//! | connect | `GET /data/JSESSION` (basic auth), body is the session ID |
//! | metadata | `GET /data/archive/projects/{p}/subjects/{s}/experiments/{e}?format=xml` |
//! | listing | `GET .../experiments/{e}/scans/{id}/resources/{label}/files?format=json` |
//! | content | `GET {URI}` from the listing |
//! | close | `DELETE /data/JSESSION` |
//!
//! Every request after the handshake carries `Cookie: JSESSIONID=<id>`.
//! No retries happen here.

use crate::services::session_parser::parse_session_xml;
use crate::types::{ByteStream, FileSource, MetadataSource, RemoteFile, SessionMetadata};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::COOKIE;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("xsr-ingest/", env!("CARGO_PKG_VERSION"));

/// Archive client errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed (HTTP {0})")]
    Authentication(u16),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Experiment whose scans are retrieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentTarget {
    pub project: String,
    pub subject: String,
    pub experiment: String,
}

/// Archive login
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// `ResultSet` envelope of XNAT JSON listings
#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    #[serde(rename = "ResultSet")]
    result_set: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(rename = "Result", default)]
    result: Vec<ListingRow>,
}

#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Size")]
    size: SizeField,
    #[serde(rename = "URI")]
    uri: String,
}

/// XNAT reports sizes as strings; some versions as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeField {
    Number(u64),
    Text(String),
}

impl SizeField {
    fn bytes(&self) -> Result<u64, ArchiveError> {
        match self {
            SizeField::Number(n) => Ok(*n),
            SizeField::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ArchiveError::ParseError(format!("Invalid file size '{}'", s))),
        }
    }
}

/// Parse a `files?format=json` listing
pub fn parse_file_listing(body: &str) -> Result<Vec<RemoteFile>, ArchiveError> {
    let envelope: ListingEnvelope =
        serde_json::from_str(body).map_err(|e| ArchiveError::ParseError(e.to_string()))?;

    envelope
        .result_set
        .result
        .into_iter()
        .map(|row| {
            Ok(RemoteFile {
                size: row.size.bytes()?,
                name: row.name,
                uri: row.uri,
            })
        })
        .collect()
}

/// Authenticated XNAT session
pub struct ArchiveClient {
    http_client: reqwest::Client,
    base_url: String,
    target: ExperimentTarget,
    session_id: String,
    resource_label: String,
}

impl ArchiveClient {
    /// Open a REST session
    ///
    /// `resource_label` selects the file resource whose `file_count` is
    /// reported with each scan.
    pub async fn connect(
        base_url: &str,
        target: ExperimentTarget,
        credentials: &Credentials,
        resource_label: &str,
        timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::NetworkError(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let url = format!("{}/data/JSESSION", base_url);

        tracing::debug!(url = %url, username = %credentials.username, "Requesting REST session");

        let response = http_client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| ArchiveError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ArchiveError::Authentication(status.as_u16()));
        }

        let session_id = response
            .text()
            .await
            .map_err(|e| ArchiveError::ParseError(e.to_string()))?
            .trim()
            .to_string();

        if session_id.is_empty() {
            return Err(ArchiveError::ParseError("Empty REST session ID".to_string()));
        }

        tracing::info!(
            base_url = %base_url,
            experiment = %target.experiment,
            "REST session established"
        );

        Ok(Self {
            http_client,
            base_url,
            target,
            session_id,
            resource_label: resource_label.to_string(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn experiment_url(&self) -> String {
        format!(
            "{}/data/archive/projects/{}/subjects/{}/experiments/{}",
            self.base_url, self.target.project, self.target.subject, self.target.experiment
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ArchiveError> {
        let response = self
            .http_client
            .get(url)
            .header(COOKIE, format!("JSESSIONID={}", self.session_id))
            .send()
            .await
            .map_err(|e| ArchiveError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ArchiveError::NotFound(url.to_string()));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ArchiveError::Authentication(status.as_u16()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ArchiveError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Full experiment document
    pub async fn fetch_session_xml(&self) -> Result<String, ArchiveError> {
        let url = format!("{}?format=xml", self.experiment_url());
        tracing::debug!(url = %url, "Fetching session XML");

        self.get(&url)
            .await?
            .text()
            .await
            .map_err(|e| ArchiveError::ParseError(e.to_string()))
    }

    /// End the REST session; failures are logged, not returned
    pub async fn close(self) {
        let url = format!("{}/data/JSESSION", self.base_url);
        let result = self
            .http_client
            .delete(&url)
            .header(COOKIE, format!("JSESSIONID={}", self.session_id))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("REST session closed");
            }
            Ok(response) => {
                tracing::warn!(status = response.status().as_u16(), "REST session close rejected");
            }
            Err(e) => {
                tracing::warn!("REST session close failed: {}", e);
            }
        }
    }
}

#[async_trait::async_trait]
impl MetadataSource for ArchiveClient {
    async fn fetch_session(&self) -> Result<SessionMetadata, ArchiveError> {
        let xml = self.fetch_session_xml().await?;
        let session = parse_session_xml(&xml, &self.resource_label)?;

        tracing::info!(
            date = ?session.date,
            scans = session.entries.len(),
            "Retrieved session metadata"
        );

        Ok(session)
    }
}

#[async_trait::async_trait]
impl FileSource for ArchiveClient {
    async fn list_files(
        &self,
        series_number: u32,
        resource_label: &str,
    ) -> Result<Vec<RemoteFile>, ArchiveError> {
        let url = format!(
            "{}/scans/{}/resources/{}/files?format=json",
            self.experiment_url(),
            series_number,
            resource_label
        );
        tracing::debug!(url = %url, "Listing series files");

        let body = self
            .get(&url)
            .await?
            .text()
            .await
            .map_err(|e| ArchiveError::ParseError(e.to_string()))?;

        parse_file_listing(&body)
    }

    async fn fetch(&self, file: &RemoteFile) -> Result<ByteStream, ArchiveError> {
        let url = if file.uri.starts_with("http://") || file.uri.starts_with("https://") {
            file.uri.clone()
        } else {
            format!("{}{}", self.base_url, file.uri)
        };

        let response = self.get(&url).await?;

        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| ArchiveError::NetworkError(e.to_string()))
            .boxed())
    }
}
