//! In-process XNAT stand-in
//!
//! Serves the REST calls the archive client makes: session handshake and
//! close, experiment XML, per-scan file listings and file content. Only the
//! credentials `reader:secret` are accepted.

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const SESSION_ID: &str = "A1B2C3D4E5F6";
pub const PROJECT: &str = "HCP_Phase2";
pub const SUBJECT: &str = "792564";
pub const EXPERIMENT: &str = "792564_fnca";

/// `Basic` value for reader:secret
const EXPECTED_AUTH: &str = "Basic cmVhZGVyOnNlY3JldA==";

/// One file of a scan's NIFTI resource
#[derive(Debug, Clone)]
pub struct MockFile {
    pub name: String,
    pub content: Vec<u8>,
    /// Size reported in the listing
    pub listed_size: u64,
}

/// One scan of the fixture session
#[derive(Debug, Clone)]
pub struct MockScan {
    pub id: u32,
    pub description: String,
    pub quality: String,
    pub start_time: String,
    pub files: Vec<MockFile>,
}

impl MockScan {
    pub fn new(id: u32, description: &str, quality: &str, start_time: &str) -> Self {
        Self {
            id,
            description: description.to_string(),
            quality: quality.to_string(),
            start_time: start_time.to_string(),
            files: Vec::new(),
        }
    }

    /// Add a file whose listed size matches its content
    pub fn with_file(mut self, name: &str, content: &[u8]) -> Self {
        self.files.push(MockFile {
            name: name.to_string(),
            content: content.to_vec(),
            listed_size: content.len() as u64,
        });
        self
    }

    /// Add a file the listing misreports
    pub fn with_misreported_file(mut self, name: &str, content: &[u8], listed_size: u64) -> Self {
        self.files.push(MockFile {
            name: name.to_string(),
            content: content.to_vec(),
            listed_size,
        });
        self
    }
}

/// Archive contents plus request bookkeeping
#[derive(Debug, Default)]
pub struct MockArchive {
    pub date: String,
    pub scans: BTreeMap<u32, MockScan>,
    pub closed: AtomicBool,
    pub file_requests: AtomicUsize,
}

impl MockArchive {
    pub fn new(date: &str, scans: Vec<MockScan>) -> Self {
        Self {
            date: date.to_string(),
            scans: scans.into_iter().map(|s| (s.id, s)).collect(),
            ..Self::default()
        }
    }

    /// Localizer, T1w, three BOLD_RL runs and a field map
    ///
    /// Expected naming: 6 → BOLD_RL_1, 3 → BOLD_RL_2, 4 → BOLD_RL_3 (poor),
    /// 5 → FieldMap_Magnitude_1, 1 excluded by pattern.
    pub fn reference_session() -> Self {
        Self::new(
            "2012-05-01",
            vec![
                MockScan::new(1, "Localizer", "usable", "09:58:12")
                    .with_file("792564_fnca_Localizer.nii.gz", b"localizer volume"),
                MockScan::new(2, "T1w", "excellent", "10:02:40")
                    .with_file("792564_fnca_T1w.nii.gz", b"t1 weighted volume")
                    .with_file("792564_fnca_T1w.json", b"{\"EchoTime\":0.00214}")
                    .with_file("792564_fnca_T1w.txt", b"scanner notes"),
                MockScan::new(3, "BOLD_RL", "good", "10:20:00")
                    .with_file("792564_fnca_BOLD_RL.nii.gz", b"bold run at 10:20")
                    .with_file("792564_fnca_BOLD_RL.json", b"{\"RepetitionTime\":0.72}"),
                MockScan::new(4, "BOLD_RL", "poor", "10:40:00")
                    .with_file("792564_fnca_BOLD_RL.nii.gz", b"bold run at 10:40"),
                MockScan::new(5, "FieldMap_Magnitude", "usable", "10:05:30")
                    .with_file("792564_fnca_FieldMap_Magnitude.nii.gz", b"field map magnitude"),
                MockScan::new(6, "BOLD_RL", "excellent", "10:10:00")
                    .with_file("792564_fnca_BOLD_RL.nii.gz", b"bold run at 10:10")
                    .with_file("792564_fnca_BOLD_RL.json", b"{\"RepetitionTime\":0.72}"),
            ],
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn file_requests(&self) -> usize {
        self.file_requests.load(Ordering::SeqCst)
    }
}

/// Running server
pub struct MockServer {
    pub base_url: String,
    pub archive: Arc<MockArchive>,
}

impl MockServer {
    pub async fn start(archive: MockArchive) -> Self {
        let archive = Arc::new(archive);

        let app = Router::new()
            .route("/data/JSESSION", get(open_session).delete(close_session))
            .route(
                "/data/archive/projects/:project/subjects/:subject/experiments/:experiment",
                get(experiment_xml),
            )
            .route(
                "/data/archive/projects/:project/subjects/:subject/experiments/:experiment/scans/:scan/resources/:label/files",
                get(file_listing),
            )
            .route("/files/:scan/:name", get(file_content))
            .with_state(archive.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            archive,
        }
    }
}

/// Experiment document in the shape XNAT returns for `?format=xml`
pub fn session_xml(archive: &MockArchive) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <xnat:MRSession ID=\"HCPIntradb_E1\" project=\"HCP_Phase2\" label=\"792564_fnca\" \
         xmlns:xnat=\"http://nrg.wustl.edu/xnat\">\n",
    );
    xml.push_str(&format!("  <xnat:date>{}</xnat:date>\n  <xnat:scans>\n", archive.date));
    for scan in archive.scans.values() {
        xml.push_str(&format!(
            "    <xnat:scan ID=\"{}\" type=\"{}\">\n\
             \x20     <xnat:file label=\"NIFTI\" file_count=\"{}\"/>\n\
             \x20     <xnat:quality>{}</xnat:quality>\n\
             \x20     <xnat:series_description>{}</xnat:series_description>\n\
             \x20     <xnat:startTime>{}</xnat:startTime>\n\
             \x20   </xnat:scan>\n",
            scan.id,
            scan.description,
            scan.files.len(),
            scan.quality,
            scan.description,
            scan.start_time
        ));
    }
    xml.push_str("  </xnat:scans>\n</xnat:MRSession>\n");
    xml
}

fn has_session(headers: &HeaderMap) -> bool {
    let expected = format!("JSESSIONID={}", SESSION_ID);
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(';').any(|c| c.trim() == expected))
}

async fn open_session(headers: HeaderMap) -> Response {
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(auth) if auth == EXPECTED_AUTH => (StatusCode::OK, SESSION_ID).into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn close_session(State(archive): State<Arc<MockArchive>>, headers: HeaderMap) -> StatusCode {
    if !has_session(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    archive.closed.store(true, Ordering::SeqCst);
    StatusCode::OK
}

async fn experiment_xml(
    State(archive): State<Arc<MockArchive>>,
    Path((project, subject, experiment)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if project != PROJECT || subject != SUBJECT || experiment != EXPERIMENT {
        return StatusCode::NOT_FOUND.into_response();
    }
    session_xml(&archive).into_response()
}

async fn file_listing(
    State(archive): State<Arc<MockArchive>>,
    Path((_project, _subject, _experiment, scan, label)): Path<(String, String, String, u32, String)>,
    headers: HeaderMap,
) -> Response {
    if !has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(scan) = archive.scans.get(&scan) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if label != "NIFTI" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let rows: Vec<serde_json::Value> = scan
        .files
        .iter()
        .map(|f| {
            serde_json::json!({
                "Name": f.name,
                "Size": f.listed_size.to_string(),
                "URI": format!("/files/{}/{}", scan.id, f.name),
                "collection": label,
            })
        })
        .collect();

    Json(serde_json::json!({
        "ResultSet": {
            "Result": rows,
            "totalRecords": scan.files.len().to_string(),
        }
    }))
    .into_response()
}

async fn file_content(
    State(archive): State<Arc<MockArchive>>,
    Path((scan, name)): Path<(u32, String)>,
    headers: HeaderMap,
) -> Response {
    if !has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    archive.file_requests.fetch_add(1, Ordering::SeqCst);

    archive
        .scans
        .get(&scan)
        .and_then(|s| s.files.iter().find(|f| f.name == name))
        .map(|f| f.content.clone().into_response())
        .unwrap_or_else(|| StatusCode::NOT_FOUND.into_response())
}
