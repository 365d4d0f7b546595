//! XNAT session XML parser
//!
//! Extracts the fields the naming pipeline needs from an experiment document
//! (`?format=xml`):
//!
//! ```xml
//! <xnat:MRSession xmlns:xnat="http://nrg.wustl.edu/xnat" ID="...">
//!   <xnat:date>2012-05-01</xnat:date>
//!   <xnat:scans>
//!     <xnat:scan ID="3" type="BOLD_RL">
//!       <xnat:file label="NIFTI" file_count="4"/>
//!       <xnat:quality>usable</xnat:quality>
//!       <xnat:series_description>BOLD_RL</xnat:series_description>
//!       <xnat:startTime>10:01:02</xnat:startTime>
//!     </xnat:scan>
//!   </xnat:scans>
//! </xnat:MRSession>
//! ```
//!
//! Elements are matched by local name, so the namespace prefix does not
//! matter. `scan` elements without an `ID` attribute are skipped. Missing
//! fields are left as `None`; validation happens when records are built.

use crate::models::RawScanEntry;
use crate::services::archive_client::ArchiveError;
use crate::types::SessionMetadata;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Per-scan parse state
struct ScanState {
    entry: RawScanEntry,
    /// Element depth of the `scan` element itself
    depth: usize,
}

/// Parse an experiment document, reading `file_count` from the file resource
/// labelled `resource_label`
pub fn parse_session_xml(xml: &str, resource_label: &str) -> Result<SessionMetadata, ArchiveError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut session = SessionMetadata::default();
    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut scan: Option<ScanState> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                handle_element(e, &name, path.len(), resource_label, &mut scan);
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                handle_element(e, &name, path.len(), resource_label, &mut scan);
                // A self-closing scan has no End event
                if scan.as_ref().is_some_and(|s| s.depth == path.len()) {
                    if let Some(done) = scan.take() {
                        session.entries.push(done.entry);
                    }
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
                if scan.as_ref().is_some_and(|s| s.depth == path.len()) {
                    if let Some(done) = scan.take() {
                        session.entries.push(done.entry);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ArchiveError::ParseError(format!("XML text error: {}", e)))?
                    .to_string();

                if let Some(current) = path.last() {
                    match scan.as_mut() {
                        Some(state) if path.len() == state.depth + 2 => {
                            let field = match current.as_str() {
                                "series_description" => Some(&mut state.entry.description),
                                "quality" => Some(&mut state.entry.quality),
                                "startTime" => Some(&mut state.entry.start_time),
                                _ => None,
                            };
                            if let Some(field) = field {
                                field.get_or_insert(text);
                            }
                        }
                        Some(_) => {}
                        None => {
                            if current == "date" && session.date.is_none() {
                                session.date = Some(text);
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ArchiveError::ParseError(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(session)
}

fn handle_element(
    e: &BytesStart<'_>,
    name: &str,
    depth: usize,
    resource_label: &str,
    scan: &mut Option<ScanState>,
) {
    match scan {
        None if name == "scan" => {
            if let Some(id) = attribute(e, b"ID") {
                *scan = Some(ScanState {
                    entry: RawScanEntry {
                        id: Some(id),
                        ..RawScanEntry::default()
                    },
                    depth,
                });
            }
        }
        Some(state) if name == "file" && state.entry.file_count.is_none() => {
            if attribute(e, b"label").as_deref() == Some(resource_label) {
                state.entry.file_count = attribute(e, b"file_count");
            }
        }
        _ => {}
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}
