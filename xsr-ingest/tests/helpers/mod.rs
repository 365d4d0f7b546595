//! Test Helper Utilities
//!
//! Shared utilities for testing xsr-ingest

#![allow(dead_code)]

pub mod log_capture;
pub mod mock_archive;

// Re-export commonly used items
pub use log_capture::{capture_logs, LogCapture};
pub use mock_archive::{
    session_xml, MockArchive, MockScan, MockServer, EXPERIMENT, PROJECT, SESSION_ID, SUBJECT,
};
