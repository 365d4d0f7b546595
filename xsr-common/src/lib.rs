//! # XSR Common Library
//!
//! Shared code for the XNAT series retriever crates:
//! - Error and result types
//! - TOML configuration schema, loading and atomic write-back
//! - Configuration file resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
