//! Run configuration resolution for xsr-ingest
//!
//! Credentials: environment (`XSR_USERNAME` / `XSR_PASSWORD`) → TOML.
//! Experiment target: command line → TOML.
//!
//! Nothing here is cached in process state; the resolved values are passed
//! explicitly to the archive client and pipeline.

use crate::services::archive_client::{Credentials, ExperimentTarget};
use tracing::{info, warn};
use xsr_common::config::ArchiveConfig;
use xsr_common::{Error, Result};

pub const USERNAME_ENV_VAR: &str = "XSR_USERNAME";
pub const PASSWORD_ENV_VAR: &str = "XSR_PASSWORD";

/// Command-line overrides for the experiment target
#[derive(Debug, Clone, Default)]
pub struct TargetOverrides {
    pub project: Option<String>,
    pub subject: Option<String>,
    pub experiment: Option<String>,
}

/// Resolve archive credentials
///
/// **Priority:** Environment → TOML. Username and password resolve
/// independently.
pub fn resolve_credentials(archive: &ArchiveConfig) -> Result<Credentials> {
    let username = resolve_value(
        "username",
        std::env::var(USERNAME_ENV_VAR).ok(),
        archive.username.clone(),
    );
    let password = resolve_value(
        "password",
        std::env::var(PASSWORD_ENV_VAR).ok(),
        archive.password.clone(),
    );

    match (username, password) {
        (Some(username), Some(password)) => Ok(Credentials { username, password }),
        _ => Err(Error::Config(format!(
            "Archive credentials not configured. Please configure using one of:\n\
             1. Environment: {}=... {}=...\n\
             2. TOML config: [archive] username = \"...\", password = \"...\"",
            USERNAME_ENV_VAR, PASSWORD_ENV_VAR
        ))),
    }
}

fn resolve_value(field: &str, env_value: Option<String>, toml_value: Option<String>) -> Option<String> {
    let env_value = env_value.filter(|v| is_valid_value(v));
    let toml_value = toml_value.filter(|v| is_valid_value(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "Archive {} found in environment and TOML config. Using environment (highest priority).",
            field
        );
    }

    if let Some(value) = env_value {
        info!("Archive {} loaded from environment variable", field);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("Archive {} loaded from TOML config", field);
        return Some(value);
    }

    None
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve project/subject/experiment, all three required
pub fn resolve_target(archive: &ArchiveConfig, overrides: &TargetOverrides) -> Result<ExperimentTarget> {
    let pick = |name: &str, cli: &Option<String>, toml: &Option<String>| -> Result<String> {
        cli.iter()
            .chain(toml.iter())
            .find(|v| is_valid_value(v))
            .cloned()
            .ok_or_else(|| {
                Error::Config(format!(
                    "No {} configured (use --{} or [archive] {} = \"...\")",
                    name, name, name
                ))
            })
    };

    Ok(ExperimentTarget {
        project: pick("project", &overrides.project, &archive.project)?,
        subject: pick("subject", &overrides.subject, &archive.subject)?,
        experiment: pick("experiment", &overrides.experiment, &archive.experiment)?,
    })
}
