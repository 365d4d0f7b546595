//! Configuration schema, loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `XSR_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/xsr/config.toml` on Linux)
//! 4. Compiled defaults (no file)
//!
//! A missing config file is never fatal: the resolver logs a warning and the
//! compiled defaults are used. A file that exists but fails to parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "XSR_CONFIG";

/// Complete TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub archive: ArchiveConfig,
    pub pipeline: PipelineSettings,
    pub download: DownloadSettings,
    pub logging: LoggingConfig,
}

/// Remote archive location and session identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive root URL, without trailing slash
    pub base_url: String,
    pub project: Option<String>,
    pub subject: Option<String>,
    pub experiment: Option<String>,
    /// Overridden by `XSR_USERNAME`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Overridden by `XSR_PASSWORD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://intradb.humanconnectome.org".to_string(),
            project: None,
            subject: None,
            experiment: None,
            username: None,
            password: None,
            timeout_secs: 60,
        }
    }
}

/// How a quality score is compared against the threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdComparison {
    /// `score >= threshold`
    #[default]
    AtLeast,
    /// `score > threshold`
    GreaterThan,
}

impl ThresholdComparison {
    pub fn passes(self, score: i32, threshold: i32) -> bool {
        match self {
            ThresholdComparison::AtLeast => score >= threshold,
            ThresholdComparison::GreaterThan => score > threshold,
        }
    }
}

/// Series naming and filtering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub quality_threshold: i32,
    pub threshold_comparison: ThresholdComparison,
    /// Regular expressions searched anywhere in the instance name
    pub exclusion_patterns: Vec<String>,
    /// Descriptions that always carry an ordinal suffix
    pub special_cases: Vec<String>,
    /// Extra or overriding entries for the quality vocabulary
    pub quality_scores: BTreeMap<String, i32>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            quality_threshold: 3,
            threshold_comparison: ThresholdComparison::default(),
            exclusion_patterns: vec!["Localizer".to_string(), "AAHScout".to_string()],
            special_cases: vec![
                "FieldMap_Magnitude".to_string(),
                "FieldMap_Phase".to_string(),
                "BOLD_RL_SB_SE".to_string(),
                "BOLD_LR_SB_SE".to_string(),
            ],
            quality_scores: BTreeMap::new(),
        }
    }
}

/// What to do when a downloaded file's size differs from the archive listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMismatchPolicy {
    /// Log a warning and keep going
    #[default]
    Warn,
    /// Abort the run with a transfer error
    Strict,
}

/// File download settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub output_dir: PathBuf,
    /// Archive resource holding the series files
    pub resource_label: String,
    /// Only files ending in one of these suffixes are fetched
    pub file_suffixes: Vec<String>,
    pub size_mismatch: SizeMismatchPolicy,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./series"),
            resource_label: "NIFTI".to_string(),
            file_suffixes: vec![
                ".nii.gz".to_string(),
                ".bval".to_string(),
                ".bvec".to_string(),
                ".json".to_string(),
            ],
            size_mismatch: SizeMismatchPolicy::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default config file location for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("xsr").join("config.toml"))
}

/// Resolves which config file to read
pub struct ConfigResolver {
    cli_arg: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_arg: Option<PathBuf>) -> Self {
        Self { cli_arg }
    }

    /// Config file path by priority, `None` when no file should be read
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_arg {
            debug!(path = %path.display(), "Config file from command line");
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                debug!(path = %path, "Config file from {}", CONFIG_ENV_VAR);
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }

    /// Read the resolved config without logging
    ///
    /// Callers that install their log subscriber after reading the config
    /// report the outcome afterwards with [`LoadedConfig::log_source`].
    pub fn read(&self) -> Result<LoadedConfig> {
        let Some(path) = self.resolve() else {
            return Ok(LoadedConfig {
                config: TomlConfig::default(),
                source: ConfigSource::Defaults,
            });
        };

        if !path.exists() {
            return Ok(LoadedConfig {
                config: TomlConfig::default(),
                source: ConfigSource::Missing(path),
            });
        }

        Ok(LoadedConfig {
            config: load_toml_config(&path)?,
            source: ConfigSource::File(path),
        })
    }

    /// Load the resolved config, falling back to defaults when the file is missing
    pub fn load(&self) -> Result<TomlConfig> {
        let loaded = self.read()?;
        loaded.log_source();
        Ok(loaded.config)
    }
}

/// Where a loaded config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; compiled defaults used
    Missing(PathBuf),
    /// No file named or found; compiled defaults used
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::File(path) => {
                info!(path = %path.display(), "Loaded configuration");
            }
            ConfigSource::Missing(path) => {
                warn!(
                    path = %path.display(),
                    "Config file not found, using compiled defaults"
                );
            }
            ConfigSource::Defaults => {
                info!("No config file found, using compiled defaults");
            }
        }
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write config atomically: serialize to `<target>.tmp`, then rename over the target.
///
/// On Unix the file is created with mode 0600 since it may hold credentials.
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = target.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, target) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    debug!(path = %target.display(), "Wrote TOML config");
    Ok(())
}

/// True when the file is readable by group or others
#[cfg(unix)]
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_comparison_boundary() {
        assert!(ThresholdComparison::AtLeast.passes(3, 3));
        assert!(!ThresholdComparison::GreaterThan.passes(3, 3));
        assert!(ThresholdComparison::GreaterThan.passes(4, 3));
        assert!(!ThresholdComparison::AtLeast.passes(2, 3));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [pipeline]
            quality_threshold = 4
            threshold_comparison = "greater_than"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.quality_threshold, 4);
        assert_eq!(
            config.pipeline.threshold_comparison,
            ThresholdComparison::GreaterThan
        );
        assert_eq!(config.pipeline.special_cases.len(), 4);
        assert_eq!(config.download.resource_label, "NIFTI");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result: std::result::Result<TomlConfig, _> = toml::from_str(
            r#"
            [download]
            size_mismatch = "sometimes"
            "#,
        );
        assert!(result.is_err());
    }
}
