//! xsr-ingest - XNAT series retriever
//!
//! Fetches the scan list of one imaging session, names every series with a
//! stable unique instance name, filters by quality and type, and optionally
//! downloads the included series.
//!
//! ```text
//! xsr-ingest list --subject 792564 --experiment 792564_fnca
//! xsr-ingest download --output-dir /data/792564 --strict-size
//! xsr-ingest init-config ~/.config/xsr/config.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use xsr_common::config::{
    write_toml_config, ConfigResolver, ConfigSource, SizeMismatchPolicy, TomlConfig,
};
use xsr_ingest::config::{resolve_credentials, resolve_target, TargetOverrides};
use xsr_ingest::services::{ArchiveClient, PipelineSummary, SeriesDownloader, SeriesPipeline};
use xsr_ingest::types::MetadataSource;
use xsr_ingest::PipelineConfig;

#[derive(Debug, Parser)]
#[command(name = "xsr-ingest", version, about = "Retrieve and name imaging series from an XNAT archive")]
struct Cli {
    /// Config file (default: $XSR_CONFIG, then the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    project: Option<String>,

    #[arg(long, global = true)]
    subject: Option<String>,

    #[arg(long, global = true)]
    experiment: Option<String>,

    /// Log filter when RUST_LOG is unset (e.g. "debug", "xsr_ingest=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the named and filtered series list
    List,
    /// Name, filter and download the included series
    Download {
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Abort on the first size mismatch
        #[arg(long)]
        strict_size: bool,
    },
    /// Write a config file with default settings
    InitConfig { path: PathBuf },
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolver = ConfigResolver::new(cli.config.clone());
    let loaded = resolver.read()?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| loaded.config.logging.level.clone());
    init_tracing(&level);

    info!(
        "Starting xsr-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Logged only now so a missing-file warning reaches the subscriber
    loaded.log_source();

    #[cfg(unix)]
    if let ConfigSource::File(path) = &loaded.source {
        if loaded.config.archive.password.is_some()
            && xsr_common::config::check_toml_permissions_loose(path).unwrap_or(false)
        {
            warn!(
                "{} holds a password and is readable by other users (chmod 600 recommended)",
                path.display()
            );
        }
    }

    let config = loaded.config;

    let result = match cli.command {
        Command::InitConfig { ref path } => init_config(path),
        Command::List => run(&cli, config, false).await,
        Command::Download {
            ref output_dir,
            strict_size,
        } => {
            let mut config = config;
            if let Some(dir) = output_dir {
                config.download.output_dir = dir.clone();
            }
            if strict_size {
                config.download.size_mismatch = SizeMismatchPolicy::Strict;
            }
            run(&cli, config, true).await
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    write_toml_config(&TomlConfig::default(), path)?;
    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn run(cli: &Cli, config: TomlConfig, download: bool) -> Result<()> {
    let pipeline_config = PipelineConfig::from_settings(&config.pipeline)?;
    let pipeline = SeriesPipeline::new(&pipeline_config);

    let overrides = TargetOverrides {
        project: cli.project.clone(),
        subject: cli.subject.clone(),
        experiment: cli.experiment.clone(),
    };
    let target = resolve_target(&config.archive, &overrides)?;
    let credentials = resolve_credentials(&config.archive)?;

    let client = ArchiveClient::connect(
        &config.archive.base_url,
        target,
        &credentials,
        &config.download.resource_label,
        Duration::from_secs(config.archive.timeout_secs),
    )
    .await
    .context("Failed to establish REST session")?;

    let outcome = async {
        let session = client.fetch_session().await?;
        let records = pipeline.run_session(&session)?;

        for record in &records {
            println!("{}", record.summary_line());
        }
        println!("Instance names verified as unique");
        let summary = PipelineSummary::of(&records);
        println!(
            "{} series, {} included, {} excluded",
            summary.total, summary.included, summary.excluded
        );

        if download {
            let downloader = SeriesDownloader::new(&client, &config.download);
            let report = downloader.download_all(&records).await?;
            println!(
                "Downloaded {} files ({} bytes) for {} series into {}",
                report.files.len(),
                report.total_bytes(),
                report.series_downloaded,
                config.download.output_dir.display()
            );
            for mismatch in report.mismatches() {
                println!(
                    "WARNING: {} expected {} bytes, received {}",
                    mismatch.local_name, mismatch.expected_size, mismatch.actual_size
                );
            }
        }

        Ok::<(), xsr_ingest::IngestError>(())
    }
    .await;

    client.close().await;
    outcome?;
    Ok(())
}
