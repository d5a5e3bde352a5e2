//! CLI argument definitions for csi-e2e.

use std::path::PathBuf;

use clap::Parser;

use csi_e2e_core::HarnessConfig;
use csi_e2e_core::error::HarnessError;

/// End-to-end harness for the GCP secrets-store CSI provider.
///
/// Provisions a disposable cluster and secret, checks that a pod reads the
/// secret through the CSI volume, and tears everything down.
///
/// Required environment: PROJECT_ID, GCP_PROVIDER_SHA.
/// Optional: SECRET_STORE_VERSION (default `master`).
#[derive(Parser, Debug)]
#[command(name = "csi-e2e")]
#[command(version, about, long_about = None)]
pub struct HarnessCli {
    /// Path to a harness TOML file. Defaults plus env overrides when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the manifest template directory.
    #[arg(long)]
    pub templates_dir: Option<PathBuf>,

    /// Write a JSON run report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Validate configuration and exit without touching any cluster.
    #[arg(long)]
    pub validate: bool,
}

/// Configuration after file, env overrides and CLI flags, validated once.
pub struct ResolvedConfig {
    pub config: HarnessConfig,
    /// Env overrides that were set but ignored, to be logged once tracing is up.
    pub ignored_overrides: Vec<String>,
}

impl HarnessCli {
    /// Layers the config file (or defaults), `CSI_E2E_*` env overrides and the
    /// CLI flags, in that order, then validates the result.
    pub fn resolve_config(&self) -> Result<ResolvedConfig, HarnessError> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::read(path)?,
            None => HarnessConfig::default(),
        };
        let ignored_overrides = config.apply_env_overrides();

        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(dir) = &self.templates_dir {
            config.provision.templates_dir = dir.clone();
        }
        config.validate()?;

        Ok(ResolvedConfig {
            config,
            ignored_overrides,
        })
    }
}
