mod cli;
mod logging;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use csi_e2e::{RunReport, SuiteRunner};
use csi_e2e_core::{NameGenerator, TestContext};
use csi_e2e_provider::{GcloudSecretStore, KubectlControlPlane, ProcessRunner};

use cli::HarnessCli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = HarnessCli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("csi-e2e: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: HarnessCli) -> Result<ExitCode> {
    let resolved = cli.resolve_config().context("failed to load config")?;
    let config = resolved.config;

    if cli.validate {
        for message in &resolved.ignored_overrides {
            eprintln!("warning: {message}");
        }
        println!("configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    logging::init_tracing(&config.general)?;
    for message in &resolved.ignored_overrides {
        tracing::warn!("{message}");
    }
    tracing::info!("csi-e2e starting");

    let process = ProcessRunner::new();
    let mut suite = SuiteRunner::new(
        config,
        KubectlControlPlane::new(process),
        GcloudSecretStore::new(process),
    );
    let outcome = suite
        .run(|| {
            TestContext::resolve(|key| std::env::var(key).ok(), &mut NameGenerator::from_time())
        })
        .await;

    if let Some(path) = cli.report.as_deref() {
        if let Err(e) = write_report(path, &outcome.report()) {
            tracing::error!(path = %path.display(), error = %e, "failed to write run report");
        }
    }

    Ok(ExitCode::from(outcome.exit_code))
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
