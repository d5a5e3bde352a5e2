//! Unconditional, best-effort teardown.
//!
//! Each step runs regardless of the others and of the run's outcome. Step
//! failures are logged and recorded in the [`TeardownReport`]; they never
//! change the run's exit code. A step that panics is recorded as failed and
//! flagged `panicked`, and the remaining steps still run. Every step is
//! bounded by `teardown.command_timeout_secs`.
//!
//! [`teardown`] takes the [`TestContext`] by value, so a context can be torn
//! down at most once.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use csi_e2e_core::TestContext;
use csi_e2e_core::config::TeardownConfig;
use csi_e2e_provider::{ClusterTarget, ControlPlane, SecretStore};

use crate::unwind::catch_panic;

/// Teardown steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStep {
    ScratchDir,
    Cluster,
    Secret,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScratchDir => write!(f, "scratch-dir"),
            Self::Cluster => write!(f, "cluster"),
            Self::Secret => write!(f, "secret"),
        }
    }
}

/// Result of one teardown step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: TeardownStep,
    /// `None` on success.
    pub error: Option<String>,
    pub panicked: bool,
}

/// Why a bounded step did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepError {
    Failed(String),
    Panicked(String),
}

/// Per-step outcome of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub steps: Vec<StepOutcome>,
}

impl TeardownReport {
    /// True if every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    /// Steps that panicked.
    pub fn panics(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.panicked)
    }

    fn record(&mut self, step: TeardownStep, result: Result<(), StepError>) {
        let (error, panicked) = match result {
            Ok(()) => {
                info!(%step, "teardown step done");
                (None, false)
            }
            Err(StepError::Failed(reason)) => {
                warn!(%step, error = %reason, "teardown step failed");
                (Some(reason), false)
            }
            Err(StepError::Panicked(msg)) => {
                error!(%step, panic = %msg, "teardown step panicked");
                (Some(msg), true)
            }
        };
        self.steps.push(StepOutcome {
            step,
            error,
            panicked,
        });
    }
}

/// Releases everything the run may have created.
pub async fn teardown<C, S>(
    ctx: TestContext,
    config: &TeardownConfig,
    control_plane: &C,
    secrets: &S,
) -> TeardownReport
where
    C: ControlPlane,
    S: SecretStore,
{
    let limit = config.command_timeout();
    let mut report = TeardownReport::default();
    info!(cluster = %ctx.cluster_name(), secret = %ctx.secret_id(), "tearing down");

    let scratch = bounded(limit, async {
        match tokio::fs::remove_dir_all(ctx.scratch_dir()).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.to_string()),
            _ => Ok(()),
        }
    })
    .await;
    report.record(TeardownStep::ScratchDir, scratch);

    let cluster = bounded(limit, async {
        control_plane
            .delete(
                ClusterTarget::Management,
                "containercluster",
                ctx.cluster_name(),
                limit,
            )
            .await
            .map_err(|e| e.to_string())
    })
    .await;
    report.record(TeardownStep::Cluster, cluster);

    let secret = bounded(limit, async {
        secrets
            .delete_secret(ctx.secret_id(), ctx.project_id(), limit)
            .await
            .map_err(|e| e.to_string())
    })
    .await;
    report.record(TeardownStep::Secret, secret);

    report
}

async fn bounded<F>(limit: Duration, step: F) -> Result<(), StepError>
where
    F: Future<Output = Result<(), String>>,
{
    match tokio::time::timeout(limit, catch_panic(step)).await {
        Ok(Ok(result)) => result.map_err(StepError::Failed),
        Ok(Err(msg)) => Err(StepError::Panicked(msg)),
        Err(_) => Err(StepError::Failed(format!(
            "timed out after {}s",
            limit.as_secs()
        ))),
    }
}
