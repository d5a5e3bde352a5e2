//! Suite runner: the lifecycle state machine of one harness run.
//!
//! ```text
//! Init ──config error──────────────────────────────▶ Done(1)
//!   │
//!   ▼
//! Provisioning ──ok──▶ Verifying ──▶ TearingDown ──▶ Done(code)
//!   │                                   ▲
//!   └──failure / panic──────────────────┘
//! ```
//!
//! Once a [`TestContext`] exists, teardown runs exactly once whatever happens
//! in provisioning or verification, panics included. A config failure ends the
//! run before anything external is created, so there is nothing to tear down.
//! A panic inside a teardown step fails the run as an internal fault.

use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use csi_e2e_core::error::ConfigError;
use csi_e2e_core::{HarnessConfig, Identifiers, ManifestRenderer, TestContext};
use csi_e2e_provider::{ControlPlane, SecretStore};

use crate::provision::provision;
use crate::teardown::{TeardownReport, teardown};
use crate::unwind::catch_panic;
use crate::verify::{VerificationResult, verify_mounted_secret};

/// Run lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Provisioning,
    Verifying,
    TearingDown,
    Done(u8),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Verifying => write!(f, "verifying"),
            Self::TearingDown => write!(f, "tearing-down"),
            Self::Done(code) => write!(f, "done({code})"),
        }
    }
}

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required configuration missing; nothing was created.
    Configuration,
    /// An environment step failed; remaining steps were skipped.
    Provisioning,
    /// The environment came up but a check did not pass.
    Verification,
    /// A panic inside a stage or a teardown step.
    InternalFault,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Verification => write!(f, "verification"),
            Self::InternalFault => write!(f, "internal fault"),
        }
    }
}

/// A failure with its description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: u8,
    /// `None` when configuration failed before identifiers existed.
    pub identifiers: Option<Identifiers>,
    pub failure: Option<Failure>,
    pub checks: Vec<VerificationResult>,
    /// `None` when teardown did not run (configuration failure).
    pub teardown: Option<TeardownReport>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Serialisable projection of the outcome.
    pub fn report(&self) -> RunReport {
        RunReport {
            passed: self.passed(),
            exit_code: self.exit_code,
            cluster_name: self.identifiers.as_ref().map(|i| i.cluster_name.clone()),
            secret_id: self.identifiers.as_ref().map(|i| i.secret_id.clone()),
            failure: self.failure.clone(),
            checks: self.checks.iter().map(CheckReport::from).collect(),
            teardown: self.teardown.clone(),
        }
    }

    /// One line per check, then the failing stage if it was not a check.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .checks
            .iter()
            .map(|c| format!("{}  {}", if c.passed { "PASS" } else { "FAIL" }, c.check))
            .collect();
        if let Some(failure) = self
            .failure
            .as_ref()
            .filter(|f| f.kind != FailureKind::Verification)
        {
            lines.push(format!("FAIL  {}: {}", failure.kind, failure.message));
        }
        lines
    }
}

/// JSON run report written by `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub passed: bool,
    pub exit_code: u8,
    pub cluster_name: Option<String>,
    pub secret_id: Option<String>,
    pub failure: Option<Failure>,
    pub checks: Vec<CheckReport>,
    pub teardown: Option<TeardownReport>,
}

/// A [`VerificationResult`] with its streams decoded as text.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub check: String,
    pub passed: bool,
    pub stdout: String,
    pub stderr: String,
    pub failure: Option<String>,
}

impl From<&VerificationResult> for CheckReport {
    fn from(r: &VerificationResult) -> Self {
        Self {
            check: r.check.clone(),
            passed: r.passed,
            stdout: String::from_utf8_lossy(&r.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&r.stderr).into_owned(),
            failure: r.failure.clone(),
        }
    }
}

/// Drives one run through provisioning, verification and teardown.
pub struct SuiteRunner<C, S> {
    config: HarnessConfig,
    renderer: ManifestRenderer,
    control_plane: C,
    secrets: S,
    state: RunState,
}

impl<C: ControlPlane, S: SecretStore> SuiteRunner<C, S> {
    pub fn new(config: HarnessConfig, control_plane: C, secrets: S) -> Self {
        let renderer = ManifestRenderer::new(config.provision.templates_dir.clone());
        Self {
            config,
            renderer,
            control_plane,
            secrets,
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    pub fn secrets(&self) -> &S {
        &self.secrets
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "run state");
        self.state = next;
    }

    /// Runs the suite. `resolve` builds the context; it is called once.
    pub async fn run<F>(&mut self, resolve: F) -> RunOutcome
    where
        F: FnOnce() -> Result<TestContext, ConfigError>,
    {
        self.transition(RunState::Init);
        let ctx = match resolve() {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(error = %e, "configuration failed, nothing to tear down");
                let outcome = RunOutcome {
                    exit_code: 1,
                    identifiers: None,
                    failure: Some(Failure::new(FailureKind::Configuration, e.to_string())),
                    checks: Vec::new(),
                    teardown: None,
                };
                self.finish(&outcome);
                return outcome;
            }
        };
        let identifiers = ctx.identifiers().clone();

        let (failure, checks) = self.provision_and_verify(&ctx).await;

        self.transition(RunState::TearingDown);
        let (teardown, teardown_fault) = match catch_panic(teardown(
            ctx,
            &self.config.teardown,
            &self.control_plane,
            &self.secrets,
        ))
        .await
        {
            Ok(report) => {
                let fault = report.panics().next().map(|step| {
                    let msg = step.error.as_deref().unwrap_or_default();
                    Failure::new(
                        FailureKind::InternalFault,
                        format!("teardown {}: {msg}", step.step),
                    )
                });
                (report, fault)
            }
            Err(msg) => {
                error!(panic = %msg, "teardown panicked");
                let fault = Failure::new(FailureKind::InternalFault, format!("teardown: {msg}"));
                (TeardownReport::default(), Some(fault))
            }
        };
        let failure = failure.or(teardown_fault);

        let exit_code = exit_code(failure.as_ref(), &checks);
        let outcome = RunOutcome {
            exit_code,
            identifiers: Some(identifiers),
            failure,
            checks,
            teardown: Some(teardown),
        };
        self.finish(&outcome);
        outcome
    }

    async fn provision_and_verify(
        &mut self,
        ctx: &TestContext,
    ) -> (Option<Failure>, Vec<VerificationResult>) {
        self.transition(RunState::Provisioning);
        let provisioned = catch_panic(provision(
            ctx,
            &self.config.provision,
            &self.renderer,
            &self.control_plane,
            &self.secrets,
        ))
        .await;
        match provisioned {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "provisioning failed");
                return (Some(Failure::new(FailureKind::Provisioning, e.to_string())), Vec::new());
            }
            Err(msg) => {
                error!(panic = %msg, "provisioning panicked");
                return (Some(Failure::new(FailureKind::InternalFault, msg)), Vec::new());
            }
        }

        self.transition(RunState::Verifying);
        let verified = catch_panic(verify_mounted_secret(
            ctx,
            &self.config.verify,
            &self.renderer,
            &self.control_plane,
        ))
        .await;
        match verified {
            Ok(result) => {
                let failure = result
                    .failure
                    .as_ref()
                    .map(|reason| Failure::new(FailureKind::Verification, reason.clone()));
                (failure, vec![result])
            }
            Err(msg) => {
                error!(panic = %msg, "verification panicked");
                (Some(Failure::new(FailureKind::InternalFault, msg)), Vec::new())
            }
        }
    }

    fn finish(&mut self, outcome: &RunOutcome) {
        self.transition(RunState::Done(outcome.exit_code));
        info!("========================================");
        for line in outcome.summary_lines() {
            info!("  {line}");
        }
        info!("========================================");
        if outcome.passed() {
            info!("csi-e2e: all checks passed");
        } else {
            error!("csi-e2e: run failed");
        }
    }
}

/// 0 iff nothing failed and at least one check ran and all checks passed.
pub fn exit_code(failure: Option<&Failure>, checks: &[VerificationResult]) -> u8 {
    let all_passed = !checks.is_empty() && checks.iter().all(|c| c.passed);
    if failure.is_none() && all_passed { 0 } else { 1 }
}
