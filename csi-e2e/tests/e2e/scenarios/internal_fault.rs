//! Panics inside a stage become internal faults and still reach teardown.

use csi_e2e::teardown::TeardownStep;
use csi_e2e::{FailureKind, RunState, SuiteRunner};

use crate::helpers::fakes::{FakeControlPlane, FakeSecretStore};
use crate::helpers::setup;

#[tokio::test]
async fn test_e2e_panic_during_provisioning_still_tears_down_once() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new(),
        FakeSecretStore::new().panicking_on("create"),
    );
    let ctx = setup::context();
    let scratch = ctx.scratch_dir().to_path_buf();

    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    let failure = outcome.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::InternalFault);
    assert!(failure.message.contains("injected panic"), "{}", failure.message);
    assert_eq!(suite.state(), RunState::Done(1));
    assert_eq!(suite.control_plane().count("delete management containercluster"), 1);
    assert_eq!(suite.secrets().count("delete"), 1);
    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_e2e_panic_during_verification_still_tears_down_once() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().panicking_on("exec"),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::InternalFault)
    );
    assert!(outcome.checks.is_empty());
    assert_eq!(suite.control_plane().count("delete"), 1);
    assert_eq!(suite.secrets().count("delete"), 1);
    let report = outcome.teardown.expect("teardown ran");
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_e2e_panic_during_teardown_still_finishes_the_run() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().panicking_on("delete"),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let scratch = ctx.scratch_dir().to_path_buf();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(suite.state(), RunState::Done(1));
    let failure = outcome.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::InternalFault);
    assert!(failure.message.starts_with("teardown cluster:"), "{}", failure.message);
    assert!(outcome.checks.iter().all(|c| c.passed));

    assert_eq!(suite.control_plane().count("delete"), 1);
    assert_eq!(suite.secrets().count("delete"), 1);
    assert!(!scratch.exists());

    let report = outcome.teardown.expect("teardown ran");
    assert_eq!(report.steps.len(), 3);
    let panicked: Vec<_> = report.panics().map(|s| s.step).collect();
    assert_eq!(panicked, vec![TeardownStep::Cluster]);
    let cluster = &report.steps[1];
    assert!(cluster.error.as_deref().unwrap_or_default().contains("injected panic"));
    assert!(report.steps[2].error.is_none());
}
