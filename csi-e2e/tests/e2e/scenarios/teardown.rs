//! Teardown is best-effort: step failures never stop later steps or change
//! the exit code.

use std::time::Duration;

use csi_e2e::SuiteRunner;
use csi_e2e::teardown::TeardownStep;

use crate::helpers::fakes::{FakeControlPlane, FakeSecretStore};
use crate::helpers::setup::{self, SECRET};

#[tokio::test]
async fn test_e2e_cluster_delete_failure_does_not_skip_secret_delete() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().failing_on("delete"),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let scratch = ctx.scratch_dir().to_path_buf();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 0, "teardown failures do not fail the run");
    let report = outcome.teardown.expect("teardown ran");
    let failed: Vec<_> = report.failures().map(|s| s.step).collect();
    assert_eq!(failed, vec![TeardownStep::Cluster]);
    assert_eq!(suite.secrets().count("delete"), 1);
    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_e2e_secret_delete_failure_is_recorded() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new(),
        FakeSecretStore::new().failing_on("delete"),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 0);
    let report = outcome.teardown.expect("teardown ran");
    assert!(!report.is_clean());
    let secret_step = report
        .steps
        .iter()
        .find(|s| s.step == TeardownStep::Secret)
        .expect("secret step recorded");
    assert!(
        secret_step
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("injected delete failure")
    );
    assert_eq!(suite.secrets().calls().last().cloned(), Some(format!("delete {SECRET} proj-1")));
}

#[tokio::test(start_paused = true)]
async fn test_e2e_hung_cluster_delete_is_bounded() {
    let mut config = setup::config();
    config.teardown.command_timeout_secs = 1;
    let mut suite = SuiteRunner::new(
        config,
        FakeControlPlane::new().with_delete_delay(Duration::from_secs(3600)),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    let report = outcome.teardown.expect("teardown ran");
    let cluster = report
        .steps
        .iter()
        .find(|s| s.step == TeardownStep::Cluster)
        .expect("cluster step recorded");
    assert_eq!(cluster.error.as_deref(), Some("timed out after 1s"));
    assert_eq!(suite.secrets().count("delete"), 1);
}

#[tokio::test]
async fn test_e2e_teardown_runs_steps_in_order() {
    let mut suite = SuiteRunner::new(setup::config(), FakeControlPlane::new(), FakeSecretStore::new());
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    let steps: Vec<_> = outcome
        .teardown
        .expect("teardown ran")
        .steps
        .iter()
        .map(|s| s.step)
        .collect();
    assert_eq!(
        steps,
        vec![TeardownStep::ScratchDir, TeardownStep::Cluster, TeardownStep::Secret]
    );
}
