//! Provisioning failures: fail fast, still tear down, exit 1.

use csi_e2e::{FailureKind, RunState, SuiteRunner};

use crate::helpers::fakes::{FakeControlPlane, FakeSecretStore};
use crate::helpers::setup::{self, CLUSTER, SECRET};

#[tokio::test]
async fn test_e2e_cluster_never_ready_skips_rest_and_tears_down() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().failing_on("wait"),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let scratch = ctx.scratch_dir().to_path_buf();

    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    let failure = outcome.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Provisioning);
    assert!(failure.message.contains("injected wait failure"), "{}", failure.message);
    assert!(outcome.checks.is_empty());
    assert_eq!(suite.state(), RunState::Done(1));

    let cp = suite.control_plane();
    assert_eq!(cp.count("credentials"), 0);
    assert_eq!(cp.count("exec"), 0);
    assert_eq!(cp.count("delete management containercluster"), 1);
    assert_eq!(suite.secrets().count("create"), 0);
    assert_eq!(suite.secrets().calls(), vec![format!("delete {SECRET} proj-1")]);
    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_e2e_secret_creation_failure_tears_down() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new(),
        FakeSecretStore::new().failing_on("create"),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Provisioning)
    );
    assert_eq!(suite.control_plane().count("exec"), 0);
    assert_eq!(
        suite.control_plane().calls().last().cloned(),
        Some(format!("delete management containercluster {CLUSTER}"))
    );
    assert_eq!(suite.secrets().count("delete"), 1);
}

#[tokio::test]
async fn test_e2e_missing_templates_fail_provisioning_before_any_call() {
    let mut config = setup::config();
    config.provision.templates_dir = "/nonexistent/templates".into();
    let mut suite = SuiteRunner::new(config, FakeControlPlane::new(), FakeSecretStore::new());
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    let failure = outcome.failure.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Provisioning);
    assert!(failure.message.contains("failed to read template"), "{}", failure.message);
    // only teardown reached the control plane
    assert_eq!(
        suite.control_plane().calls(),
        vec![format!("delete management containercluster {CLUSTER}")]
    );
}
