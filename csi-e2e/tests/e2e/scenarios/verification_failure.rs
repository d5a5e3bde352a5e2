//! Verification failures: the run completes, tears down and exits 1.

use csi_e2e::{FailureKind, SuiteRunner};
use csi_e2e_provider::CommandOutput;

use crate::helpers::fakes::{FakeControlPlane, FakeSecretStore};
use crate::helpers::setup::{self, SECRET};

#[tokio::test]
async fn test_e2e_empty_mounted_file_fails_with_teardown() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().with_exec_output(CommandOutput::ok("")),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.checks.len(), 1);
    let check = &outcome.checks[0];
    assert!(!check.passed);
    assert!(check.stdout.is_empty());
    assert!(check.failure.as_deref().unwrap_or_default().contains("mismatch"));
    assert_eq!(
        outcome.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Verification)
    );
    assert_eq!(suite.control_plane().count("delete"), 1);
    assert_eq!(suite.secrets().count("delete"), 1);
    assert_eq!(outcome.summary_lines(), vec!["FAIL  mount-secret"]);
}

#[tokio::test]
async fn test_e2e_trailing_newline_is_not_accepted() {
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().with_exec_output(CommandOutput::ok(format!("{SECRET}\n"))),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;
    assert_eq!(outcome.exit_code, 1);
    assert!(!outcome.checks[0].passed);
}

#[tokio::test]
async fn test_e2e_failed_read_keeps_both_streams() {
    let mut output = CommandOutput::failed(1, "cat: can't open: No such file or directory");
    output.stdout = b"partial".to_vec();
    let mut suite = SuiteRunner::new(
        setup::config(),
        FakeControlPlane::new().with_exec_output(output),
        FakeSecretStore::new(),
    );
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    let check = &outcome.checks[0];
    assert!(!check.passed);
    assert_eq!(check.stdout, b"partial");
    assert_eq!(check.stderr, b"cat: can't open: No such file or directory");
    assert_eq!(outcome.exit_code, 1);
}

#[tokio::test]
async fn test_e2e_exec_error_is_a_failed_check_not_a_fault() {
    let cp = FakeControlPlane::new().failing_on("exec");
    let mut suite = SuiteRunner::new(setup::config(), cp, FakeSecretStore::new());
    let ctx = setup::context();
    let outcome = suite.run(move || Ok(ctx)).await;

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Verification)
    );
    assert!(!outcome.checks[0].passed);
    assert_eq!(suite.control_plane().count("delete"), 1);
}
