//! Configuration failures end the run before anything external exists.

use std::collections::HashMap;

use csi_e2e::{FailureKind, RunState, SuiteRunner};
use csi_e2e_core::error::ConfigError;
use csi_e2e_core::{NameGenerator, TestContext};

use crate::helpers::fakes::{FakeControlPlane, FakeSecretStore};
use crate::helpers::setup;

#[tokio::test]
async fn test_e2e_missing_project_exits_1_without_teardown() {
    let env: HashMap<&str, &str> = HashMap::from([("GCP_PROVIDER_SHA", "abc123")]);
    let mut suite = SuiteRunner::new(setup::config(), FakeControlPlane::new(), FakeSecretStore::new());

    let outcome = suite
        .run(|| {
            TestContext::resolve(
                |k| env.get(k).map(|v| (*v).to_owned()),
                &mut NameGenerator::with_seed(1),
            )
        })
        .await;

    assert_eq!(outcome.exit_code, 1);
    let failure = outcome.failure.as_ref().expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Configuration);
    assert_eq!(failure.message, "PROJECT_ID is empty");
    assert!(outcome.teardown.is_none());
    assert!(outcome.identifiers.is_none());
    assert!(suite.control_plane().calls().is_empty());
    assert!(suite.secrets().calls().is_empty());
    assert_eq!(suite.state(), RunState::Done(1));
}

#[tokio::test]
async fn test_e2e_config_error_is_reported() {
    let mut suite = SuiteRunner::new(setup::config(), FakeControlPlane::new(), FakeSecretStore::new());
    let outcome = suite
        .run(|| {
            Err(ConfigError::MissingEnv {
                key: "GCP_PROVIDER_SHA".to_owned(),
            })
        })
        .await;

    let json = serde_json::to_value(outcome.report()).expect("report serialises");
    assert_eq!(json["passed"], false);
    assert_eq!(json["failure"]["kind"], "configuration");
    assert!(json["teardown"].is_null());
    assert!(json["cluster_name"].is_null());
}
