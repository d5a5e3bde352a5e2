//! Context and config builders.

use std::path::PathBuf;

use csi_e2e_core::{HarnessConfig, Identifiers, TestContext};

pub const PROJECT: &str = "proj-1";
pub const CLUSTER: &str = "testcluster-7";
pub const SECRET: &str = "testsecret-42";

/// Shipped templates at the workspace root.
pub fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("templates")
}

/// Defaults with the shipped templates and no settle delay.
pub fn config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.provision.templates_dir = templates_dir();
    config.verify.settle_delay_secs = 0;
    config
}

pub fn identifiers() -> Identifiers {
    Identifiers {
        project_id: PROJECT.to_owned(),
        provider_revision: "abc123".to_owned(),
        driver_version: "v0.0.11".to_owned(),
        cluster_name: CLUSTER.to_owned(),
        secret_id: SECRET.to_owned(),
    }
}

/// A context over a fresh scratch directory. The directory is left for
/// teardown to remove.
pub fn context() -> TestContext {
    let scratch = tempfile::Builder::new()
        .prefix("csi-tests")
        .tempdir()
        .expect("create scratch dir")
        .keep();
    TestContext::new(identifiers(), scratch)
}
