//! Run identity: the [`TestContext`] built once per process.
//!
//! The context is resolved from the environment before anything external is
//! touched. A missing required variable is a fatal [`ConfigError`], so a
//! misconfigured run can never leave cloud resources behind.
//!
//! Cluster and secret names are `testcluster-<n>` / `testsecret-<n>` with `n`
//! drawn from a time-seeded generator. Uniqueness is probabilistic; runs are
//! assumed to be isolated per project.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Zone the test cluster is created in.
pub const ZONE: &str = "us-central1-c";

/// Required: GCP project that hosts the cluster and the secret.
pub const ENV_PROJECT_ID: &str = "PROJECT_ID";
/// Required: revision of the GCP provider plugin under test.
pub const ENV_PROVIDER_REVISION: &str = "GCP_PROVIDER_SHA";
/// Optional: secrets-store CSI driver revision to install.
pub const ENV_DRIVER_VERSION: &str = "SECRET_STORE_VERSION";

/// Driver revision used when [`ENV_DRIVER_VERSION`] is unset.
pub const DEFAULT_DRIVER_VERSION: &str = "master";

const SCRATCH_PREFIX: &str = "csi-tests";
const KUBECONFIG_FILE: &str = "test-cluster-kubeconfig";

/// Random name source for cluster and secret identifiers.
pub struct NameGenerator {
    rng: StdRng,
}

impl NameGenerator {
    /// Seeds from the current wall-clock time.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(nanos)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn cluster_name(&mut self) -> String {
        format!("testcluster-{}", self.next_id())
    }

    pub fn secret_id(&mut self) -> String {
        format!("testsecret-{}", self.next_id())
    }

    fn next_id(&mut self) -> i32 {
        self.rng.gen_range(0..=i32::MAX)
    }
}

/// Identifiers that address the external resources of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    pub project_id: String,
    pub provider_revision: String,
    pub driver_version: String,
    pub cluster_name: String,
    pub secret_id: String,
}

/// Process-wide run context. Immutable once built.
///
/// The scratch directory belongs to this run alone; teardown consumes the
/// context and deletes it.
#[derive(Debug)]
pub struct TestContext {
    ids: Identifiers,
    scratch_dir: PathBuf,
    kubeconfig: PathBuf,
}

impl TestContext {
    /// Reads identifiers through `lookup`, generates names and creates the
    /// scratch directory.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingEnv`] for an unset or empty required variable,
    /// [`ConfigError::Scratch`] if the temp directory cannot be created.
    pub fn resolve<F>(lookup: F, names: &mut NameGenerator) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_revision = required(&lookup, ENV_PROVIDER_REVISION)?;
        let project_id = required(&lookup, ENV_PROJECT_ID)?;
        let driver_version = match lookup(ENV_DRIVER_VERSION).filter(|v| !v.is_empty()) {
            Some(version) => version,
            None => {
                warn!(
                    default = DEFAULT_DRIVER_VERSION,
                    "{ENV_DRIVER_VERSION} is empty, using default"
                );
                DEFAULT_DRIVER_VERSION.to_owned()
            }
        };

        let scratch_dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(ConfigError::Scratch)?
            .keep();

        let ids = Identifiers {
            project_id,
            provider_revision,
            driver_version,
            cluster_name: names.cluster_name(),
            secret_id: names.secret_id(),
        };
        let ctx = Self::new(ids, scratch_dir);
        info!(
            project = %ctx.project_id(),
            cluster = %ctx.cluster_name(),
            secret = %ctx.secret_id(),
            driver_version = %ctx.driver_version(),
            scratch = %ctx.scratch_dir().display(),
            "test context resolved"
        );
        Ok(ctx)
    }

    /// Builds a context from known identifiers and an existing scratch dir.
    pub fn new(ids: Identifiers, scratch_dir: PathBuf) -> Self {
        let kubeconfig = scratch_dir.join(KUBECONFIG_FILE);
        Self {
            ids,
            scratch_dir,
            kubeconfig,
        }
    }

    pub fn identifiers(&self) -> &Identifiers {
        &self.ids
    }

    pub fn project_id(&self) -> &str {
        &self.ids.project_id
    }

    pub fn provider_revision(&self) -> &str {
        &self.ids.provider_revision
    }

    pub fn driver_version(&self) -> &str {
        &self.ids.driver_version
    }

    pub fn cluster_name(&self) -> &str {
        &self.ids.cluster_name
    }

    pub fn secret_id(&self) -> &str {
        &self.ids.secret_id
    }

    pub fn zone(&self) -> &'static str {
        ZONE
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Credentials file for the test cluster. Only commands that pass it
    /// explicitly talk to the test cluster.
    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    /// Path of a file inside the scratch directory.
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.scratch_dir.join(name)
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv {
            key: key.to_owned(),
        })
}
