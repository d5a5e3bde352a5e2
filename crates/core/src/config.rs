//! Harness tunables: `harness.toml` parsing and environment overrides.
//!
//! [`HarnessConfig`] holds everything about *how* a run behaves (timeouts,
//! template location, log format). The identifiers of *what* is tested come
//! from the environment and live in [`TestContext`](crate::context::TestContext).
//!
//! # Loading order
//! 1. Defaults (`Default` impls)
//! 2. Config file (`--config harness.toml`), if given
//! 3. Environment variables (`CSI_E2E_VERIFY_SETTLE_DELAY_SECS=10`)
//! 4. CLI flags (applied by the binary)
//!
//! ```no_run
//! # fn example() -> Result<(), csi_e2e_core::error::HarnessError> {
//! use csi_e2e_core::config::HarnessConfig;
//!
//! let config = HarnessConfig::load("harness.toml")?;
//! let config = HarnessConfig::parse("[verify]\nsettle_delay_secs = 10")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, HarnessError};

/// Harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub teardown: TeardownConfig,
}

impl HarnessConfig {
    /// Loads a TOML file, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let mut config = Self::read(path)?;
        warn_ignored(&config.apply_env_overrides());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file. No env overrides, no validation.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HarnessError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Result<Self, HarnessError> {
        let mut config = Self::default();
        warn_ignored(&config.apply_env_overrides());
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML string. Missing sections and keys fall back to defaults.
    pub fn parse(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str).map_err(|e| {
            HarnessError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Applies `CSI_E2E_{SECTION}_{FIELD}` environment overrides.
    ///
    /// Returns one message per override that was set but unparsable and
    /// therefore ignored. Logging them is left to the caller, which may not
    /// have a subscriber yet.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        let mut ignored = Vec::new();
        override_string(&mut self.general.log_level, "CSI_E2E_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "CSI_E2E_GENERAL_LOG_FORMAT");

        override_path(
            &mut self.provision.templates_dir,
            "CSI_E2E_PROVISION_TEMPLATES_DIR",
        );
        ignored.extend(override_u64(
            &mut self.provision.cluster_ready_timeout_secs,
            "CSI_E2E_PROVISION_CLUSTER_READY_TIMEOUT_SECS",
        ));
        override_string(
            &mut self.provision.driver_manifest_base_url,
            "CSI_E2E_PROVISION_DRIVER_MANIFEST_BASE_URL",
        );

        override_string(&mut self.verify.namespace, "CSI_E2E_VERIFY_NAMESPACE");
        override_string(&mut self.verify.pod_name, "CSI_E2E_VERIFY_POD_NAME");
        override_string(&mut self.verify.mount_dir, "CSI_E2E_VERIFY_MOUNT_DIR");
        ignored.extend(override_u64(
            &mut self.verify.settle_delay_secs,
            "CSI_E2E_VERIFY_SETTLE_DELAY_SECS",
        ));
        ignored.extend(override_u64(
            &mut self.verify.pod_ready_timeout_secs,
            "CSI_E2E_VERIFY_POD_READY_TIMEOUT_SECS",
        ));
        ignored.extend(override_u64(
            &mut self.verify.exec_timeout_secs,
            "CSI_E2E_VERIFY_EXEC_TIMEOUT_SECS",
        ));

        ignored.extend(override_u64(
            &mut self.teardown.command_timeout_secs,
            "CSI_E2E_TEARDOWN_COMMAND_TIMEOUT_SECS",
        ));
        ignored
    }

    /// Validates value ranges.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.provision.templates_dir.as_os_str().is_empty() {
            return Err(invalid("provision.templates_dir", "must not be empty"));
        }
        if self.provision.cluster_ready_timeout_secs == 0 {
            return Err(invalid(
                "provision.cluster_ready_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.verify.pod_ready_timeout_secs == 0 {
            return Err(invalid(
                "verify.pod_ready_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.verify.exec_timeout_secs == 0 {
            return Err(invalid("verify.exec_timeout_secs", "must be greater than 0"));
        }
        if !self.verify.mount_dir.starts_with('/') {
            return Err(invalid("verify.mount_dir", "must be an absolute path"));
        }
        if self.verify.namespace.is_empty() || self.verify.pod_name.is_empty() {
            return Err(invalid(
                "verify.namespace",
                "namespace and pod_name must not be empty",
            ));
        }
        if self.teardown.command_timeout_secs == 0 {
            return Err(invalid(
                "teardown.command_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> HarnessError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Environment provisioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Template directory, relative to the working directory.
    pub templates_dir: PathBuf,
    /// Bound for the test cluster's Ready condition.
    pub cluster_ready_timeout_secs: u64,
    /// Where the secrets-store CSI driver publishes its deploy manifests.
    pub driver_manifest_base_url: String,
}

impl ProvisionConfig {
    pub fn cluster_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_ready_timeout_secs)
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            cluster_ready_timeout_secs: 15 * 60,
            driver_manifest_base_url:
                "https://raw.githubusercontent.com/kubernetes-sigs/secrets-store-csi-driver"
                    .to_owned(),
        }
    }
}

/// Probe workload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub namespace: String,
    /// Must match the pod name in `test-pod.yaml.tmpl`.
    pub pod_name: String,
    /// Must match the volume mount path in `test-pod.yaml.tmpl`.
    pub mount_dir: String,
    /// Pause between applying the pod and waiting on it.
    /// Works around kubernetes/kubernetes#83242 (`kubectl wait` on a not yet
    /// visible object fails immediately).
    pub settle_delay_secs: u64,
    pub pod_ready_timeout_secs: u64,
    /// Bound for reading the secret inside the pod.
    pub exec_timeout_secs: u64,
}

impl VerifyConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn pod_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.pod_ready_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_owned(),
            pod_name: "test-secret-mounter".to_owned(),
            mount_dir: "/var/gcp-test-secrets".to_owned(),
            settle_delay_secs: 5,
            pod_ready_timeout_secs: 5 * 60,
            exec_timeout_secs: 60,
        }
    }
}

/// Teardown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownConfig {
    /// Upper bound for each individual teardown command.
    pub command_timeout_secs: u64,
}

impl TeardownConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 20 * 60,
        }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_u64(target: &mut u64, env_key: &str) -> Option<String> {
    let val = std::env::var(env_key).ok()?;
    match val.parse::<u64>() {
        Ok(parsed) => {
            *target = parsed;
            None
        }
        Err(_) => Some(format!("{env_key}={val:?} is not a valid u64, ignoring")),
    }
}

fn warn_ignored(ignored: &[String]) {
    for message in ignored {
        warn!("{message}");
    }
}
