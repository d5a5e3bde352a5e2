//! Container orchestration control plane.
//!
//! Two clusters are involved in a run:
//!
//! ```text
//!  management cluster (ambient kubeconfig, Config Connector)
//!     │  kubectl apply/wait/delete containercluster
//!     ▼
//!  test cluster (scratch kubeconfig from get-credentials)
//!        kubectl apply driver + plugin, probe pod, exec
//! ```
//!
//! [`ClusterTarget`] selects which one a call addresses. Test-cluster calls
//! always pass `--kubeconfig` explicitly so the ambient credentials are never
//! used for them.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::ProviderError;

/// Slack added on top of a `kubectl wait --timeout` before the harness kills it.
pub const WAIT_GRACE: Duration = Duration::from_secs(60);

/// Which cluster a control-plane call talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterTarget<'a> {
    /// The cluster of the ambient kubeconfig, where `ContainerCluster`
    /// objects live.
    Management,
    /// The provisioned test cluster, via its own kubeconfig file.
    Test(&'a Path),
}

/// Operations the harness needs from the orchestration CLI.
pub trait ControlPlane: Send + Sync {
    /// Applies manifests (file paths or URLs), all in one invocation.
    fn apply(
        &self,
        target: ClusterTarget<'_>,
        namespace: Option<&str>,
        manifests: &[String],
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Blocks until `resource` (`kind/name`) reports `condition`.
    /// The wait itself is delegated to the CLI.
    fn wait_for(
        &self,
        target: ClusterTarget<'_>,
        namespace: Option<&str>,
        resource: &str,
        condition: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Writes credentials for `cluster` to `kubeconfig`.
    fn fetch_credentials(
        &self,
        cluster: &str,
        zone: &str,
        project: &str,
        kubeconfig: &Path,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Runs `command` inside `pod`. A non-zero exit of the command is
    /// returned as output, not as an error.
    fn exec(
        &self,
        target: ClusterTarget<'_>,
        namespace: &str,
        pod: &str,
        command: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput, ProviderError>> + Send;

    /// Deletes `kind` `name`.
    fn delete(
        &self,
        target: ClusterTarget<'_>,
        kind: &str,
        name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// [`ControlPlane`] backed by `kubectl` (and `gcloud` for credentials).
#[derive(Debug, Clone)]
pub struct KubectlControlPlane<R> {
    runner: R,
    kubectl: String,
    gcloud: String,
}

impl<R: CommandRunner> KubectlControlPlane<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            kubectl: "kubectl".to_owned(),
            gcloud: "gcloud".to_owned(),
        }
    }

    /// Overrides the binaries, e.g. for pinned toolchains.
    pub fn with_binaries(mut self, kubectl: impl Into<String>, gcloud: impl Into<String>) -> Self {
        self.kubectl = kubectl.into();
        self.gcloud = gcloud.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn kubectl(&self, verb: &str, target: ClusterTarget<'_>, namespace: Option<&str>) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.kubectl).arg(verb);
        if let ClusterTarget::Test(kubeconfig) = target {
            spec = spec.args(["--kubeconfig".to_owned(), kubeconfig.display().to_string()]);
        }
        if let Some(ns) = namespace {
            spec = spec.args(["--namespace", ns]);
        }
        spec
    }

    async fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput, ProviderError> {
        self.runner.run(&spec).await?.check(&spec)
    }
}

impl<R: CommandRunner> ControlPlane for KubectlControlPlane<R> {
    async fn apply(
        &self,
        target: ClusterTarget<'_>,
        namespace: Option<&str>,
        manifests: &[String],
    ) -> Result<(), ProviderError> {
        let mut spec = self.kubectl("apply", target, namespace);
        for manifest in manifests {
            spec = spec.args(["-f", manifest.as_str()]);
        }
        self.run_checked(spec).await.map(drop)
    }

    async fn wait_for(
        &self,
        target: ClusterTarget<'_>,
        namespace: Option<&str>,
        resource: &str,
        condition: &str,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let spec = self
            .kubectl("wait", target, namespace)
            .arg(resource)
            .arg(format!("--for=condition={condition}"))
            .args(["--timeout".to_owned(), format!("{}s", timeout.as_secs())])
            .timeout(timeout + WAIT_GRACE);
        self.run_checked(spec).await.map(drop)
    }

    async fn fetch_credentials(
        &self,
        cluster: &str,
        zone: &str,
        project: &str,
        kubeconfig: &Path,
    ) -> Result<(), ProviderError> {
        let spec = CommandSpec::new(&self.gcloud)
            .args(["container", "clusters", "get-credentials", cluster])
            .args(["--zone", zone, "--project", project])
            .env("KUBECONFIG", kubeconfig.display().to_string());
        self.run_checked(spec).await.map(drop)
    }

    async fn exec(
        &self,
        target: ClusterTarget<'_>,
        namespace: &str,
        pod: &str,
        command: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ProviderError> {
        let spec = CommandSpec::new(&self.kubectl)
            .args(["exec", pod])
            .args(match target {
                ClusterTarget::Test(kubeconfig) => {
                    vec!["--kubeconfig".to_owned(), kubeconfig.display().to_string()]
                }
                ClusterTarget::Management => Vec::new(),
            })
            .args(["--namespace", namespace, "--"])
            .args(command.iter().cloned())
            .timeout(timeout);
        self.runner.run(&spec).await
    }

    async fn delete(
        &self,
        target: ClusterTarget<'_>,
        kind: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let spec = self
            .kubectl("delete", target, None)
            .args([kind, name])
            .timeout(timeout);
        self.run_checked(spec).await.map(drop)
    }
}
