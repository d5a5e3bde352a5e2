//! Cloud secret store.
//!
//! Secret payloads are handed to `gcloud` on stdin (`--data-file -`) and never
//! written to the scratch directory.

use std::future::Future;
use std::time::Duration;

use crate::command::{CommandRunner, CommandSpec};
use crate::error::ProviderError;

/// Operations the harness needs from the secret manager.
pub trait SecretStore: Send + Sync {
    /// Creates `id` in `project` with a single version holding `value`.
    fn create_secret(
        &self,
        id: &str,
        value: &[u8],
        project: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Deletes `id` without prompting.
    fn delete_secret(
        &self,
        id: &str,
        project: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// [`SecretStore`] backed by `gcloud secrets`.
#[derive(Debug, Clone)]
pub struct GcloudSecretStore<R> {
    runner: R,
    gcloud: String,
}

impl<R: CommandRunner> GcloudSecretStore<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            gcloud: "gcloud".to_owned(),
        }
    }

    pub fn with_binary(mut self, gcloud: impl Into<String>) -> Self {
        self.gcloud = gcloud.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> SecretStore for GcloudSecretStore<R> {
    async fn create_secret(&self, id: &str, value: &[u8], project: &str) -> Result<(), ProviderError> {
        let spec = CommandSpec::new(&self.gcloud)
            .args(["secrets", "create", id])
            .args(["--replication-policy", "automatic"])
            .args(["--data-file", "-"])
            .args(["--project", project])
            .stdin(value);
        self.runner.run(&spec).await?.check(&spec).map(drop)
    }

    async fn delete_secret(&self, id: &str, project: &str, timeout: Duration) -> Result<(), ProviderError> {
        let spec = CommandSpec::new(&self.gcloud)
            .args(["secrets", "delete", id])
            .args(["--project", project, "--quiet"])
            .timeout(timeout);
        self.runner.run(&spec).await?.check(&spec).map(drop)
    }
}
