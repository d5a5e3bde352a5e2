//! Environment provisioning.
//!
//! Ordered and fail-fast: the first failing step aborts the rest and its
//! error propagates to the suite runner, which still runs teardown.
//!
//! 1. render the plugin and cluster manifests into the scratch directory
//! 2. create the `ContainerCluster` through the management cluster
//! 3. wait for it to become Ready
//! 4. fetch its credentials into the scratch kubeconfig
//! 5. install the CSI driver, then the GCP plugin
//! 6. create the secret whose value is its own id

use tracing::info;

use csi_e2e_core::config::ProvisionConfig;
use csi_e2e_core::error::HarnessError;
use csi_e2e_core::render::{CLUSTER_TEMPLATE, PLUGIN_TEMPLATE};
use csi_e2e_core::{ManifestRenderer, Substitutions, TestContext};
use csi_e2e_provider::{ClusterTarget, ControlPlane, SecretStore};

/// Driver manifests, in install order, relative to `<base>/<version>/deploy/`.
pub const DRIVER_MANIFESTS: [&str; 6] = [
    "rbac-secretproviderclass.yaml",
    "rbac-secretprovidersyncing.yaml",
    "csidriver.yaml",
    "secrets-store.csi.x-k8s.io_secretproviderclasses.yaml",
    "secrets-store.csi.x-k8s.io_secretproviderclasspodstatuses.yaml",
    "secrets-store-csi-driver.yaml",
];

pub const PLUGIN_MANIFEST: &str = "provider-gcp-plugin.yaml";
pub const CLUSTER_MANIFEST: &str = "test-cluster.yaml";

/// Full URLs of the driver manifests for `version`.
pub fn driver_manifest_urls(base_url: &str, version: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    DRIVER_MANIFESTS
        .iter()
        .map(|file| format!("{base}/{version}/deploy/{file}"))
        .collect()
}

/// Brings up the test cluster, the plugin stack and the secret.
pub async fn provision<C, S>(
    ctx: &TestContext,
    config: &ProvisionConfig,
    renderer: &ManifestRenderer,
    control_plane: &C,
    secrets: &S,
) -> Result<(), HarnessError>
where
    C: ControlPlane,
    S: SecretStore,
{
    let subs = Substitutions::from_context(ctx);
    let plugin_manifest = ctx.scratch_file(PLUGIN_MANIFEST);
    let cluster_manifest = ctx.scratch_file(CLUSTER_MANIFEST);
    renderer.render_to(PLUGIN_TEMPLATE, &plugin_manifest, &subs)?;
    renderer.render_to(CLUSTER_TEMPLATE, &cluster_manifest, &subs)?;

    info!(cluster = %ctx.cluster_name(), "creating test cluster");
    control_plane
        .apply(
            ClusterTarget::Management,
            None,
            &[cluster_manifest.display().to_string()],
        )
        .await?;

    let timeout = config.cluster_ready_timeout();
    info!(
        cluster = %ctx.cluster_name(),
        timeout_secs = timeout.as_secs(),
        "waiting for test cluster"
    );
    control_plane
        .wait_for(
            ClusterTarget::Management,
            None,
            &format!("containercluster/{}", ctx.cluster_name()),
            "Ready",
            timeout,
        )
        .await?;

    control_plane
        .fetch_credentials(
            ctx.cluster_name(),
            ctx.zone(),
            ctx.project_id(),
            ctx.kubeconfig(),
        )
        .await?;

    let test_cluster = ClusterTarget::Test(ctx.kubeconfig());
    info!(version = %ctx.driver_version(), "installing secrets-store CSI driver");
    let mut manifests =
        driver_manifest_urls(&config.driver_manifest_base_url, ctx.driver_version());
    manifests.push(plugin_manifest.display().to_string());
    control_plane.apply(test_cluster, None, &manifests).await?;

    info!(secret = %ctx.secret_id(), "creating secret");
    secrets
        .create_secret(ctx.secret_id(), ctx.secret_id().as_bytes(), ctx.project_id())
        .await?;

    info!(cluster = %ctx.cluster_name(), "environment provisioned");
    Ok(())
}
