//! Workload verification: the single end-to-end assertion.
//!
//! A probe pod mounts the secret through the CSI volume; the check passes
//! only if reading the mounted file inside the pod yields exactly the secret
//! id. Every failure, including ones in the setup steps, becomes a failed
//! [`VerificationResult`] rather than an error.

use tracing::{info, warn};

use csi_e2e_core::config::VerifyConfig;
use csi_e2e_core::error::HarnessError;
use csi_e2e_core::render::POD_TEMPLATE;
use csi_e2e_core::{ManifestRenderer, Substitutions, TestContext};
use csi_e2e_provider::{ClusterTarget, CommandOutput, ControlPlane};

/// Name of the mounted-secret check.
pub const MOUNT_SECRET_CHECK: &str = "mount-secret";

const POD_MANIFEST: &str = "test-pod.yaml";

/// Outcome of one verification check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub check: String,
    pub passed: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Why the check failed; `None` when it passed.
    pub failure: Option<String>,
}

impl VerificationResult {
    fn from_output(check: &str, expected: &str, output: CommandOutput) -> Self {
        let failure = compare_mounted(expected, &output).err();
        Self {
            check: check.to_owned(),
            passed: failure.is_none(),
            stdout: output.stdout,
            stderr: output.stderr,
            failure,
        }
    }

    fn errored(check: &str, err: &HarnessError) -> Self {
        Self {
            check: check.to_owned(),
            passed: false,
            stdout: Vec::new(),
            stderr: Vec::new(),
            failure: Some(err.to_string()),
        }
    }
}

/// Compares what was read from the mount with the expected secret value.
///
/// Byte-exact: a trailing newline or any other difference is a mismatch.
pub fn compare_mounted(expected: &str, output: &CommandOutput) -> Result<(), String> {
    if !output.success {
        return Err(format!(
            "reading the mounted secret failed ({}): {}",
            output.status,
            output.stderr_lossy().trim_end()
        ));
    }
    if output.stdout != expected.as_bytes() {
        return Err(format!(
            "mounted secret mismatch: expected {expected:?}, got {:?}",
            output.stdout_lossy()
        ));
    }
    Ok(())
}

/// Runs the `mount-secret` check against the provisioned test cluster.
pub async fn verify_mounted_secret<C: ControlPlane>(
    ctx: &TestContext,
    config: &VerifyConfig,
    renderer: &ManifestRenderer,
    control_plane: &C,
) -> VerificationResult {
    let result = match read_mounted_secret(ctx, config, renderer, control_plane).await {
        Ok(output) => VerificationResult::from_output(MOUNT_SECRET_CHECK, ctx.secret_id(), output),
        Err(err) => VerificationResult::errored(MOUNT_SECRET_CHECK, &err),
    };

    if result.passed {
        info!(check = MOUNT_SECRET_CHECK, "check passed");
    } else {
        warn!(
            check = MOUNT_SECRET_CHECK,
            stdout = %String::from_utf8_lossy(&result.stdout),
            stderr = %String::from_utf8_lossy(&result.stderr),
            reason = result.failure.as_deref().unwrap_or_default(),
            "check failed"
        );
    }
    result
}

async fn read_mounted_secret<C: ControlPlane>(
    ctx: &TestContext,
    config: &VerifyConfig,
    renderer: &ManifestRenderer,
    control_plane: &C,
) -> Result<CommandOutput, HarnessError> {
    let pod_manifest = ctx.scratch_file(POD_MANIFEST);
    renderer.render_to(POD_TEMPLATE, &pod_manifest, &Substitutions::from_context(ctx))?;

    let test_cluster = ClusterTarget::Test(ctx.kubeconfig());
    let namespace = config.namespace.as_str();
    control_plane
        .apply(
            test_cluster,
            Some(namespace),
            &[pod_manifest.display().to_string()],
        )
        .await?;

    // kubectl wait fails outright on an object the API server has not
    // published yet (kubernetes/kubernetes#83242).
    tokio::time::sleep(config.settle_delay()).await;

    control_plane
        .wait_for(
            test_cluster,
            Some(namespace),
            &format!("pod/{}", config.pod_name),
            "Ready",
            config.pod_ready_timeout(),
        )
        .await?;

    let mounted = format!(
        "{}/{}",
        config.mount_dir.trim_end_matches('/'),
        ctx.secret_id()
    );
    info!(pod = %config.pod_name, path = %mounted, "reading mounted secret");
    let output = control_plane
        .exec(
            test_cluster,
            namespace,
            &config.pod_name,
            &["cat".to_owned(), mounted],
            config.exec_timeout(),
        )
        .await?;
    Ok(output)
}
