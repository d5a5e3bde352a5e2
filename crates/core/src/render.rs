//! Manifest rendering: literal placeholder substitution.
//!
//! Templates use shell-style tokens (`$CLUSTER_NAME`). Only the five tokens in
//! [`Placeholder`] are recognised, and every literal occurrence of one is
//! replaced, wherever it appears: `$ZONES` renders as `<zone>S`. Any other
//! `$` text is copied through verbatim.
//!
//! Substitution is a single left-to-right pass that tries the longest token
//! first. Substituted values are never rescanned, so rendering is
//! deterministic and no recognised token survives it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::TestContext;
use crate::error::RenderError;

/// Plugin DaemonSet, workload identity bindings.
pub const PLUGIN_TEMPLATE: &str = "provider-gcp-plugin.yaml.tmpl";
/// Config Connector `ContainerCluster` definition.
pub const CLUSTER_TEMPLATE: &str = "test-cluster.yaml.tmpl";
/// Probe pod with the CSI volume.
pub const POD_TEMPLATE: &str = "test-pod.yaml.tmpl";

/// Recognised template tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    ProjectId,
    ClusterName,
    SecretId,
    ProviderRevision,
    Zone,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::ProjectId,
        Placeholder::ClusterName,
        Placeholder::SecretId,
        Placeholder::ProviderRevision,
        Placeholder::Zone,
    ];

    /// The literal token, including the leading `$`.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::ProjectId => "$PROJECT_ID",
            Placeholder::ClusterName => "$CLUSTER_NAME",
            Placeholder::SecretId => "$TEST_SECRET_ID",
            Placeholder::ProviderRevision => "$GCP_PROVIDER_SHA",
            Placeholder::Zone => "$ZONE",
        }
    }
}

/// Values bound to every [`Placeholder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    values: [(Placeholder, String); 5],
}

impl Substitutions {
    pub fn new(
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        secret_id: impl Into<String>,
        provider_revision: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            values: [
                (Placeholder::ProjectId, project_id.into()),
                (Placeholder::ClusterName, cluster_name.into()),
                (Placeholder::SecretId, secret_id.into()),
                (Placeholder::ProviderRevision, provider_revision.into()),
                (Placeholder::Zone, zone.into()),
            ],
        }
    }

    pub fn from_context(ctx: &TestContext) -> Self {
        Self::new(
            ctx.project_id(),
            ctx.cluster_name(),
            ctx.secret_id(),
            ctx.provider_revision(),
            ctx.zone(),
        )
    }

    /// The longest token at the start of `input`, if any, with its value.
    fn match_at(&self, input: &str) -> Option<(&'static str, &str)> {
        self.values
            .iter()
            .filter(|(p, _)| input.starts_with(p.token()))
            .max_by_key(|(p, _)| p.token().len())
            .map(|(p, value)| (p.token(), value.as_str()))
    }
}

/// Substitutes every recognised token in `template`.
pub fn render_str(template: &str, subs: &Substitutions) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match subs.match_at(rest) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                out.push('$');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Reads templates from a directory and renders them.
#[derive(Debug, Clone)]
pub struct ManifestRenderer {
    templates_dir: PathBuf,
}

impl ManifestRenderer {
    /// `templates_dir` is resolved against the working directory when relative.
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Renders `template` (a file name inside the templates directory).
    pub fn render(&self, template: &str, subs: &Substitutions) -> Result<String, RenderError> {
        let path = self.templates_dir.join(template);
        let content = std::fs::read_to_string(&path).map_err(|source| RenderError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(render_str(&content, subs))
    }

    /// Renders `template` and writes the result to `dest` (mode 0644).
    pub fn render_to(
        &self,
        template: &str,
        dest: &Path,
        subs: &Substitutions,
    ) -> Result<(), RenderError> {
        let rendered = self.render(template, subs)?;
        write_readable(dest, rendered.as_bytes()).map_err(|source| RenderError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        debug!(template, dest = %dest.display(), "manifest rendered");
        Ok(())
    }
}

/// Writes `contents` to `path` with owner read/write and world read.
fn write_readable(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    // Explicit chmod so the process umask cannot narrow it.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    file.write_all(contents)
}
