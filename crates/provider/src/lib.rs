//! External collaborators of the csi-e2e harness.
//!
//! Each collaborator is a trait with a CLI-backed production implementation:
//!
//! - [`ControlPlane`] / [`KubectlControlPlane`]: cluster objects via `kubectl`
//! - [`SecretStore`] / [`GcloudSecretStore`]: secrets via `gcloud secrets`
//! - [`CommandRunner`] / [`ProcessRunner`]: the process boundary both use
//!
//! Stage code is generic over the traits so tests can substitute fakes.

pub mod command;
pub mod control_plane;
pub mod error;
pub mod secret_store;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use control_plane::{ClusterTarget, ControlPlane, KubectlControlPlane};
pub use error::ProviderError;
pub use secret_store::{GcloudSecretStore, SecretStore};
