//! Provider error type.
//!
//! [`ProviderError`] covers every way an external CLI call can fail.
//! `From<ProviderError> for HarnessError` lets stage code propagate it with `?`.

use std::time::Duration;

use csi_e2e_core::error::{ExternalError, HarnessError};

/// External command failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The program could not be started (not installed, permission denied).
    #[error("failed to start `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` exited with {status}: {}", stderr.trim_end())]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The program was killed after exceeding its bound.
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

impl From<ProviderError> for HarnessError {
    fn from(err: ProviderError) -> Self {
        let external = match err {
            ProviderError::Spawn { command, reason } => ExternalError::Spawn { command, reason },
            ProviderError::CommandFailed {
                command,
                status,
                stderr,
            } => ExternalError::Failed {
                command,
                status,
                stderr,
            },
            ProviderError::Timeout { command, timeout } => ExternalError::TimedOut {
                command,
                timeout_secs: timeout.as_secs(),
            },
        };
        HarnessError::External(external)
    }
}
