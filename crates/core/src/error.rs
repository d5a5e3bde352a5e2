//! Error types for every stage of a harness run.
//!
//! [`HarnessError`] is the top-level error. Stage-specific errors convert into
//! it with `?`, and the provider crate maps its own error type into
//! [`ExternalError`] the same way.

use std::path::PathBuf;

/// Top-level harness error.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Configuration could not be resolved.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A manifest template could not be rendered.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An external CLI invocation failed.
    #[error("external command error: {0}")]
    External(#[from] ExternalError),

    /// Local filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors. All of them are fatal and happen before any
/// external resource exists.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("{key} is empty")]
    MissingEnv { key: String },

    /// The harness config file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// The harness config file is not valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The scratch directory could not be created.
    #[error("failed to create scratch directory: {0}")]
    Scratch(std::io::Error),
}

/// Manifest rendering errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The rendered manifest could not be written.
    #[error("failed to write manifest {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures of external CLI invocations.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    /// The program could not be started.
    #[error("failed to start `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    /// The program exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The program did not finish within its bound.
    #[error("`{command}` timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },
}
