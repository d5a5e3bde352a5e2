//! Shared building blocks of the csi-e2e harness.
//!
//! - [`config`]: harness tunables (`HarnessConfig`) from TOML and env overrides
//! - [`context`]: per-run identity (`TestContext`) resolved from the environment
//! - [`render`]: manifest template substitution (`ManifestRenderer`)
//! - [`error`]: error taxonomy (`HarnessError`)

pub mod config;
pub mod context;
pub mod error;
pub mod render;

pub use config::HarnessConfig;
pub use context::{Identifiers, NameGenerator, TestContext};
pub use error::{ConfigError, ExternalError, HarnessError, RenderError};
pub use render::{ManifestRenderer, Placeholder, Substitutions};
