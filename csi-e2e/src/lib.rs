//! csi-e2e harness library.
//!
//! The stages are exposed for integration testing; `csi-e2e` itself is used
//! as a binary (main.rs).
//!
//! - [`provision`]: bring up the cluster, plugin stack and secret
//! - [`verify`]: the mounted-secret check
//! - [`teardown`]: unconditional best-effort cleanup
//! - [`runner`]: lifecycle state machine tying the stages together

pub mod provision;
pub mod runner;
pub mod teardown;
pub mod verify;

mod unwind;

pub use runner::{FailureKind, RunOutcome, RunReport, RunState, SuiteRunner};
pub use teardown::TeardownReport;
pub use verify::VerificationResult;
