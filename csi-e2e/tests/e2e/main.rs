//! E2E lifecycle tests for csi-e2e.
//!
//! The suite runner is driven end to end against in-memory fakes of the
//! control plane and the secret store, so no cluster or cloud project is
//! needed.
//!
//! - `helpers/` -- fakes, context and config builders
//! - `scenarios/` -- one file per outcome family
//!
//! ```bash
//! cargo test -p csi-e2e --test e2e
//! ```

mod helpers;
mod scenarios;
