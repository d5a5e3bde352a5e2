//! Shared E2E test helpers.

pub mod setup;
