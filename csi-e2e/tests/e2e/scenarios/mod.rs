mod config_error;
mod internal_fault;
mod provisioning_failure;
mod teardown;
mod verification_failure;
