//! Test suites for the provisioning core.

pub(crate) mod support;
