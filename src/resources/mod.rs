//! Kubernetes resource generation
//!
//! Pure builders for the cluster objects this operator manages. Each
//! generator takes a policy and returns the desired object; applying it is
//! the controller's job.

pub mod common;
pub mod naming;
pub mod webhook_configuration;
