//! Deterministic resource-name derivation for policy servers.
//!
//! Pure functions, safe to call from any component or test without fixtures.

/// Prefix applied to every policy-server deployment and service name.
pub const POLICY_SERVER_NAME_PREFIX: &str = "policy-server-";

/// Derive the deployment name backing a policy server.
///
/// The same name is used for the service fronting the deployment, so the
/// generated webhook client configs can reference it verbatim.
pub fn policy_server_deployment_name(policy_server_name: &str) -> String {
    format!("{}{}", POLICY_SERVER_NAME_PREFIX, policy_server_name)
}
