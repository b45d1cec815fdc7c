//! Shared policy types and the capability set every policy kind exposes.
//!
//! The controller never type-switches on concrete policy kinds: everything it
//! needs flows through the [`Policy`] trait, and the scope-dependent selector
//! logic branches on [`PolicyScope`] alone.

use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{MatchCondition, RuleWithOperations};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::resources::common::DEFAULT_POLICY_SERVER;

/// Scope of a policy kind: does it bind cluster-wide or to its own namespace?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyScope {
    Cluster,
    Namespaced,
}

/// One named sub-policy inside a policy group.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyGroupMember {
    /// Module reference of the sub-policy's evaluation logic
    pub module: String,
}

/// Observed lifecycle phase of a policy.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum PolicyPhase {
    /// Accepted but its webhook configuration is not installed yet
    #[default]
    Pending,
    /// Its webhook configuration is installed and current
    Active,
}

/// Status subresource shared by all policy kinds.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    /// Current lifecycle phase
    #[serde(default)]
    pub phase: PolicyPhase,
}

/// Capability set shared by every policy kind.
///
/// `unique_name` is the stable identity under which generated cluster
/// artifacts are keyed; it must stay collision-free across kinds and
/// namespaces.
pub trait Policy: Send + Sync {
    fn name(&self) -> String;
    fn namespace(&self) -> Option<String>;
    fn unique_name(&self) -> String;

    /// Name of the policy server backing this policy, defaulted when unset.
    fn policy_server(&self) -> &str;

    fn rules(&self) -> &[RuleWithOperations];
    fn failure_policy(&self) -> Option<&str>;
    fn match_policy(&self) -> Option<&str>;
    fn namespace_selector(&self) -> Option<&LabelSelector>;
    fn object_selector(&self) -> Option<&LabelSelector>;
    fn side_effects(&self) -> Option<&str>;
    fn timeout_seconds(&self) -> Option<i32>;
    fn match_conditions(&self) -> &[MatchCondition];

    fn scope(&self) -> PolicyScope;

    /// Whether this policy intercepts the mutating side of admission.
    fn is_mutating(&self) -> bool;
}

/// Additional capabilities of the group kinds.
pub trait PolicyGroup: Policy {
    /// Boolean formula combining the member verdicts
    fn expression(&self) -> &str;

    /// Message returned to a requester when the aggregate evaluation denies
    fn message(&self) -> &str;

    fn policy_members(&self) -> &BTreeMap<String, PolicyGroupMember>;
}

pub(crate) fn policy_server_or_default(policy_server: &str) -> &str {
    if policy_server.is_empty() {
        DEFAULT_POLICY_SERVER
    } else {
        policy_server
    }
}
