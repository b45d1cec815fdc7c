use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{MatchCondition, RuleWithOperations};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::policy::{
    policy_server_or_default, Policy, PolicyGroup, PolicyGroupMember, PolicyScope, PolicyStatus,
};

/// AdmissionPolicyGroup is the Schema for namespaced policy groups.
///
/// A policy group combines the verdicts of its named members through a
/// boolean expression into one aggregate admission decision. Groups only
/// validate; they never mutate.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "policies.example.com",
    version = "v1alpha1",
    kind = "AdmissionPolicyGroup",
    plural = "admissionpolicygroups",
    shortname = "apg",
    namespaced,
    status = "PolicyStatus",
    printcolumn = r#"{"name":"Policy Server", "type":"string", "jsonPath":".spec.policyServer"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionPolicyGroupSpec {
    /// Policy server that hosts the member policies
    #[serde(default)]
    pub policy_server: String,

    /// Boolean formula over the member names, e.g. `policy1() && policy2()`
    pub expression: String,

    /// Message shown to a requester when the aggregate evaluation denies
    #[serde(default)]
    pub message: String,

    /// Member policies, keyed by the name the expression refers to them by
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyGroupMember>,

    /// Admission rules this group intercepts
    #[serde(default)]
    pub rules: Vec<RuleWithOperations>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_selector: Option<LabelSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,

    /// Fine-grained request filters, honored only when the match-conditions
    /// feature gate is enabled on the operator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_conditions: Vec<MatchCondition>,
}

impl Policy for AdmissionPolicyGroup {
    fn name(&self) -> String {
        kube::ResourceExt::name_any(self)
    }

    fn namespace(&self) -> Option<String> {
        kube::ResourceExt::namespace(self)
    }

    fn unique_name(&self) -> String {
        format!(
            "namespaced-{}-{}",
            self.namespace().unwrap_or_default(),
            self.name()
        )
    }

    fn policy_server(&self) -> &str {
        policy_server_or_default(&self.spec.policy_server)
    }

    fn rules(&self) -> &[RuleWithOperations] {
        &self.spec.rules
    }

    fn failure_policy(&self) -> Option<&str> {
        self.spec.failure_policy.as_deref()
    }

    fn match_policy(&self) -> Option<&str> {
        self.spec.match_policy.as_deref()
    }

    fn namespace_selector(&self) -> Option<&LabelSelector> {
        None
    }

    fn object_selector(&self) -> Option<&LabelSelector> {
        self.spec.object_selector.as_ref()
    }

    fn side_effects(&self) -> Option<&str> {
        self.spec.side_effects.as_deref()
    }

    fn timeout_seconds(&self) -> Option<i32> {
        self.spec.timeout_seconds
    }

    fn match_conditions(&self) -> &[MatchCondition] {
        &self.spec.match_conditions
    }

    fn scope(&self) -> PolicyScope {
        PolicyScope::Namespaced
    }

    fn is_mutating(&self) -> bool {
        false
    }
}

impl PolicyGroup for AdmissionPolicyGroup {
    fn expression(&self) -> &str {
        &self.spec.expression
    }

    fn message(&self) -> &str {
        &self.spec.message
    }

    fn policy_members(&self) -> &BTreeMap<String, PolicyGroupMember> {
        &self.spec.policies
    }
}
