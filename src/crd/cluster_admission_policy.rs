use k8s_openapi::api::admissionregistration::v1::{MatchCondition, RuleWithOperations};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::policy::{policy_server_or_default, Policy, PolicyScope, PolicyStatus};

/// ClusterAdmissionPolicy is the Schema for cluster-wide admission policies.
///
/// Cluster-wide policies can intercept requests in any namespace, which is
/// why the generated webhook configuration always excludes the namespace the
/// policy infrastructure itself runs in.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "policies.example.com",
    version = "v1alpha1",
    kind = "ClusterAdmissionPolicy",
    plural = "clusteradmissionpolicies",
    shortname = "cap",
    status = "PolicyStatus",
    printcolumn = r#"{"name":"Policy Server", "type":"string", "jsonPath":".spec.policyServer"}"#,
    printcolumn = r#"{"name":"Mutating", "type":"boolean", "jsonPath":".spec.mutating"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAdmissionPolicySpec {
    /// Policy server that hosts this policy's evaluation logic
    #[serde(default)]
    pub policy_server: String,

    /// Module reference of the policy's evaluation logic
    pub module: String,

    /// Admission rules this policy intercepts
    #[serde(default)]
    pub rules: Vec<RuleWithOperations>,

    /// Whether the policy mutates incoming objects
    #[serde(default)]
    pub mutating: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_policy: Option<String>,

    /// Restricts the namespaces this policy intercepts. The operator's own
    /// namespace is excluded on top of whatever is declared here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,

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

impl Policy for ClusterAdmissionPolicy {
    fn name(&self) -> String {
        kube::ResourceExt::name_any(self)
    }

    fn namespace(&self) -> Option<String> {
        None
    }

    fn unique_name(&self) -> String {
        format!("clusterwide-{}", self.name())
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
        self.spec.namespace_selector.as_ref()
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
        PolicyScope::Cluster
    }

    fn is_mutating(&self) -> bool {
        self.spec.mutating
    }
}
