//! Common constants and label helpers for generated webhook configurations.
//!
//! Generated cluster artifacts carry provenance labels and annotations so
//! that an orphaned configuration can be correlated back to the policy that
//! produced it, even after that policy is gone.

use std::collections::BTreeMap;

use crate::crd::Policy;

/// Operator field manager name for server-side apply
pub const FIELD_MANAGER: &str = "policy-operator";

/// Label marking an object as managed by this operator
pub const PART_OF_LABEL_KEY: &str = "app.kubernetes.io/part-of";
pub const PART_OF_LABEL_VALUE: &str = "policy-operator";

/// Annotations recording the policy a webhook configuration was generated from
pub const POLICY_NAME_ANNOTATION_KEY: &str = "policies.example.com/policy-name";
pub const POLICY_NAMESPACE_ANNOTATION_KEY: &str = "policies.example.com/policy-namespace";

/// Port every policy-server service listens on
pub const POLICY_SERVER_SERVICE_PORT: i32 = 8443;

/// Secret holding the CA certificate trusted by the API server when calling
/// policy-server webhooks, and the key its bundle lives under.
pub const ROOT_CA_SECRET_NAME: &str = "policy-operator-root-ca";
pub const CA_CERT_KEY: &str = "ca.crt";

/// Policy server used when a policy does not name one
pub const DEFAULT_POLICY_SERVER: &str = "default";

/// Labels applied to every generated webhook configuration
pub fn webhook_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        PART_OF_LABEL_KEY.to_string(),
        PART_OF_LABEL_VALUE.to_string(),
    )])
}

/// Provenance annotations pointing back at the owning policy.
///
/// Cluster-scoped policies have no namespace; the annotation is written with
/// an empty value so both keys are always present.
pub fn webhook_annotations(policy: &dyn Policy) -> BTreeMap<String, String> {
    BTreeMap::from([
        (POLICY_NAME_ANNOTATION_KEY.to_string(), policy.name()),
        (
            POLICY_NAMESPACE_ANNOTATION_KEY.to_string(),
            policy.namespace().unwrap_or_default(),
        ),
    ])
}
