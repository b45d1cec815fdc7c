//! Webhook configuration generation for admission policies
//!
//! Builds the desired `ValidatingWebhookConfiguration` /
//! `MutatingWebhookConfiguration` for a policy. Both kinds share the same
//! shaping; only the object kind differs. Builders are pure so the same
//! inputs always produce the same object, which is what makes the
//! server-side apply in the controller a no-op on unchanged specs.

use k8s_openapi::api::admissionregistration::v1::{
    MatchCondition, MutatingWebhook, MutatingWebhookConfiguration, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::ByteString;
use kube::core::ObjectMeta;
use tracing::info;

use crate::crd::{Policy, PolicyScope};
use crate::resources::common::{
    webhook_annotations, webhook_labels, POLICY_SERVER_SERVICE_PORT,
};

/// Label every namespace carries with its own name
const NAMESPACE_NAME_LABEL_KEY: &str = "kubernetes.io/metadata.name";

/// Path prefix under which the policy server routes admission requests
const ADMISSION_PATH_PREFIX: &str = "/validate";

/// Suffix of the webhook entry name inside a configuration
const WEBHOOK_NAME_SUFFIX: &str = "policies.example.com";

/// Compute the namespace selector for a policy's webhook.
///
/// Cluster-scoped policies always exclude the namespace the policy
/// infrastructure runs in, ahead of any user-declared expressions: the
/// infrastructure must never intercept its own admission requests, or a
/// failing policy server could deadlock the component that repairs it.
/// Namespaced policies are bound to their own namespace by definition and
/// get the user-declared selector verbatim.
pub fn namespace_selector(
    policy: &dyn Policy,
    deployments_namespace: &str,
) -> Option<LabelSelector> {
    match policy.scope() {
        PolicyScope::Cluster => {
            let mut match_expressions = vec![LabelSelectorRequirement {
                key: NAMESPACE_NAME_LABEL_KEY.to_string(),
                operator: "NotIn".to_string(),
                values: Some(vec![deployments_namespace.to_string()]),
            }];
            if let Some(selector) = policy.namespace_selector() {
                if let Some(expressions) = &selector.match_expressions {
                    match_expressions.extend(expressions.iter().cloned());
                }
            }
            Some(LabelSelector {
                match_expressions: Some(match_expressions),
                match_labels: None,
            })
        }
        PolicyScope::Namespaced => policy.namespace_selector().cloned(),
    }
}

fn client_config(
    policy: &dyn Policy,
    ca_bundle: &ByteString,
    deployments_namespace: &str,
    policy_server_service_name: &str,
) -> WebhookClientConfig {
    let admission_path = format!("{}/{}", ADMISSION_PATH_PREFIX, policy.unique_name());

    WebhookClientConfig {
        service: Some(ServiceReference {
            namespace: deployments_namespace.to_string(),
            name: policy_server_service_name.to_string(),
            path: Some(admission_path),
            port: Some(POLICY_SERVER_SERVICE_PORT),
        }),
        ca_bundle: Some(ca_bundle.clone()),
        url: None,
    }
}

fn gated_match_conditions(
    policy: &dyn Policy,
    match_conditions_enabled: bool,
) -> Option<Vec<MatchCondition>> {
    if match_conditions_enabled {
        if policy.match_conditions().is_empty() {
            None
        } else {
            Some(policy.match_conditions().to_vec())
        }
    } else {
        if !policy.match_conditions().is_empty() {
            // declared intent is dropped, not rejected: the gate can be
            // toggled independently of policy authorship
            info!(
                policy = %policy.name(),
                "skipping matchConditions: the AdmissionWebhookMatchConditions feature gate is disabled"
            );
        }
        None
    }
}

fn webhook_metadata(policy: &dyn Policy) -> ObjectMeta {
    ObjectMeta {
        name: Some(policy.unique_name()),
        labels: Some(webhook_labels()),
        annotations: Some(webhook_annotations(policy)),
        ..Default::default()
    }
}

/// Generate the ValidatingWebhookConfiguration for a validating policy
pub fn generate_validating_webhook_configuration(
    policy: &dyn Policy,
    ca_bundle: &ByteString,
    deployments_namespace: &str,
    policy_server_service_name: &str,
    match_conditions_enabled: bool,
) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: webhook_metadata(policy),
        webhooks: Some(vec![ValidatingWebhook {
            name: format!("{}.{}", policy.unique_name(), WEBHOOK_NAME_SUFFIX),
            client_config: client_config(
                policy,
                ca_bundle,
                deployments_namespace,
                policy_server_service_name,
            ),
            rules: Some(policy.rules().to_vec()),
            failure_policy: policy.failure_policy().map(str::to_string),
            match_policy: policy.match_policy().map(str::to_string),
            namespace_selector: namespace_selector(policy, deployments_namespace),
            object_selector: policy.object_selector().cloned(),
            side_effects: policy.side_effects().unwrap_or("None").to_string(),
            timeout_seconds: policy.timeout_seconds(),
            admission_review_versions: vec!["v1".to_string()],
            match_conditions: gated_match_conditions(policy, match_conditions_enabled),
        }]),
    }
}

/// Generate the MutatingWebhookConfiguration for a mutating policy
pub fn generate_mutating_webhook_configuration(
    policy: &dyn Policy,
    ca_bundle: &ByteString,
    deployments_namespace: &str,
    policy_server_service_name: &str,
    match_conditions_enabled: bool,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: webhook_metadata(policy),
        webhooks: Some(vec![MutatingWebhook {
            name: format!("{}.{}", policy.unique_name(), WEBHOOK_NAME_SUFFIX),
            client_config: client_config(
                policy,
                ca_bundle,
                deployments_namespace,
                policy_server_service_name,
            ),
            rules: Some(policy.rules().to_vec()),
            failure_policy: policy.failure_policy().map(str::to_string),
            match_policy: policy.match_policy().map(str::to_string),
            namespace_selector: namespace_selector(policy, deployments_namespace),
            object_selector: policy.object_selector().cloned(),
            side_effects: policy.side_effects().unwrap_or("None").to_string(),
            timeout_seconds: policy.timeout_seconds(),
            admission_review_versions: vec!["v1".to_string()],
            match_conditions: gated_match_conditions(policy, match_conditions_enabled),
            reinvocation_policy: None,
        }]),
    }
}
