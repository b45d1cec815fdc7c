//! Unit tests for webhook configuration generation
//!
//! The builders are pure: the same policy must always produce the same
//! object, since that equality is what makes a repeated server-side apply a
//! no-op. Selector shaping is the safety-critical part: a cluster-scoped
//! policy must never be able to intercept the operator's own namespace.

use k8s_openapi::api::admissionregistration::v1::MatchCondition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::ByteString;
use kube::core::ObjectMeta;

use policy_operator::crd::{
    AdmissionPolicy, AdmissionPolicySpec, ClusterAdmissionPolicy, ClusterAdmissionPolicySpec,
    Policy,
};
use policy_operator::resources::naming::policy_server_deployment_name;
use policy_operator::resources::webhook_configuration::{
    generate_mutating_webhook_configuration, generate_validating_webhook_configuration,
    namespace_selector,
};

const DEPLOYMENTS_NAMESPACE: &str = "policy-system";

fn ca_bundle() -> ByteString {
    ByteString(b"-----BEGIN CERTIFICATE-----".to_vec())
}

fn cluster_policy(name: &str) -> ClusterAdmissionPolicy {
    ClusterAdmissionPolicy {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: ClusterAdmissionPolicySpec {
            policy_server: String::new(),
            module: "registry://policies/pod-privileged:v1.0.0".to_string(),
            rules: vec![],
            mutating: false,
            failure_policy: Some("Fail".to_string()),
            match_policy: None,
            namespace_selector: None,
            object_selector: None,
            side_effects: None,
            timeout_seconds: Some(10),
            match_conditions: vec![],
        },
        status: None,
    }
}

fn namespaced_policy(name: &str, namespace: &str) -> AdmissionPolicy {
    AdmissionPolicy {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: AdmissionPolicySpec {
            policy_server: String::new(),
            module: "registry://policies/safe-labels:v1.0.0".to_string(),
            rules: vec![],
            mutating: true,
            failure_policy: None,
            match_policy: None,
            object_selector: None,
            side_effects: None,
            timeout_seconds: None,
            match_conditions: vec![],
        },
        status: None,
    }
}

mod unique_name_tests {
    use super::*;

    #[test]
    fn test_cluster_policy_unique_name() {
        let policy = cluster_policy("psp");
        assert_eq!(policy.unique_name(), "clusterwide-psp");
    }

    #[test]
    fn test_namespaced_policy_unique_name() {
        let policy = namespaced_policy("labels", "team-a");
        assert_eq!(policy.unique_name(), "namespaced-team-a-labels");
    }
}

mod namespace_selector_tests {
    use super::*;

    #[test]
    fn test_cluster_policy_excludes_deployments_namespace() {
        let policy = cluster_policy("psp");
        let selector =
            namespace_selector(&policy, DEPLOYMENTS_NAMESPACE).expect("selector expected");
        let expressions = selector.match_expressions.expect("expressions expected");

        assert_eq!(expressions.len(), 1);
        assert_eq!(expressions[0].key, "kubernetes.io/metadata.name");
        assert_eq!(expressions[0].operator, "NotIn");
        assert_eq!(
            expressions[0].values,
            Some(vec![DEPLOYMENTS_NAMESPACE.to_string()])
        );
    }

    #[test]
    fn test_cluster_policy_user_expressions_are_appended_after_exclusion() {
        let mut policy = cluster_policy("psp");
        policy.spec.namespace_selector = Some(LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "environment".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["production".to_string()]),
            }]),
            match_labels: None,
        });

        let selector =
            namespace_selector(&policy, DEPLOYMENTS_NAMESPACE).expect("selector expected");
        let expressions = selector.match_expressions.expect("expressions expected");

        assert_eq!(expressions.len(), 2);
        // the self-exclusion always comes first and is never displaced
        assert_eq!(expressions[0].key, "kubernetes.io/metadata.name");
        assert_eq!(expressions[0].operator, "NotIn");
        assert_eq!(expressions[1].key, "environment");
    }

    #[test]
    fn test_namespaced_policy_gets_no_implicit_exclusion() {
        let policy = namespaced_policy("labels", "team-a");
        assert_eq!(namespace_selector(&policy, DEPLOYMENTS_NAMESPACE), None);
    }
}

mod validating_webhook_tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let policy = cluster_policy("psp");
        let ca = ca_bundle();
        let service = policy_server_deployment_name(policy.policy_server());

        let first = generate_validating_webhook_configuration(
            &policy,
            &ca,
            DEPLOYMENTS_NAMESPACE,
            &service,
            false,
        );
        let second = generate_validating_webhook_configuration(
            &policy,
            &ca,
            DEPLOYMENTS_NAMESPACE,
            &service,
            false,
        );

        assert_eq!(first, second);
    }

    #[test]
    fn test_service_reference_shape() {
        let policy = cluster_policy("psp");
        let configuration = generate_validating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            false,
        );

        let webhooks = configuration.webhooks.expect("webhooks expected");
        assert_eq!(webhooks.len(), 1);

        let service = webhooks[0]
            .client_config
            .service
            .as_ref()
            .expect("service reference expected");
        assert_eq!(service.namespace, DEPLOYMENTS_NAMESPACE);
        assert_eq!(service.name, "policy-server-default");
        assert_eq!(service.path.as_deref(), Some("/validate/clusterwide-psp"));
        assert_eq!(service.port, Some(8443));

        assert_eq!(webhooks[0].client_config.ca_bundle, Some(ca_bundle()));
        assert_eq!(webhooks[0].admission_review_versions, vec!["v1".to_string()]);
    }

    #[test]
    fn test_side_effects_default_to_none() {
        let policy = cluster_policy("psp");
        let configuration = generate_validating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            false,
        );

        let webhooks = configuration.webhooks.expect("webhooks expected");
        assert_eq!(webhooks[0].side_effects, "None");
    }

    #[test]
    fn test_declared_side_effects_are_kept() {
        let mut policy = cluster_policy("psp");
        policy.spec.side_effects = Some("NoneOnDryRun".to_string());
        let configuration = generate_validating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            false,
        );

        let webhooks = configuration.webhooks.expect("webhooks expected");
        assert_eq!(webhooks[0].side_effects, "NoneOnDryRun");
    }

    #[test]
    fn test_provenance_labels_and_annotations() {
        let policy = namespaced_policy("labels", "team-a");
        let configuration = generate_validating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            false,
        );

        let labels = configuration.metadata.labels.expect("labels expected");
        assert_eq!(
            labels.get("app.kubernetes.io/part-of"),
            Some(&"policy-operator".to_string())
        );

        let annotations = configuration
            .metadata
            .annotations
            .expect("annotations expected");
        assert_eq!(
            annotations.get("policies.example.com/policy-name"),
            Some(&"labels".to_string())
        );
        assert_eq!(
            annotations.get("policies.example.com/policy-namespace"),
            Some(&"team-a".to_string())
        );
    }

    #[test]
    fn test_match_conditions_attached_when_gate_enabled() {
        let mut policy = cluster_policy("psp");
        policy.spec.match_conditions = vec![MatchCondition {
            name: "exclude-leases".to_string(),
            expression: "request.resource.resource != 'leases'".to_string(),
        }];

        let configuration = generate_validating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            true,
        );

        let webhooks = configuration.webhooks.expect("webhooks expected");
        let conditions = webhooks[0]
            .match_conditions
            .as_ref()
            .expect("match conditions expected");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].name, "exclude-leases");
    }

    #[test]
    fn test_match_conditions_dropped_when_gate_disabled() {
        let mut policy = cluster_policy("psp");
        policy.spec.match_conditions = vec![MatchCondition {
            name: "exclude-leases".to_string(),
            expression: "request.resource.resource != 'leases'".to_string(),
        }];

        let configuration = generate_validating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            false,
        );

        let webhooks = configuration.webhooks.expect("webhooks expected");
        assert_eq!(webhooks[0].match_conditions, None);
    }
}

mod mutating_webhook_tests {
    use super::*;

    #[test]
    fn test_mutating_configuration_mirrors_validating_shape() {
        let policy = namespaced_policy("labels", "team-a");
        let configuration = generate_mutating_webhook_configuration(
            &policy,
            &ca_bundle(),
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            false,
        );

        assert_eq!(
            configuration.metadata.name.as_deref(),
            Some("namespaced-team-a-labels")
        );

        let webhooks = configuration.webhooks.expect("webhooks expected");
        assert_eq!(webhooks.len(), 1);

        let service = webhooks[0]
            .client_config
            .service
            .as_ref()
            .expect("service reference expected");
        assert_eq!(
            service.path.as_deref(),
            Some("/validate/namespaced-team-a-labels")
        );
        assert_eq!(service.port, Some(8443));
        assert_eq!(webhooks[0].side_effects, "None");
        // a namespaced policy gets no implicit namespace exclusion
        assert_eq!(webhooks[0].namespace_selector, None);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let policy = namespaced_policy("labels", "team-a");
        let ca = ca_bundle();

        let first = generate_mutating_webhook_configuration(
            &policy,
            &ca,
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            true,
        );
        let second = generate_mutating_webhook_configuration(
            &policy,
            &ca,
            DEPLOYMENTS_NAMESPACE,
            "policy-server-default",
            true,
        );

        assert_eq!(first, second);
    }
}
