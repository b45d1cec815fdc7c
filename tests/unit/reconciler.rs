//! Unit tests for the webhook sub-reconciler against a mocked API server
//!
//! These tests drive the real client machinery through a mock service to
//! verify the store-facing semantics: deleting an absent artifact succeeds,
//! losing a deletion race succeeds, and apply goes through server-side apply
//! with the operator's field manager.

use http::{Method, Request, Response, StatusCode};
use kube::client::Body;
use kube::core::ObjectMeta;
use kube::Client;
use tower_test::mock;

use policy_operator::controller::{
    reconcile_mutating_webhook_configuration_deletion, reconcile_validating_webhook_configuration,
    reconcile_validating_webhook_configuration_deletion, Context,
};
use policy_operator::crd::{ClusterAdmissionPolicy, ClusterAdmissionPolicySpec, Policy};
use policy_operator::resources::webhook_configuration::generate_validating_webhook_configuration;

const DEPLOYMENTS_NAMESPACE: &str = "policy-system";

fn test_policy() -> ClusterAdmissionPolicy {
    ClusterAdmissionPolicy {
        metadata: ObjectMeta {
            name: Some("test-policy".to_string()),
            ..Default::default()
        },
        spec: ClusterAdmissionPolicySpec {
            policy_server: String::new(),
            module: "registry://policies/pod-privileged:v1.0.0".to_string(),
            rules: vec![],
            mutating: false,
            failure_policy: None,
            match_policy: None,
            namespace_selector: None,
            object_selector: None,
            side_effects: None,
            timeout_seconds: None,
            match_conditions: vec![],
        },
        status: None,
    }
}

fn mock_context() -> (Context, mock::Handle<Request<Body>, Response<Body>>) {
    let (mock_service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    let client = Client::new(mock_service, "default");
    (Context::new(client, DEPLOYMENTS_NAMESPACE, false), handle)
}

fn not_found_body(name: &str) -> Body {
    let status = serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("webhookconfigurations \"{}\" not found", name),
        "reason": "NotFound",
        "code": 404
    });
    Body::from(serde_json::to_vec(&status).expect("status serializes"))
}

fn json_response(status: StatusCode, body: Body) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body)
        .expect("response builds")
}

#[tokio::test]
async fn test_deleting_absent_validating_webhook_succeeds() {
    let (ctx, mut handle) = mock_context();
    let policy = test_policy();

    let server = tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("service called");
        assert_eq!(request.method(), Method::GET);
        assert!(request.uri().path().ends_with(
            "/validatingwebhookconfigurations/clusterwide-test-policy"
        ));
        send.send_response(json_response(
            StatusCode::NOT_FOUND,
            not_found_body("clusterwide-test-policy"),
        ));
    });

    reconcile_validating_webhook_configuration_deletion(&ctx, &policy)
        .await
        .expect("absent artifact deletion must succeed");
    server.await.expect("mock server");
}

#[tokio::test]
async fn test_deleting_absent_mutating_webhook_succeeds() {
    let (ctx, mut handle) = mock_context();
    let policy = test_policy();

    let server = tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("service called");
        assert_eq!(request.method(), Method::GET);
        assert!(request
            .uri()
            .path()
            .ends_with("/mutatingwebhookconfigurations/clusterwide-test-policy"));
        send.send_response(json_response(
            StatusCode::NOT_FOUND,
            not_found_body("clusterwide-test-policy"),
        ));
    });

    reconcile_mutating_webhook_configuration_deletion(&ctx, &policy)
        .await
        .expect("absent artifact deletion must succeed");
    server.await.expect("mock server");
}

#[tokio::test]
async fn test_losing_the_deletion_race_succeeds() {
    let (ctx, mut handle) = mock_context();
    let policy = test_policy();

    let existing = generate_validating_webhook_configuration(
        &policy,
        &k8s_openapi::ByteString(b"ca".to_vec()),
        DEPLOYMENTS_NAMESPACE,
        "policy-server-default",
        false,
    );

    let server = tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("get request");
        assert_eq!(request.method(), Method::GET);
        send.send_response(json_response(
            StatusCode::OK,
            Body::from(serde_json::to_vec(&existing).expect("config serializes")),
        ));

        // someone else deleted it between our get and delete
        let (request, send) = handle.next_request().await.expect("delete request");
        assert_eq!(request.method(), Method::DELETE);
        send.send_response(json_response(
            StatusCode::NOT_FOUND,
            not_found_body("clusterwide-test-policy"),
        ));
    });

    reconcile_validating_webhook_configuration_deletion(&ctx, &policy)
        .await
        .expect("losing the race must still be a success");
    server.await.expect("mock server");
}

#[tokio::test]
async fn test_reconcile_applies_with_the_operator_field_manager() {
    let (ctx, mut handle) = mock_context();
    let policy = test_policy();

    let admission_secret = k8s_openapi::api::core::v1::Secret {
        metadata: ObjectMeta {
            name: Some("policy-operator-root-ca".to_string()),
            namespace: Some(DEPLOYMENTS_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(std::collections::BTreeMap::from([(
            "ca.crt".to_string(),
            k8s_openapi::ByteString(b"ca".to_vec()),
        )])),
        ..Default::default()
    };

    let applied = generate_validating_webhook_configuration(
        &policy,
        &k8s_openapi::ByteString(b"ca".to_vec()),
        DEPLOYMENTS_NAMESPACE,
        "policy-server-default",
        false,
    );

    let server = tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("patch request");
        assert_eq!(request.method(), Method::PATCH);
        assert!(request.uri().path().ends_with(
            "/validatingwebhookconfigurations/clusterwide-test-policy"
        ));
        let query = request.uri().query().unwrap_or_default();
        assert!(query.contains("fieldManager=policy-operator"));
        assert_eq!(
            request
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok()),
            Some("application/apply-patch+yaml")
        );
        send.send_response(json_response(
            StatusCode::OK,
            Body::from(serde_json::to_vec(&applied).expect("config serializes")),
        ));
    });

    reconcile_validating_webhook_configuration(
        &ctx,
        &policy,
        &admission_secret,
        "policy-server-default",
    )
    .await
    .expect("apply must succeed");
    server.await.expect("mock server");
}

#[tokio::test]
async fn test_reconcile_without_trust_material_fails() {
    let (ctx, _handle) = mock_context();
    let policy = test_policy();

    let empty_secret = k8s_openapi::api::core::v1::Secret::default();
    let err = reconcile_validating_webhook_configuration(
        &ctx,
        &policy,
        &empty_secret,
        "policy-server-default",
    )
    .await
    .expect_err("missing CA bundle must be an error");
    assert!(err.to_string().contains("ca.crt"));
}

#[test]
fn test_unique_name_keys_the_artifact() {
    let policy = test_policy();
    assert_eq!(policy.unique_name(), "clusterwide-test-policy");
}
