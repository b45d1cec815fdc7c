//! Admission webhook server.
//!
//! Provides HTTP endpoints for Kubernetes admission webhooks covering the
//! policy-group resources: a group whose expression or member set is invalid
//! is rejected here, before anything reaches the reconciler.
//!
//! To enable webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a ValidatingWebhookConfiguration for the CRDs
//! 3. Mount the TLS certificate secret to the operator pod at /etc/webhook/certs/
//!
//! The webhook server starts automatically when certificates are present.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::crd::{AdmissionPolicyGroup, ClusterAdmissionPolicyGroup, PolicyGroup};
use crate::webhooks::policies::validate_policy_group;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Shared state for webhook handlers
pub struct WebhookState {
    #[allow(dead_code)]
    pub client: Client,
}

impl WebhookState {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            "/validate-admissionpolicygroup",
            post(validate_admission_policy_group),
        )
        .route(
            "/validate-clusteradmissionpolicygroup",
            post(validate_cluster_admission_policy_group),
        )
        .with_state(state)
}

async fn validate_admission_policy_group(
    State(_state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<AdmissionPolicyGroup>>,
) -> impl IntoResponse {
    review_policy_group(review)
}

async fn validate_cluster_admission_policy_group(
    State(_state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<ClusterAdmissionPolicyGroup>>,
) -> impl IntoResponse {
    review_policy_group(review)
}

/// Shared admission flow for both policy-group kinds.
fn review_policy_group<P>(
    review: AdmissionReview<P>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>)
where
    P: PolicyGroup + Resource<DynamicType = ()> + Clone + DeserializeOwned,
{
    let request: AdmissionRequest<P> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    // DELETE operations are always allowed
    if request.operation == Operation::Delete {
        info!(uid = %uid, "Admission request allowed (DELETE)");
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).into_review()),
        );
    }

    let group: P = match &request.object {
        Some(object) => object.clone(),
        None => {
            error!(uid = %uid, "Missing object in request");
            return (
                StatusCode::OK,
                Json(
                    AdmissionResponse::from(&request)
                        .deny("Missing object in request")
                        .into_review(),
                ),
            );
        }
    };

    let errors = validate_policy_group(&group);
    if !errors.is_empty() {
        let message = errors.aggregate_message();
        warn!(uid = %uid, message = %message, "Admission request denied");
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).deny(message).into_review()),
        );
    }

    info!(uid = %uid, "Admission request allowed");
    (
        StatusCode::OK,
        Json(AdmissionResponse::from(&request).into_review()),
    )
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:9443 and serves the validation endpoints. TLS
/// certificates are loaded from the paths specified.
pub async fn run_webhook_server(
    client: Client,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let state = Arc::new(WebhookState::new(client));
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!(port = WEBHOOK_PORT, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
