//! Unit tests for error classification
//!
//! The not-ready classification must survive arbitrary wrapping and never
//! rely on message strings.

use policy_operator::controller::{
    is_policy_server_not_ready, Error, PolicyServerNotReadyError, WebhookKind,
};

/// An opaque wrapper another layer might put around our errors.
#[derive(Debug)]
struct WrappedError {
    source: Box<dyn std::error::Error + 'static>,
}

impl std::fmt::Display for WrappedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "this is a wrapped error: {}", self.source)
    }
}

impl std::error::Error for WrappedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[test]
fn test_raw_error_is_classified() {
    let err = PolicyServerNotReadyError::new("waiting");
    assert!(is_policy_server_not_ready(&err));
}

#[test]
fn test_wrapped_error_is_classified() {
    let err = Error::PolicyServerNotReady(PolicyServerNotReadyError::new("waiting"));
    assert!(is_policy_server_not_ready(&err));
}

#[test]
fn test_deeply_wrapped_error_is_classified() {
    let inner = Error::PolicyServerNotReady(PolicyServerNotReadyError::new("waiting"));
    let wrapped = WrappedError {
        source: Box::new(inner),
    };
    let doubly_wrapped = WrappedError {
        source: Box::new(wrapped),
    };
    assert!(is_policy_server_not_ready(&doubly_wrapped));
}

#[test]
fn test_unrelated_error_is_not_classified() {
    let err = std::io::Error::new(std::io::ErrorKind::Other, "this is a generic error");
    assert!(!is_policy_server_not_ready(&err));

    let err = Error::MissingObjectKey("ca.crt");
    assert!(!is_policy_server_not_ready(&err));
}

#[test]
fn test_unrelated_wrapped_error_is_not_classified() {
    let wrapped = WrappedError {
        source: Box::new(std::io::Error::new(std::io::ErrorKind::Other, "generic")),
    };
    assert!(!is_policy_server_not_ready(&wrapped));
}

#[test]
fn test_not_ready_message_is_preserved() {
    let err = Error::from(PolicyServerNotReadyError::new("policy server default has no ready replicas"));
    assert_eq!(
        err.to_string(),
        "policy server not ready: policy server default has no ready replicas"
    );
}

fn store_error() -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "Operation cannot be fulfilled".to_string(),
        reason: "Conflict".to_string(),
        code: 409,
    })
}

#[test]
fn test_stage_specific_wrapping_messages() {
    let err = Error::ReconcileWebhook {
        kind: WebhookKind::Validating,
        source: store_error(),
    };
    assert!(err
        .to_string()
        .starts_with("cannot reconcile validating webhook"));

    let err = Error::DeleteWebhook {
        kind: WebhookKind::Mutating,
        source: store_error(),
    };
    assert!(err.to_string().starts_with("cannot delete mutating webhook"));
}
