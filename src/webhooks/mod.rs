//! Admission webhooks
//!
//! HTTP server and validation policies used when the API server asks this
//! operator to vet policy-group resources.

pub mod policies;
pub mod server;

pub use policies::{validate_policy_group, ErrorList, FieldError, FieldErrorKind};
pub use server::{
    create_webhook_router, run_webhook_server, WebhookError, WebhookState, WEBHOOK_CERT_PATH,
    WEBHOOK_KEY_PATH, WEBHOOK_PORT,
};
