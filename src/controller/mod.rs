pub mod context;
pub mod error;
pub mod reconciler;
pub mod webhook_reconciler;

pub use context::Context;
pub use error::{
    is_policy_server_not_ready, BackoffConfig, Error, PolicyServerNotReadyError, Result,
    WebhookKind,
};
pub use reconciler::{
    error_policy, reconcile_admission_policy, reconcile_admission_policy_group,
    reconcile_cluster_admission_policy, reconcile_cluster_admission_policy_group, FINALIZER,
};
pub use webhook_reconciler::{
    reconcile_mutating_webhook_configuration, reconcile_mutating_webhook_configuration_deletion,
    reconcile_validating_webhook_configuration,
    reconcile_validating_webhook_configuration_deletion,
};
