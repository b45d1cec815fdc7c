use std::sync::Arc;

use kube::Client;

use crate::health::HealthState;

/// Shared context for the policy controllers.
///
/// The match-conditions feature gate is fixed at construction time; nothing
/// reads ambient global state per reconcile.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Namespace the policy-server infrastructure runs in
    pub deployments_namespace: String,
    /// Whether generated webhooks may carry matchConditions
    pub feature_gate_admission_webhook_match_conditions: bool,
    /// Metrics sink, when the health server is running
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    pub fn new(
        client: Client,
        deployments_namespace: impl Into<String>,
        feature_gate_admission_webhook_match_conditions: bool,
    ) -> Self {
        Self {
            client,
            deployments_namespace: deployments_namespace.into(),
            feature_gate_admission_webhook_match_conditions,
            health_state: None,
        }
    }

    pub fn with_health_state(mut self, health_state: Arc<HealthState>) -> Self {
        self.health_state = Some(health_state);
        self
    }
}
