pub mod controller;
pub mod crd;
pub mod expression;
pub mod health;
pub mod resources;
pub mod webhooks;

pub use controller::{
    error_policy, is_policy_server_not_ready, reconcile_admission_policy,
    reconcile_admission_policy_group, reconcile_cluster_admission_policy,
    reconcile_cluster_admission_policy_group, BackoffConfig, Context, Error,
    PolicyServerNotReadyError, Result, WebhookKind, FINALIZER,
};
pub use crd::{
    AdmissionPolicy, AdmissionPolicyGroup, ClusterAdmissionPolicy, ClusterAdmissionPolicyGroup,
    Policy, PolicyGroup,
};
pub use health::{HealthState, Metrics};
pub use webhooks::{
    run_webhook_server, WebhookError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
};

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use serde::de::DeserializeOwned;

/// Run one controller loop for a policy kind until its stream ends.
async fn run_controller_loop<P, ReconcilerFut>(
    kind: &'static str,
    api: Api<P>,
    ctx: Arc<Context>,
    reconciler: impl FnMut(Arc<P>, Arc<Context>) -> ReconcilerFut,
) where
    P: Policy
        + kube::Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static,
    ReconcilerFut: Future<Output = Result<Action>> + Send + 'static,
{
    // Use any_semantic() for more reliable resource discovery in test environments
    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(api, watcher_config)
        .run(reconciler, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled {}: {}", kind, obj.name);
                }
                Err(e) => {
                    // Waiting for a policy server to come up is routine churn,
                    // not an error worth logging as one.
                    let not_ready = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _)
                            if is_policy_server_not_ready(err)
                    );
                    if not_ready {
                        tracing::debug!("{} dependency not ready: {:?}", kind, e);
                    } else {
                        tracing::error!("{} reconciliation error: {:?}", kind, e);
                    }
                }
            }
        })
        .await;

    tracing::error!("{} controller stream ended unexpectedly", kind);
}

/// Run the controllers for all four policy kinds (cluster-wide).
///
/// This is the main control loop that watches policy resources and keeps
/// their webhook configurations in sync. It can be called from main.rs or
/// spawned as a background task during integration tests.
///
/// If health_state is provided, the operator is marked ready once the
/// controllers start.
pub async fn run_controllers(
    client: Client,
    ctx: Arc<Context>,
    health_state: Option<Arc<HealthState>>,
) {
    tracing::info!("Starting controllers for policy resources");

    let ctx = match health_state {
        Some(state) => {
            state.set_ready(true).await;
            Arc::new((*ctx).clone().with_health_state(state))
        }
        None => ctx,
    };

    tokio::join!(
        run_controller_loop(
            "AdmissionPolicy",
            Api::<AdmissionPolicy>::all(client.clone()),
            ctx.clone(),
            reconcile_admission_policy,
        ),
        run_controller_loop(
            "ClusterAdmissionPolicy",
            Api::<ClusterAdmissionPolicy>::all(client.clone()),
            ctx.clone(),
            reconcile_cluster_admission_policy,
        ),
        run_controller_loop(
            "AdmissionPolicyGroup",
            Api::<AdmissionPolicyGroup>::all(client.clone()),
            ctx.clone(),
            reconcile_admission_policy_group,
        ),
        run_controller_loop(
            "ClusterAdmissionPolicyGroup",
            Api::<ClusterAdmissionPolicyGroup>::all(client.clone()),
            ctx.clone(),
            reconcile_cluster_admission_policy_group,
        ),
    );
}
