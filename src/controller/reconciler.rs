//! Reconciliation logic for policy resources
//!
//! One generic reconcile core drives all four policy kinds through the
//! [`Policy`] capability set; the per-kind entry points only differ in how
//! they construct the `Api` handle. The control loop serializes invocations
//! per object identity, so the core assumes no concurrent writer for the
//! same unique name.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::controller::context::Context;
use crate::controller::error::{
    is_policy_server_not_ready, BackoffConfig, Error, PolicyServerNotReadyError, Result,
};
use crate::controller::webhook_reconciler::{
    reconcile_mutating_webhook_configuration, reconcile_mutating_webhook_configuration_deletion,
    reconcile_validating_webhook_configuration,
    reconcile_validating_webhook_configuration_deletion,
};
use crate::crd::{
    AdmissionPolicy, AdmissionPolicyGroup, ClusterAdmissionPolicy, ClusterAdmissionPolicyGroup,
    Policy, PolicyPhase,
};
use crate::resources::common::{FIELD_MANAGER, ROOT_CA_SECRET_NAME};
use crate::resources::naming;

/// Finalizer name for cleanup of generated webhook configurations
pub const FINALIZER: &str = "policies.example.com/finalizer";

/// Requeue interval after a successful reconcile
const REQUEUE_AFTER: Duration = Duration::from_secs(300);

/// Requeue interval while a policy's dependencies are not ready yet
const NOT_READY_REQUEUE_AFTER: Duration = Duration::from_secs(5);

fn default_backoff() -> BackoffConfig {
    BackoffConfig::default()
}

pub async fn reconcile_admission_policy(
    policy: Arc<AdmissionPolicy>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let namespace = Policy::namespace(policy.as_ref()).unwrap_or_default();
    let api: Api<AdmissionPolicy> = Api::namespaced(ctx.client.clone(), &namespace);
    reconcile_policy(api, policy, ctx).await
}

pub async fn reconcile_cluster_admission_policy(
    policy: Arc<ClusterAdmissionPolicy>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let api: Api<ClusterAdmissionPolicy> = Api::all(ctx.client.clone());
    reconcile_policy(api, policy, ctx).await
}

pub async fn reconcile_admission_policy_group(
    policy: Arc<AdmissionPolicyGroup>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let namespace = Policy::namespace(policy.as_ref()).unwrap_or_default();
    let api: Api<AdmissionPolicyGroup> = Api::namespaced(ctx.client.clone(), &namespace);
    reconcile_policy(api, policy, ctx).await
}

pub async fn reconcile_cluster_admission_policy_group(
    policy: Arc<ClusterAdmissionPolicyGroup>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let api: Api<ClusterAdmissionPolicyGroup> = Api::all(ctx.client.clone());
    reconcile_policy(api, policy, ctx).await
}

/// Shared reconcile core for every policy kind.
async fn reconcile_policy<P>(api: Api<P>, policy: Arc<P>, ctx: Arc<Context>) -> Result<Action>
where
    P: Policy + Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    let start = std::time::Instant::now();
    let name = policy.name();
    info!("Reconciling policy: {}", name);

    // Handle deletion
    if policy.meta().deletion_timestamp.is_some() {
        return handle_deletion(api, policy, ctx).await;
    }

    // Ensure finalizer is present
    if !has_finalizer(policy.as_ref()) {
        add_finalizer(&api, &name).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    // The webhook configuration routes live traffic to the policy server;
    // installing it before the server can answer would make admission fail
    // or hang depending on the failure policy.
    let policy_server = policy.policy_server();
    let service_name = naming::policy_server_deployment_name(policy_server);
    let deployments: Api<Deployment> =
        Api::namespaced(ctx.client.clone(), &ctx.deployments_namespace);
    let ready_replicas = deployments
        .get_opt(&service_name)
        .await?
        .and_then(|deployment| deployment.status)
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);
    if ready_replicas == 0 {
        return Err(Error::PolicyServerNotReady(PolicyServerNotReadyError::new(
            format!("policy server {} has no ready replicas", policy_server),
        )));
    }

    // Trust material published by the certificate collaborator
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), &ctx.deployments_namespace);
    let admission_secret = secrets.get_opt(ROOT_CA_SECRET_NAME).await?.ok_or_else(|| {
        PolicyServerNotReadyError::new(format!(
            "root CA secret {} is not available yet",
            ROOT_CA_SECRET_NAME
        ))
    })?;

    if policy.is_mutating() {
        reconcile_mutating_webhook_configuration(
            &ctx,
            policy.as_ref(),
            &admission_secret,
            &service_name,
        )
        .await?;
        // a policy that switched sides must not leave its old artifact behind
        reconcile_validating_webhook_configuration_deletion(&ctx, policy.as_ref()).await?;
    } else {
        reconcile_validating_webhook_configuration(
            &ctx,
            policy.as_ref(),
            &admission_secret,
            &service_name,
        )
        .await?;
        reconcile_mutating_webhook_configuration_deletion(&ctx, policy.as_ref()).await?;
    }

    set_phase(&api, &name, PolicyPhase::Active).await?;

    if let Some(health) = &ctx.health_state {
        health.metrics.record_reconcile(
            P::kind(&()).as_ref(),
            &name,
            start.elapsed().as_secs_f64(),
        );
    }

    Ok(Action::requeue(REQUEUE_AFTER))
}

/// Error policy for the policy controllers.
///
/// A dependency that is not ready yet gets a short fixed requeue; everything
/// else backs off.
pub fn error_policy<P>(policy: Arc<P>, error: &Error, ctx: Arc<Context>) -> Action
where
    P: Policy + Resource<DynamicType = ()>,
{
    let name = policy.name();

    if is_policy_server_not_ready(error) {
        info!(
            "Policy server for {} not ready yet, requeuing in {:?}",
            name, NOT_READY_REQUEUE_AFTER
        );
        return Action::requeue(NOT_READY_REQUEUE_AFTER);
    }

    if let Some(health) = &ctx.health_state {
        health.metrics.record_error(P::kind(&()).as_ref(), &name);
    }

    let delay = default_backoff().delay_for_attempt(0);
    warn!(
        "Reconciliation of {} failed: {}, requeuing in {:?}",
        name, error, delay
    );
    Action::requeue(delay)
}

/// Handle deletion of a policy: remove both artifact kinds, then release the
/// finalizer. Each removal tolerates an already-absent artifact.
async fn handle_deletion<P>(api: Api<P>, policy: Arc<P>, ctx: Arc<Context>) -> Result<Action>
where
    P: Policy + Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    let name = policy.name();
    info!("Handling deletion of policy: {}", name);

    reconcile_validating_webhook_configuration_deletion(&ctx, policy.as_ref()).await?;
    reconcile_mutating_webhook_configuration_deletion(&ctx, policy.as_ref()).await?;

    if has_finalizer(policy.as_ref()) {
        remove_finalizer(&api, &name).await?;
    }

    Ok(Action::await_change())
}

fn has_finalizer<P>(policy: &P) -> bool
where
    P: Resource<DynamicType = ()>,
{
    policy
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.contains(&FINALIZER.to_string()))
}

async fn add_finalizer<P>(api: &Api<P>, name: &str) -> Result<()>
where
    P: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": [FINALIZER]
        }
    });

    api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await?;

    info!("Added finalizer to {}", name);
    Ok(())
}

async fn remove_finalizer<P>(api: &Api<P>, name: &str) -> Result<()>
where
    P: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": null
        }
    });

    api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await?;

    info!("Removed finalizer from {}", name);
    Ok(())
}

async fn set_phase<P>(api: &Api<P>, name: &str, phase: PolicyPhase) -> Result<()>
where
    P: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    let status = serde_json::json!({
        "status": {
            "phase": phase
        }
    });

    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&status))
        .await?;

    Ok(())
}
