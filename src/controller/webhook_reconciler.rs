//! Sub-reconciler for intercepting-webhook configuration objects.
//!
//! Synchronizes the cluster-global webhook configuration keyed by a policy's
//! unique name against the policy's declared intent. Apply goes through
//! server-side apply with a stable field manager, so re-applying unchanged
//! content mutates nothing; conflicting concurrent writers surface as apply
//! errors rather than silent overwrites.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::Api;
use tracing::debug;

use crate::controller::context::Context;
use crate::controller::error::{Error, Result, WebhookKind};
use crate::crd::Policy;
use crate::resources::common::{CA_CERT_KEY, FIELD_MANAGER};
use crate::resources::webhook_configuration;

fn ca_bundle(admission_secret: &Secret) -> Result<ByteString> {
    admission_secret
        .data
        .as_ref()
        .and_then(|data| data.get(CA_CERT_KEY))
        .cloned()
        .ok_or(Error::MissingObjectKey(CA_CERT_KEY))
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

pub async fn reconcile_validating_webhook_configuration(
    ctx: &Context,
    policy: &dyn Policy,
    admission_secret: &Secret,
    policy_server_service_name: &str,
) -> Result<()> {
    let ca_bundle = ca_bundle(admission_secret)?;
    let desired = webhook_configuration::generate_validating_webhook_configuration(
        policy,
        &ca_bundle,
        &ctx.deployments_namespace,
        policy_server_service_name,
        ctx.feature_gate_admission_webhook_match_conditions,
    );

    let api: Api<ValidatingWebhookConfiguration> = Api::all(ctx.client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    api.patch(&policy.unique_name(), &params, &Patch::Apply(&desired))
        .await
        .map_err(|source| Error::ReconcileWebhook {
            kind: WebhookKind::Validating,
            source,
        })?;

    debug!("Applied ValidatingWebhookConfiguration: {}", policy.unique_name());
    Ok(())
}

pub async fn reconcile_validating_webhook_configuration_deletion(
    ctx: &Context,
    policy: &dyn Policy,
) -> Result<()> {
    let api: Api<ValidatingWebhookConfiguration> = Api::all(ctx.client.clone());
    let name = policy.unique_name();

    match api.get(&name).await {
        Ok(_) => {
            if let Err(err) = api.delete(&name, &DeleteParams::default()).await {
                // a concurrent deletion winning the race is still a success
                if !is_not_found(&err) {
                    return Err(Error::DeleteWebhook {
                        kind: WebhookKind::Validating,
                        source: err,
                    });
                }
            }
            debug!("Deleted ValidatingWebhookConfiguration: {}", name);
            Ok(())
        }
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(Error::RetrieveWebhook {
            kind: WebhookKind::Validating,
            source: err,
        }),
    }
}

pub async fn reconcile_mutating_webhook_configuration(
    ctx: &Context,
    policy: &dyn Policy,
    admission_secret: &Secret,
    policy_server_service_name: &str,
) -> Result<()> {
    let ca_bundle = ca_bundle(admission_secret)?;
    let desired = webhook_configuration::generate_mutating_webhook_configuration(
        policy,
        &ca_bundle,
        &ctx.deployments_namespace,
        policy_server_service_name,
        ctx.feature_gate_admission_webhook_match_conditions,
    );

    let api: Api<MutatingWebhookConfiguration> = Api::all(ctx.client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    api.patch(&policy.unique_name(), &params, &Patch::Apply(&desired))
        .await
        .map_err(|source| Error::ReconcileWebhook {
            kind: WebhookKind::Mutating,
            source,
        })?;

    debug!("Applied MutatingWebhookConfiguration: {}", policy.unique_name());
    Ok(())
}

pub async fn reconcile_mutating_webhook_configuration_deletion(
    ctx: &Context,
    policy: &dyn Policy,
) -> Result<()> {
    let api: Api<MutatingWebhookConfiguration> = Api::all(ctx.client.clone());
    let name = policy.unique_name();

    match api.get(&name).await {
        Ok(_) => {
            if let Err(err) = api.delete(&name, &DeleteParams::default()).await {
                // a concurrent deletion winning the race is still a success
                if !is_not_found(&err) {
                    return Err(Error::DeleteWebhook {
                        kind: WebhookKind::Mutating,
                        source: err,
                    });
                }
            }
            debug!("Deleted MutatingWebhookConfiguration: {}", name);
            Ok(())
        }
        Err(err) if is_not_found(&err) => Ok(()),
        Err(err) => Err(Error::RetrieveWebhook {
            kind: WebhookKind::Mutating,
            source: err,
        }),
    }
}
