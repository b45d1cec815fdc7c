//! Error types for the policy controllers

use std::time::Duration;

use thiserror::Error;

/// Side of admission a generated webhook configuration serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookKind {
    Validating,
    Mutating,
}

impl std::fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookKind::Validating => write!(f, "validating"),
            WebhookKind::Mutating => write!(f, "mutating"),
        }
    }
}

/// A policy's backing dependency (its policy server or the trust material it
/// publishes) is not available yet. The caller requeues instead of treating
/// the reconcile as failed.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("policy server not ready: {message}")]
pub struct PolicyServerNotReadyError {
    pub message: String,
}

impl PolicyServerNotReadyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("cannot reconcile {kind} webhook: {source}")]
    ReconcileWebhook {
        kind: WebhookKind,
        #[source]
        source: kube::Error,
    },

    #[error("cannot retrieve {kind} webhook: {source}")]
    RetrieveWebhook {
        kind: WebhookKind,
        #[source]
        source: kube::Error,
    },

    #[error("cannot delete {kind} webhook: {source}")]
    DeleteWebhook {
        kind: WebhookKind,
        #[source]
        source: kube::Error,
    },

    #[error("{0}")]
    PolicyServerNotReady(#[from] PolicyServerNotReadyError),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// True when `err` is, or wraps at any depth, a [`PolicyServerNotReadyError`].
///
/// Classification walks the source chain; it never inspects error strings.
pub fn is_policy_server_not_ready(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<PolicyServerNotReadyError>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Exponential backoff configuration for reconcile requeues
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Initial delay for first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Calculate the backoff delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);

        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        let capped_delay = delay_with_jitter.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_delay)
    }
}
