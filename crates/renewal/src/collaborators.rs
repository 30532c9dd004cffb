//! Seams between the scheduler and the systems it drives.
//!
//! The scheduler only sequences calls across these traits; the cluster API,
//! the issuance protocol and the notification transport live behind them.

use async_trait::async_trait;
use certkeeper_core::{RenewalConfig, RenewalResult, RoutingResource, Secret};

use crate::error::Result;

/// Read access to routing resources and their secrets.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// All routing resources, in store order. May be empty.
    async fn list_routing_resources(&self) -> Result<Vec<RoutingResource>>;

    /// `Ok(None)` when the secret does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;
}

/// Obtains a fresh certificate for a routing resource.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, namespace: &str, name: &str) -> Result<RenewalResult>;
}

/// Reports the outcome of an issuance attempt.
#[async_trait]
pub trait RenewalNotifier: Send + Sync {
    async fn notify(&self, resource: &RoutingResource, result: &RenewalResult) -> Result<()>;
}

/// Current renewal policy. Read on every use, never cached by callers.
pub trait ConfigSource: Send + Sync {
    fn renewal_config(&self) -> RenewalConfig;
}

/// A fixed policy, for one-shot runs and tests.
impl ConfigSource for RenewalConfig {
    fn renewal_config(&self) -> RenewalConfig {
        *self
    }
}
