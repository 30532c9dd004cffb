//! Per-resource renewal evaluation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use certkeeper_core::RoutingResource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collaborators::{CertificateIssuer, ConfigSource, RenewalNotifier, ResourceStore};
use crate::error::{RenewalError, Result};
use crate::policy::is_renewal_due;

/// Why a resource was not looked at further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The resource declares no TLS secret.
    NoSecretReference,
    /// The declared secret does not exist (yet).
    SecretNotFound { secret: String },
}

/// What evaluating one resource led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Skipped(SkipReason),
    NotDue { not_after: DateTime<Utc> },
    /// Issuance ran and the result was handed to the notifier.
    Renewed { success: bool },
}

/// Resolves a resource's certificate and drives issuance when it is due.
///
/// Failures from certificate parsing, issuance and notification are returned
/// unchanged; isolating them is the scan executor's job.
pub struct ResourceEvaluator {
    store: Arc<dyn ResourceStore>,
    issuer: Arc<dyn CertificateIssuer>,
    notifier: Arc<dyn RenewalNotifier>,
    config: Arc<dyn ConfigSource>,
}

impl ResourceEvaluator {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        issuer: Arc<dyn CertificateIssuer>,
        notifier: Arc<dyn RenewalNotifier>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            store,
            issuer,
            notifier,
            config,
        }
    }

    /// Evaluate one resource at instant `now`.
    ///
    /// Cancellation is checked once the certificate is known to be due and
    /// before issuance starts; an issuance already running is never
    /// interrupted.
    pub async fn evaluate(
        &self,
        resource: &RoutingResource,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Evaluation> {
        let Some(secret_name) = resource.secret_name.as_deref().filter(|s| !s.is_empty()) else {
            info!(resource = %resource, "no TLS secret declared, skipping");
            return Ok(Evaluation::Skipped(SkipReason::NoSecretReference));
        };

        let Some(secret) = self.store.get_secret(&resource.namespace, secret_name).await? else {
            info!(resource = %resource, secret = %secret_name, "TLS secret not found, skipping");
            return Ok(Evaluation::Skipped(SkipReason::SecretNotFound {
                secret: secret_name.to_string(),
            }));
        };

        let certificate = secret.extract_certificate()?;
        let threshold = self.config.renewal_config().renewal_threshold();

        if !is_renewal_due(certificate.not_after, now, threshold) {
            debug!(
                resource = %resource,
                not_after = %certificate.not_after,
                days_remaining = certificate.days_remaining(now),
                "certificate not due for renewal"
            );
            return Ok(Evaluation::NotDue {
                not_after: certificate.not_after,
            });
        }

        if cancel.is_cancelled() {
            return Err(RenewalError::Cancelled);
        }

        info!(
            resource = %resource,
            not_after = %certificate.not_after,
            days_remaining = certificate.days_remaining(now),
            "certificate due for renewal, requesting issuance"
        );

        let result = self.issuer.issue(&resource.namespace, &resource.name).await?;
        info!(
            resource = %resource,
            status = result.status_label(),
            detail = %result.detail,
            "issuance finished"
        );

        self.notifier.notify(resource, &result).await?;

        Ok(Evaluation::Renewed {
            success: result.success,
        })
    }
}
