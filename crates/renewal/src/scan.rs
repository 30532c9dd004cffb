//! One full pass over every routing resource.
//!
//! A scan evaluates resources strictly in store order. The first failure
//! ends the pass: it is logged with the resource it happened on, and the
//! remaining resources wait for the next scheduled scan. Cancellation is the
//! only error that escapes to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::collaborators::ResourceStore;
use crate::error::{RenewalError, Result};
use crate::evaluator::{Evaluation, ResourceEvaluator};

/// Source of "now" for expiry comparisons.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Where and why a scan stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    /// `namespace/name`, or `None` when enumeration itself failed.
    pub resource: Option<String>,
    pub error: String,
}

/// Tally of a single scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub listed: usize,
    pub evaluated: usize,
    pub skipped: usize,
    pub not_due: usize,
    pub renewed: usize,
    /// Issuances that ran but reported `success = false`.
    pub unsuccessful: usize,
    pub failure: Option<ScanFailure>,
}

impl ScanReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            started_at,
            listed: 0,
            evaluated: 0,
            skipped: 0,
            not_due: 0,
            renewed: 0,
            unsuccessful: 0,
            failure: None,
        }
    }

    fn record(&mut self, outcome: &Evaluation) {
        self.evaluated += 1;
        match outcome {
            Evaluation::Skipped(_) => self.skipped += 1,
            Evaluation::NotDue { .. } => self.not_due += 1,
            Evaluation::Renewed { success: true } => self.renewed += 1,
            Evaluation::Renewed { success: false } => self.unsuccessful += 1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

struct Interrupted {
    resource: Option<String>,
    error: RenewalError,
}

impl From<RenewalError> for Interrupted {
    fn from(error: RenewalError) -> Self {
        Self {
            resource: None,
            error,
        }
    }
}

/// Runs scans against a store with a [`ResourceEvaluator`].
pub struct ScanExecutor {
    store: Arc<dyn ResourceStore>,
    evaluator: ResourceEvaluator,
    clock: Clock,
}

impl ScanExecutor {
    pub fn new(store: Arc<dyn ResourceStore>, evaluator: ResourceEvaluator) -> Self {
        Self {
            store,
            evaluator,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to pin "now" in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run one scan.
    ///
    /// Returns `Err(RenewalError::Cancelled)` when `cancel` fires before a
    /// resource is picked up. Every other failure is logged and recorded in
    /// [`ScanReport::failure`].
    pub async fn run_scan(&self, cancel: &CancellationToken) -> Result<ScanReport> {
        let mut report = ScanReport::new((self.clock)());
        info!(scan_id = %report.scan_id, "Renewal scan started");

        match self.scan_resources(cancel, &mut report).await {
            Ok(()) => {
                info!(
                    scan_id = %report.scan_id,
                    listed = report.listed,
                    skipped = report.skipped,
                    not_due = report.not_due,
                    renewed = report.renewed,
                    unsuccessful = report.unsuccessful,
                    "Renewal scan finished"
                );
            }
            Err(Interrupted { error, .. }) if error.is_cancelled() => {
                info!(
                    scan_id = %report.scan_id,
                    evaluated = report.evaluated,
                    listed = report.listed,
                    "Renewal scan cancelled"
                );
                return Err(error);
            }
            Err(Interrupted { resource, error }) => {
                error!(
                    scan_id = %report.scan_id,
                    resource = resource.as_deref().unwrap_or("-"),
                    error = %error,
                    evaluated = report.evaluated,
                    listed = report.listed,
                    "Renewal scan aborted"
                );
                report.failure = Some(ScanFailure {
                    resource,
                    error: error.to_string(),
                });
            }
        }

        Ok(report)
    }

    async fn scan_resources(
        &self,
        cancel: &CancellationToken,
        report: &mut ScanReport,
    ) -> std::result::Result<(), Interrupted> {
        let resources = self.store.list_routing_resources().await?;
        report.listed = resources.len();

        for resource in &resources {
            if cancel.is_cancelled() {
                return Err(RenewalError::Cancelled.into());
            }

            let outcome = self
                .evaluator
                .evaluate(resource, (self.clock)(), cancel)
                .await
                .map_err(|error| Interrupted {
                    resource: Some(resource.key()),
                    error,
                })?;
            report.record(&outcome);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{expiry, pem_expiring, MockIssuer, MockNotifier, MockStore};
    use certkeeper_core::{RenewalConfig, RoutingResource, Secret};

    struct Harness {
        store: Arc<MockStore>,
        issuer: Arc<MockIssuer>,
        notifier: Arc<MockNotifier>,
        scanner: ScanExecutor,
    }

    fn harness(store: MockStore) -> Harness {
        let store = Arc::new(store);
        let issuer = Arc::new(MockIssuer::new());
        let notifier = Arc::new(MockNotifier::new());
        let evaluator = ResourceEvaluator::new(
            store.clone(),
            issuer.clone(),
            notifier.clone(),
            Arc::new(RenewalConfig::default()),
        );
        let now = expiry(2030, 5, 20);
        let scanner = ScanExecutor::new(store.clone(), evaluator).with_clock(Arc::new(move || now));
        Harness {
            store,
            issuer,
            notifier,
            scanner,
        }
    }

    /// Resource `web/<name>` with a certificate that expires on 2030-06-01.
    fn due(store: MockStore, name: &str) -> MockStore {
        let secret = format!("{name}-tls");
        store
            .with_resource(RoutingResource::new("web", name).with_secret(secret.as_str()))
            .with_secret(Secret::new("web", secret).with_certificate_pem(pem_expiring(2030, 6, 1)))
    }

    #[tokio::test]
    async fn empty_store_is_a_complete_scan() {
        let h = harness(MockStore::new());
        let report = h.scanner.run_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.listed, 0);
        assert_eq!(report.evaluated, 0);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn evaluates_every_resource_in_order() {
        let store = due(due(MockStore::new(), "a"), "b")
            .with_resource(RoutingResource::new("web", "no-tls"))
            .with_resource(RoutingResource::new("web", "pending").with_secret("pending-tls"))
            .with_resource(RoutingResource::new("web", "fresh").with_secret("fresh-tls"))
            .with_secret(
                Secret::new("web", "fresh-tls").with_certificate_pem(pem_expiring(2031, 1, 1)),
            );
        let h = harness(store);

        let report = h.scanner.run_scan(&CancellationToken::new()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.listed, 5);
        assert_eq!(report.evaluated, 5);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.not_due, 1);
        assert_eq!(report.renewed, 2);
        assert_eq!(h.issuer.issued(), vec!["web/a", "web/b"]);
        assert_eq!(h.notifier.delivered().len(), 2);
    }

    #[tokio::test]
    async fn first_failure_ends_the_scan_and_next_scan_starts_over() {
        let h = harness(due(due(due(MockStore::new(), "a"), "b"), "c"));
        h.issuer.fail_for("web/b");

        let first = h.scanner.run_scan(&CancellationToken::new()).await.unwrap();
        let failure = first.failure.clone().unwrap();
        assert_eq!(failure.resource.as_deref(), Some("web/b"));
        assert!(failure.error.contains("acme order rejected"));
        assert_eq!(first.evaluated, 1);
        assert_eq!(h.issuer.issued(), vec!["web/a", "web/b"]);

        h.issuer.clear_failures();
        let second = h.scanner.run_scan(&CancellationToken::new()).await.unwrap();
        assert!(second.is_complete());
        assert_eq!(second.evaluated, 3);
        assert_ne!(first.scan_id, second.scan_id);
        assert_eq!(
            h.issuer.issued(),
            vec!["web/a", "web/b", "web/a", "web/b", "web/c"]
        );
    }

    #[tokio::test]
    async fn listing_failure_is_recorded_without_resource() {
        let h = harness(due(MockStore::new(), "a"));
        h.store.set_fail_listing(true);

        let report = h.scanner.run_scan(&CancellationToken::new()).await.unwrap();

        let failure = report.failure.unwrap();
        assert_eq!(failure.resource, None);
        assert!(failure.error.contains("api server unavailable"));
        assert!(h.issuer.issued().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_ends_the_scan() {
        let h = harness(due(due(MockStore::new(), "a"), "b"));
        h.notifier.set_failing(true);

        let report = h.scanner.run_scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.failure.unwrap().resource.as_deref(), Some("web/a"));
        assert_eq!(h.issuer.issued(), vec!["web/a"]);
    }

    #[tokio::test]
    async fn cancelled_before_start_evaluates_nothing() {
        let h = harness(due(MockStore::new(), "a"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h.scanner.run_scan(&cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(h.store.secret_lookups(), 0);
        assert!(h.issuer.issued().is_empty());
    }

    #[tokio::test]
    async fn cancellation_during_issuance_finishes_that_resource_only() {
        let h = harness(due(due(MockStore::new(), "a"), "b"));
        let cancel = CancellationToken::new();
        h.issuer.cancel_during_issue(cancel.clone());

        let err = h.scanner.run_scan(&cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(h.issuer.issued(), vec!["web/a"]);
        assert_eq!(h.notifier.delivered().len(), 1);
    }
}
