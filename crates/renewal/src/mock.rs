//! In-memory collaborators for scheduler tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use certkeeper_core::{RenewalResult, RoutingResource, Secret};
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{CertificateIssuer, RenewalNotifier, ResourceStore};
use crate::error::{RenewalError, Result};
use crate::supervisor::RestartHandle;

/// Midnight UTC on the given day.
pub fn expiry(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// Self-signed PEM whose `notAfter` is midnight UTC on the given day.
pub fn pem_expiring(year: i32, month: u8, day: u8) -> String {
    let mut params = rcgen::CertificateParams::new(vec!["shop.example.com".to_string()]);
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(year, month, day);
    rcgen::Certificate::from_params(params)
        .unwrap()
        .serialize_pem()
        .unwrap()
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStore {
    resources: Mutex<Vec<RoutingResource>>,
    secrets: Mutex<HashMap<(String, String), Secret>>,
    list_calls: AtomicUsize,
    secret_lookups: AtomicUsize,
    fail_listing: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, resource: RoutingResource) -> Self {
        self.resources.lock().unwrap().push(resource);
        self
    }

    pub fn with_secret(self, secret: Secret) -> Self {
        self.secrets
            .lock()
            .unwrap()
            .insert((secret.namespace.clone(), secret.name.clone()), secret);
        self
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn secret_lookups(&self) -> usize {
        self.secret_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for MockStore {
    async fn list_routing_resources(&self) -> Result<Vec<RoutingResource>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(RenewalError::Store("api server unavailable".to_string()));
        }
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        self.secret_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

// ── Issuer ────────────────────────────────────────────────────

/// Records every issuance as `namespace/name`.
#[derive(Default)]
pub struct MockIssuer {
    issued: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    rejecting: Mutex<HashSet<String>>,
    cancel_on_issue: Mutex<Option<CancellationToken>>,
    restart_on_issue: Mutex<Option<RestartHandle>>,
}

impl MockIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `issue` returns an error for this resource.
    pub fn fail_for(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// `issue` returns an unsuccessful result for this resource.
    pub fn reject_for(&self, key: &str) {
        self.rejecting.lock().unwrap().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Cancel `token` while an issuance is in flight.
    pub fn cancel_during_issue(&self, token: CancellationToken) {
        *self.cancel_on_issue.lock().unwrap() = Some(token);
    }

    /// Request a supervisor restart during the next issuance only.
    pub fn restart_during_next_issue(&self, handle: RestartHandle) {
        *self.restart_on_issue.lock().unwrap() = Some(handle);
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateIssuer for MockIssuer {
    async fn issue(&self, namespace: &str, name: &str) -> Result<RenewalResult> {
        let key = format!("{namespace}/{name}");
        self.issued.lock().unwrap().push(key.clone());

        let cancel = self.cancel_on_issue.lock().unwrap().clone();
        if let Some(token) = cancel {
            token.cancel();
        }
        let restart = self.restart_on_issue.lock().unwrap().take();
        if let Some(handle) = restart {
            handle.request_restart();
        }
        tokio::task::yield_now().await;

        if self.failing.lock().unwrap().contains(&key) {
            return Err(RenewalError::Issuance {
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: "acme order rejected".to_string(),
            });
        }
        if self.rejecting.lock().unwrap().contains(&key) {
            return Ok(RenewalResult::failed(namespace, name, "challenge failed"));
        }
        Ok(RenewalResult::succeeded(namespace, name, "certificate issued"))
    }
}

// ── Notifier ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNotifier {
    delivered: Mutex<Vec<RenewalResult>>,
    failing: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<RenewalResult> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenewalNotifier for MockNotifier {
    async fn notify(&self, _resource: &RoutingResource, result: &RenewalResult) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RenewalError::Notification("all 1 channel(s) failed".to_string()));
        }
        self.delivered.lock().unwrap().push(result.clone());
        Ok(())
    }
}
