//! Periodic TLS certificate renewal for routing resources.
//!
//! A [`RenewalSupervisor`] repeats scans on a configurable interval. Each
//! scan ([`ScanExecutor`]) enumerates routing resources and hands them one at
//! a time to the [`ResourceEvaluator`], which reads the certificate, applies
//! the expiry policy ([`is_renewal_due`]) and, when due, drives issuance and
//! notification. Settings changes cancel the live cycle through a
//! [`RestartHandle`] and a fresh cycle starts immediately.
//!
//! External systems sit behind the traits in [`collaborators`]; the
//! file-backed store, HTTP issuer and dispatcher-backed notifier in this
//! crate are the production implementations used by `renewal-worker`.

pub mod collaborators;
pub mod error;
pub mod evaluator;
pub mod file_store;
pub mod issuer;
pub mod notifier;
pub mod policy;
pub mod scan;
pub mod settings;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod mock;

pub use collaborators::{CertificateIssuer, ConfigSource, RenewalNotifier, ResourceStore};
pub use error::{RenewalError, Result};
pub use evaluator::{Evaluation, ResourceEvaluator, SkipReason};
pub use file_store::FileResourceStore;
pub use issuer::HttpIssuer;
pub use notifier::DispatchNotifier;
pub use policy::is_renewal_due;
pub use scan::{ScanExecutor, ScanFailure, ScanReport};
pub use settings::{SettingsWatcher, SharedConfig};
pub use supervisor::{RenewalSupervisor, RestartHandle, SupervisorState};
