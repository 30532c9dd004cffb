//! Error type for the renewal scheduler and its collaborators.

use certkeeper_core::CoreError;

/// Errors raised while scanning, evaluating, issuing or notifying.
#[derive(Debug, thiserror::Error)]
pub enum RenewalError {
    /// The live cancellation signal fired. A restart trigger, not a failure.
    #[error("renewal cycle cancelled")]
    Cancelled,

    /// The resource store could not list resources or fetch a secret.
    #[error("resource store error: {0}")]
    Store(String),

    /// Secret material could not be turned into a certificate.
    #[error("certificate error: {0}")]
    Certificate(#[from] CoreError),

    #[error("issuance failed for {namespace}/{name}: {reason}")]
    Issuance {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("invalid settings: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("settings watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl RenewalError {
    /// `true` for the expected restart signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenewalError::Cancelled)
    }
}

/// Result alias for renewal operations.
pub type Result<T> = std::result::Result<T, RenewalError>;
