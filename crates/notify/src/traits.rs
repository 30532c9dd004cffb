//! Channel contract shared by every notification transport.

use std::collections::BTreeMap;

/// Metadata key carrying the `namespace/name` of the renewed resource.
pub const RESOURCE_METADATA_KEY: &str = "resource";

/// Metadata key carrying `"succeeded"` / `"failed"`.
pub const STATUS_METADATA_KEY: &str = "status";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote end answered, but not with success.
    #[error("{channel} rejected notification with {status}: {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A rendered message, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    /// Flat string labels; ordered so serialized payloads are stable.
    pub metadata: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `namespace/name` of the resource this is about, if tagged.
    pub fn resource(&self) -> Option<&str> {
        self.metadata.get(RESOURCE_METADATA_KEY).map(String::as_str)
    }
}

/// A delivery channel (email, webhook, ...).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Deliver a canned message to prove the channel is wired up.
    async fn test(&self) -> Result<(), NotifyError> {
        let probe = Notification::new(
            "[certkeeper] test notification",
            "Channel check from the certkeeper renewal worker. No action needed.",
        )
        .with_metadata("event", "test");
        self.send(&probe).await
    }

    fn channel_name(&self) -> &str;
}

/// Outcome of one channel for one notification.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel: String,
    pub resource: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_tags_resource() {
        let n = Notification::new("renewed", "ok")
            .with_metadata(RESOURCE_METADATA_KEY, "web/shop")
            .with_metadata(STATUS_METADATA_KEY, "succeeded");
        assert_eq!(n.resource(), Some("web/shop"));
        assert_eq!(n.metadata[STATUS_METADATA_KEY], "succeeded");
    }

    #[test]
    fn untagged_notification_has_no_resource() {
        assert_eq!(Notification::new("s", "b").resource(), None);
    }

    #[test]
    fn rejected_error_names_channel_and_status() {
        let err = NotifyError::Rejected {
            channel: "webhook",
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "webhook rejected notification with 502: bad gateway"
        );
    }
}
