use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single certificate issuance attempt.
///
/// Produced by the issuer, consumed by the notification channel, never
/// persisted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalResult {
    pub namespace: String,
    pub name: String,
    pub success: bool,
    /// Issuer-provided detail: new expiry on success, reason on failure.
    pub detail: String,
    #[serde(default = "Utc::now")]
    pub completed_at: DateTime<Utc>,
}

impl RenewalResult {
    pub fn succeeded(namespace: &str, name: &str, detail: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            success: true,
            detail: detail.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn failed(namespace: &str, name: &str, detail: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            success: false,
            detail: detail.into(),
            completed_at: Utc::now(),
        }
    }

    /// `"succeeded"` or `"failed"`.
    pub fn status_label(&self) -> &'static str {
        if self.success {
            "succeeded"
        } else {
            "failed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_without_timestamp() {
        let json = r#"{"namespace":"web","name":"shop","success":true,"detail":"renewed"}"#;
        let result: RenewalResult = serde_json::from_str(json).unwrap();
        assert!(result.success);
        assert_eq!(result.status_label(), "succeeded");
    }

    #[test]
    fn failed_label() {
        let result = RenewalResult::failed("web", "shop", "rate limited");
        assert!(!result.success);
        assert_eq!(result.status_label(), "failed");
        assert_eq!(result.detail, "rate limited");
    }
}
