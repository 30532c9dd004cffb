//! HTTP client for the certificate issuance service.

use std::time::Duration;

use async_trait::async_trait;
use certkeeper_core::config::IssuerConfig;
use certkeeper_core::RenewalResult;
use serde::Serialize;
use tracing::debug;

use crate::collaborators::CertificateIssuer;
use crate::error::{RenewalError, Result};

/// Path appended to the configured base URL.
pub const ISSUE_PATH: &str = "/v1/certificates";

#[derive(Debug, Serialize)]
struct IssueRequest<'a> {
    namespace: &'a str,
    name: &'a str,
}

/// Requests certificates with `POST {base}/v1/certificates`.
///
/// A 2xx response carries a [`RenewalResult`] as JSON, which may itself
/// report `success: false`. Transport errors and non-2xx statuses are
/// [`RenewalError::Issuance`].
#[derive(Debug, Clone)]
pub struct HttpIssuer {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpIssuer {
    pub fn new(config: &IssuerConfig) -> Result<Self> {
        let base = config.url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RenewalError::Config(format!(
                "issuer url must be http(s): {}",
                config.url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RenewalError::Config(format!("failed to build issuer client: {e}")))?;

        Ok(Self {
            endpoint: format!("{base}{ISSUE_PATH}"),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CertificateIssuer for HttpIssuer {
    async fn issue(&self, namespace: &str, name: &str) -> Result<RenewalResult> {
        let failure = |reason: String| RenewalError::Issuance {
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason,
        };

        debug!(endpoint = %self.endpoint, namespace, name, "requesting certificate");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&IssueRequest { namespace, name })
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(failure(format!("issuer returned {status}: {body}")));
        }

        response
            .json::<RenewalResult>()
            .await
            .map_err(|e| failure(format!("invalid issuer response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> IssuerConfig {
        IssuerConfig {
            url: url.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let issuer = HttpIssuer::new(&config("https://issuer.internal:8443/")).unwrap();
        assert_eq!(issuer.endpoint(), "https://issuer.internal:8443/v1/certificates");
    }

    #[test]
    fn rejects_non_http_url() {
        let err = HttpIssuer::new(&config("issuer.internal")).unwrap_err();
        assert!(matches!(err, RenewalError::Config(_)));
    }

    #[test]
    fn request_body_names_resource() {
        let body = serde_json::to_value(IssueRequest {
            namespace: "web",
            name: "shop",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"namespace": "web", "name": "shop"}));
    }

    #[tokio::test]
    async fn unreachable_issuer_is_issuance_error() {
        let issuer = HttpIssuer::new(&config("http://127.0.0.1:9")).unwrap();
        let err = issuer.issue("web", "shop").await.unwrap_err();
        match err {
            RenewalError::Issuance {
                namespace, name, ..
            } => {
                assert_eq!(namespace, "web");
                assert_eq!(name, "shop");
            }
            other => panic!("expected issuance error, got {other}"),
        }
    }
}
