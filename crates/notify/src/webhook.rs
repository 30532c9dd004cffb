//! HTTP webhook channel.
//!
//! Each renewal outcome is POSTed as a small JSON document:
//!
//! ```json
//! {
//!   "source": "certkeeper",
//!   "text": "<subject>",
//!   "subject": "<subject>",
//!   "body": "<body>",
//!   "resource": "web/shop",
//!   "status": "succeeded",
//!   "metadata": { ... }
//! }
//! ```
//!
//! `text` mirrors the subject so chat-style incoming webhooks render
//! something useful without a custom template.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::traits::{Notification, Notifier, NotifyError, STATUS_METADATA_KEY};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    source: &'static str,
    text: &'a str,
    subject: &'a str,
    body: &'a str,
    resource: Option<&'a str>,
    status: Option<&'a str>,
    metadata: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a Notification> for WebhookPayload<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            source: "certkeeper",
            text: &n.subject,
            subject: &n.subject,
            body: &n.body,
            resource: n.resource(),
            status: n.metadata.get(STATUS_METADATA_KEY).map(String::as_str),
            metadata: &n.metadata,
        }
    }
}

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// `${VAR}` references in `url` are expanded from the environment here,
    /// so a missing variable fails at startup rather than at first delivery.
    pub fn new(url: &str, bearer_token: Option<String>) -> Result<Self, NotifyError> {
        let url = expand_env(url)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NotifyError::Config(format!(
                "webhook url must be http(s): {url}"
            )));
        }
        Ok(Self {
            url,
            bearer_token: bearer_token.filter(|t| !t.is_empty()),
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::from(notification));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.url, %status, "webhook accepted notification");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            channel: "webhook",
            status: status.as_u16(),
            body,
        })
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Replace every `${NAME}` with the value of env var `NAME`.
fn expand_env(input: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            NotifyError::Config(format!("unclosed env var reference in: {input}"))
        })?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("env var not found: {name}")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
