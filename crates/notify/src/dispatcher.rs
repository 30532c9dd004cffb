//! Fans a notification out to every configured channel.
//!
//! Channels are tried in registration order and one failing channel never
//! stops the others. What an all-channels failure means is up to the caller.

use std::time::Instant;

use crate::traits::{DispatchResult, Notification, Notifier, NotifyError};

#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// No channels; every dispatch is a no-op.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Box<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    /// One result per channel, in channel order.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        let resource = notification.resource().unwrap_or("-");
        if self.channels.is_empty() {
            tracing::debug!(resource, "no notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            results.push(deliver(channel.as_ref(), notification, resource).await);
        }
        results
    }

    /// Probe every channel with [`Notifier::test`]; the first failure wins.
    pub async fn test_all(&self) -> Result<usize, NotifyError> {
        for channel in &self.channels {
            if let Err(e) = channel.test().await {
                return Err(NotifyError::Config(format!(
                    "channel '{}' failed: {e}",
                    channel.channel_name()
                )));
            }
            tracing::info!(channel = channel.channel_name(), "test notification delivered");
        }
        Ok(self.channels.len())
    }
}

async fn deliver(
    channel: &dyn Notifier,
    notification: &Notification,
    resource: &str,
) -> DispatchResult {
    let name = channel.channel_name();
    let started = Instant::now();
    let outcome = channel.send(notification).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let error = match outcome {
        Ok(()) => {
            tracing::info!(resource, channel = name, duration_ms, "notification delivered");
            None
        }
        Err(e) => {
            tracing::warn!(resource, channel = name, error = %e, duration_ms, "notification delivery failed");
            Some(e.to_string())
        }
    };

    DispatchResult {
        channel: name.to_string(),
        resource: resource.to_string(),
        success: error.is_none(),
        error,
        duration_ms,
    }
}
