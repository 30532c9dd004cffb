//! [`RenewalNotifier`] over the notification dispatcher.

use async_trait::async_trait;
use certkeeper_core::{RenewalResult, RoutingResource};
use certkeeper_notify::templating::{
    OutcomeContext, ResourceContext, TemplateContext, TemplateRenderer,
};
use certkeeper_notify::{Dispatcher, Notification, RESOURCE_METADATA_KEY, STATUS_METADATA_KEY};
use chrono::Utc;

use crate::collaborators::RenewalNotifier;
use crate::error::{RenewalError, Result};

/// Renders a renewal outcome and fans it out to every configured channel.
///
/// With no channels configured this is a no-op. Delivery counts as failed
/// only when every channel fails.
pub struct DispatchNotifier {
    dispatcher: Dispatcher,
    renderer: TemplateRenderer,
}

impl DispatchNotifier {
    pub fn new(dispatcher: Dispatcher, renderer: TemplateRenderer) -> Self {
        Self {
            dispatcher,
            renderer,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.dispatcher.channel_count()
    }

    fn build_notification(
        &self,
        resource: &RoutingResource,
        result: &RenewalResult,
    ) -> Result<Notification> {
        let ctx = TemplateContext {
            resource: ResourceContext {
                namespace: resource.namespace.clone(),
                name: resource.name.clone(),
                hosts: resource.hosts.clone(),
            },
            outcome: OutcomeContext {
                success: result.success,
                status: result.status_label().to_string(),
                detail: result.detail.clone(),
                completed_at: result.completed_at.to_rfc3339(),
            },
            now: Utc::now().to_rfc3339(),
        };

        let (subject, body) = self
            .renderer
            .render_notification(&ctx)
            .map_err(|e| RenewalError::Notification(e.to_string()))?;

        Ok(Notification::new(subject, body)
            .with_metadata(RESOURCE_METADATA_KEY, resource.key())
            .with_metadata("namespace", resource.namespace.as_str())
            .with_metadata("name", resource.name.as_str())
            .with_metadata(STATUS_METADATA_KEY, result.status_label()))
    }
}

#[async_trait]
impl RenewalNotifier for DispatchNotifier {
    async fn notify(&self, resource: &RoutingResource, result: &RenewalResult) -> Result<()> {
        let notification = self.build_notification(resource, result)?;
        let results = self.dispatcher.dispatch(&notification).await;

        if results.is_empty() || results.iter().any(|r| r.success) {
            return Ok(());
        }

        let errors: Vec<String> = results
            .iter()
            .map(|r| format!("{}: {}", r.channel, r.error.as_deref().unwrap_or("unknown error")))
            .collect();
        Err(RenewalError::Notification(format!(
            "all {} channel(s) failed ({})",
            results.len(),
            errors.join("; ")
        )))
    }
}
