//! Notification channels for certificate renewal results.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Email (SMTP) and webhook notifier implementations
//! - Minijinja template rendering for renewal messages
//! - Dispatcher that fans a notification out to every configured channel

pub mod dispatcher;
pub mod email;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use email::{EmailNotifier, SmtpSettings};
pub use traits::{
    DispatchResult, Notification, Notifier, NotifyError, RESOURCE_METADATA_KEY, STATUS_METADATA_KEY,
};
pub use webhook::WebhookNotifier;
