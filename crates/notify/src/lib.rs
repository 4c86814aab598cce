//! Alert dispatch for ponghub.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Default (stderr + flag file), webhook and email notifier implementations
//! - Webhook payload construction with custom templates and parameter tokens
//! - `NotificationManager` that broadcasts alerts to every configured channel

pub mod default;
pub mod email;
pub mod manager;
pub mod payload;
pub mod traits;
pub mod webhook;

pub use default::{AlertSink, DefaultNotifier, ProcessAlertSink};
pub use email::EmailNotifier;
pub use manager::NotificationManager;
pub use traits::{DispatchResult, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
