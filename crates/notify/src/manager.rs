//! Broadcasts alerts to every configured channel.
//!
//! Channels are built once from the resolved [`NotificationConfig`] and
//! invoked sequentially in `methods` order. A failing channel never stops
//! the broadcast; failures are logged and summarized after the pass.

use std::sync::Arc;

use ponghub_core::{DefaultConfig, NotificationConfig, METHOD_DEFAULT, METHOD_EMAIL, METHOD_WEBHOOK};

use crate::default::{AlertSink, DefaultNotifier, ProcessAlertSink};
use crate::email::EmailNotifier;
use crate::traits::{DispatchResult, Notifier};
use crate::webhook::WebhookNotifier;

/// Owns the active channels and dispatches alerts to all of them.
pub struct NotificationManager {
    channels: Vec<Box<dyn Notifier>>,
    config: Option<NotificationConfig>,
}

impl NotificationManager {
    /// Build channels using real process side effects for the default channel.
    pub fn new(config: Option<NotificationConfig>) -> Self {
        Self::with_sink(config, Arc::new(ProcessAlertSink::default()))
    }

    /// Build channels, routing default-channel side effects through `sink`.
    pub fn with_sink(config: Option<NotificationConfig>, sink: Arc<dyn AlertSink>) -> Self {
        let Some(mut config) = config else {
            tracing::info!("no notification configuration found, using the default channel");
            let config = NotificationConfig::fallback();
            let channel = DefaultNotifier::new(config.default.clone(), sink);
            return Self::from_channels(Some(config), vec![Box::new(channel)]);
        };

        if !config.enabled {
            tracing::debug!("notifications disabled");
            return Self::from_channels(Some(config), Vec::new());
        }

        if config.methods.is_empty() {
            tracing::info!("notifications enabled without methods, using the default channel");
            config.methods = vec![METHOD_DEFAULT.to_string()];
            let default = config.default.get_or_insert(DefaultConfig { enabled: true });
            let channel = DefaultNotifier::new(Some(default.clone()), sink);
            return Self::from_channels(Some(config), vec![Box::new(channel)]);
        }

        let mut channels: Vec<Box<dyn Notifier>> = Vec::with_capacity(config.methods.len());
        for method in config.methods.clone() {
            match method.to_ascii_lowercase().as_str() {
                METHOD_DEFAULT => {
                    let default = config.default.get_or_insert(DefaultConfig { enabled: true });
                    channels.push(Box::new(DefaultNotifier::new(Some(default.clone()), sink.clone())));
                }
                METHOD_EMAIL => match config.email.as_ref() {
                    Some(email) => match EmailNotifier::from_config(email) {
                        Ok(notifier) => channels.push(Box::new(notifier)),
                        Err(e) => tracing::error!(method = %method, error = %e, "skipping email channel"),
                    },
                    None => tracing::warn!(method = %method, "email listed without an email block, skipping"),
                },
                METHOD_WEBHOOK => match config.webhook.clone() {
                    Some(webhook) => match WebhookNotifier::from_config(webhook) {
                        Ok(notifier) => channels.push(Box::new(notifier)),
                        Err(e) => tracing::error!(method = %method, error = %e, "skipping webhook channel"),
                    },
                    None => tracing::warn!(method = %method, "webhook listed without a webhook block, skipping"),
                },
                _ => tracing::warn!(method = %method, "unknown notification method"),
            }
        }

        Self::from_channels(Some(config), channels)
    }

    /// Assemble a manager from already constructed channels.
    pub fn from_channels(config: Option<NotificationConfig>, channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels, config }
    }

    /// Whether any alert would be delivered.
    pub fn is_enabled(&self) -> bool {
        self.config.as_ref().is_some_and(|c| c.enabled) && !self.channels.is_empty()
    }

    /// Names of the active channels in dispatch order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    /// The configuration the channels were built from.
    pub fn config(&self) -> Option<&NotificationConfig> {
        self.config.as_ref()
    }

    /// Send an alert through every channel.
    ///
    /// Never fails: each channel is attempted regardless of earlier failures
    /// and the per-channel outcome is returned for inspection.
    pub async fn send_notification(&self, title: &str, message: &str) -> Vec<DispatchResult> {
        if !self.is_enabled() {
            tracing::debug!("notifications are disabled or no channels are configured");
            return Vec::new();
        }

        tracing::info!(channels = self.channels.len(), "sending notifications");

        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(title, message).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        let failed: Vec<&str> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.channel.as_str())
            .collect();
        if !failed.is_empty() {
            tracing::warn!(failed = %failed.join(", "), "failed to send notifications via some channels");
        }

        results
    }
}

impl std::fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationManager")
            .field("channels", &self.channel_names())
            .field("config", &self.config)
            .finish()
    }
}
