//! Notification configuration: channel selection plus per-channel settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Channel names accepted in `methods`.
pub const METHOD_DEFAULT: &str = "default";
pub const METHOD_EMAIL: &str = "email";
pub const METHOD_WEBHOOK: &str = "webhook";

/// Top-level notification settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Ordered channel names (case-insensitive). Duplicates dispatch twice.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
}

impl NotificationConfig {
    /// Configuration used when none was supplied: the default channel only.
    pub fn fallback() -> Self {
        Self {
            enabled: true,
            methods: vec![METHOD_DEFAULT.to_string()],
            default: Some(DefaultConfig { enabled: true }),
            email: None,
            webhook: None,
        }
    }

    /// Whether `method` is listed in `methods` (case-insensitive).
    pub fn lists_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Apply the default-channel auto-enable policy.
    ///
    /// Without a `default` block the channel is enabled unless a real channel
    /// (`email`/`webhook`) is listed. Listing `default` explicitly always
    /// forces it on.
    pub fn apply_defaults(&mut self) {
        let has_real_channel = self.lists_method(METHOD_EMAIL) || self.lists_method(METHOD_WEBHOOK);
        let default_listed = self.lists_method(METHOD_DEFAULT);

        let default = self.default.get_or_insert(DefaultConfig {
            enabled: !has_real_channel,
        });

        if default_listed {
            default.enabled = true;
        }
    }
}

/// Settings for the always-available stderr/flag-file channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// SMTP email settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default)]
    pub smtp_port: u16,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Implicit TLS (SMTPS, usually port 465).
    #[serde(default)]
    pub use_tls: bool,
    /// Upgrade a plain connection with STARTTLS.
    #[serde(default)]
    pub use_starttls: bool,
    #[serde(default)]
    pub skip_verify: bool,
}

/// Generic HTTP webhook settings.
///
/// `Debug` masks `auth_token` and `auth_password`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// HTTP method, `POST` when empty.
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Shorthand for `custom_payload.template`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_payload: Option<CustomPayloadConfig>,
    /// `bearer`, `basic`, `header`, or empty for none.
    #[serde(default)]
    pub auth_type: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub auth_username: String,
    #[serde(default)]
    pub auth_password: String,
    /// Header name used by the custom-header auth type.
    #[serde(default)]
    pub auth_header: String,
    /// Additional attempts after the first failure.
    #[serde(default)]
    pub retries: u32,
    /// Per-attempt timeout in seconds, 0 for the default.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("template", &self.template)
            .field("content_type", &self.content_type)
            .field("custom_payload", &self.custom_payload)
            .field("auth_type", &self.auth_type)
            .field("auth_token", &redacted(&self.auth_token))
            .field("auth_username", &self.auth_username)
            .field("auth_password", &redacted(&self.auth_password))
            .field("auth_header", &self.auth_header)
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

/// User-authored webhook payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomPayloadConfig {
    /// Body template with `{{.Title}}`, `{{.Message}}`, `{{.<field>}}`
    /// placeholders and parameter tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Extra top-level values; each value may contain parameter tokens.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    #[serde(default)]
    pub include_title: bool,
    #[serde(default)]
    pub include_message: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_field: Option<String>,
}
