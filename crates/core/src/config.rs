use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::notification::NotificationConfig;
use crate::params::ParameterResolver;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationConfig>,
}

impl Config {
    /// Read and prepare a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::info!(
            path = %path.display(),
            services = config.services.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Parse YAML, resolve endpoint parameters and apply notification defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.resolve_parameters();
        config.apply_notification_defaults();

        if config.services.is_empty() {
            return Err(ConfigError::Validation(
                "no services defined in the configuration".to_string(),
            ));
        }
        Ok(config)
    }

    /// Resolve tokens in every endpoint's URL, body, response regex and
    /// header values. Runs once; the results live in the `parsed_*` fields.
    pub fn resolve_parameters(&mut self) {
        let resolver = ParameterResolver::new();
        for endpoint in self.services.iter_mut().flat_map(|s| s.endpoints.iter_mut()) {
            endpoint.resolve(&resolver);
        }
    }

    /// Fill in the notification block according to the default-channel policy.
    pub fn apply_notification_defaults(&mut self) {
        match self.notifications.as_mut() {
            None => self.notifications = Some(NotificationConfig::fallback()),
            Some(notifications) => notifications.apply_defaults(),
        }
    }
}

// ── Services ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub response_regex: String,

    #[serde(skip)]
    pub parsed_url: String,
    #[serde(skip)]
    pub parsed_body: String,
    #[serde(skip)]
    pub parsed_headers: HashMap<String, String>,
    #[serde(skip)]
    pub parsed_response_regex: String,
}

impl EndpointConfig {
    fn resolve(&mut self, resolver: &ParameterResolver) {
        self.parsed_url = resolver.resolve_parameters(&self.url);
        self.parsed_body = resolver.resolve_parameters(&self.body);
        self.parsed_response_regex = resolver.resolve_parameters(&self.response_regex);
        self.parsed_headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), resolver.resolve_parameters(v)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::DefaultConfig;

    const SERVICES_YAML: &str = r#"
services:
  - name: api
    endpoints:
      - url: "https://{{env(PONGHUB_CONFIG_TEST_HOST)}}/health?n={{rand(3,3)}}"
        body: '{"id":"{{uuid}}"}'
        headers:
          X-Request-Id: "req-{{uuid_short}}"
          X-Static: plain
        response_regex: "ok-{{rand(1,1)}}"
"#;

    #[test]
    fn endpoints_are_resolved_at_load() {
        std::env::set_var("PONGHUB_CONFIG_TEST_HOST", "status.example.com");
        let cfg = Config::from_yaml_str(SERVICES_YAML).unwrap();
        std::env::remove_var("PONGHUB_CONFIG_TEST_HOST");

        let ep = &cfg.services[0].endpoints[0];
        assert_eq!(ep.parsed_url, "https://status.example.com/health?n=3");
        assert_eq!(ep.parsed_response_regex, "ok-1");
        assert_eq!(ep.parsed_headers["X-Static"], "plain");
        assert_eq!(ep.parsed_headers["X-Request-Id"].len(), "req-".len() + 8);
        assert!(!ep.parsed_body.contains("{{uuid}}"));
        // Raw values are kept for display.
        assert!(ep.url.contains("{{env(PONGHUB_CONFIG_TEST_HOST)}}"));
    }

    #[test]
    fn missing_notifications_fall_back_to_default_channel() {
        let cfg = Config::from_yaml_str(SERVICES_YAML).unwrap();
        let n = cfg.notifications.unwrap();
        assert!(n.enabled);
        assert_eq!(n.methods, vec!["default".to_string()]);
        assert_eq!(n.default, Some(DefaultConfig { enabled: true }));
    }

    #[test]
    fn webhook_only_disables_implicit_default() {
        let yaml = format!(
            "{SERVICES_YAML}\nnotifications:\n  enabled: true\n  methods: [webhook]\n  webhook:\n    url: http://localhost/hook\n"
        );
        let cfg = Config::from_yaml_str(&yaml).unwrap();
        let n = cfg.notifications.unwrap();
        assert_eq!(n.default, Some(DefaultConfig { enabled: false }));
        assert_eq!(n.webhook.unwrap().url, "http://localhost/hook");
    }

    #[test]
    fn empty_services_is_a_validation_error() {
        let err = Config::from_yaml_str("services: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = Config::from_yaml_str("services: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "services:\n  - name: web\n    endpoints:\n      - url: https://example.com\n").unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.services[0].name, "web");
        assert_eq!(cfg.services[0].endpoints[0].parsed_url, "https://example.com");
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let err = Config::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "got {err:?}");
    }
}
