//! Webhook request body construction.
//!
//! Two shapes are supported:
//! - a user template with `{{.Title}}`, `{{.Message}}` and `{{.<field>}}`
//!   placeholders plus resolver tokens, expanded in a single pass;
//! - a JSON envelope (`title`, `message`, `service`) when no template is set.
//!
//! In both cases the resolved `custom_payload.fields` are merged into the
//! top-level JSON object as additional keys. Keys already produced by the
//! template or envelope are kept as they are.

use std::collections::BTreeMap;

use ponghub_core::{ParameterResolver, WebhookConfig};
use serde_json::{Map, Value};

use crate::traits::NotifyError;

/// Service identifier reported in the default envelope.
pub const DEFAULT_SERVICE_NAME: &str = "ponghub";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully resolved request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPayload {
    pub body: String,
    pub content_type: String,
}

/// Build the body for one delivery. Tokens are resolved here, once per call.
pub fn build_payload(
    config: &WebhookConfig,
    resolver: &ParameterResolver,
    title: &str,
    message: &str,
) -> Result<RenderedPayload, NotifyError> {
    let custom = config.custom_payload.as_ref();

    let fields: BTreeMap<String, String> = custom
        .map(|c| {
            c.fields
                .iter()
                .map(|(k, v)| (k.clone(), resolver.resolve_parameters(v)))
                .collect()
        })
        .unwrap_or_default();

    let template = custom
        .and_then(|c| c.template.as_deref())
        .or(config.template.as_deref())
        .filter(|t| !t.trim().is_empty());

    let Some(template) = template else {
        let envelope = default_envelope(config, title, message, &fields);
        let body = serde_json::to_string(&Value::Object(envelope))
            .map_err(|e| NotifyError::Payload(format!("failed to serialize envelope: {e}")))?;
        return Ok(RenderedPayload {
            body,
            content_type: JSON_CONTENT_TYPE.to_string(),
        });
    };

    let content_type = custom
        .and_then(|c| c.content_type.as_deref())
        .or(config.content_type.as_deref())
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or(JSON_CONTENT_TYPE)
        .to_string();
    let json = is_json_content_type(&content_type);

    let body = render_template(template, resolver, title, message, &fields, json);
    let body = if json && !fields.is_empty() {
        merge_fields_into_json(body, &fields)
    } else {
        body
    };

    Ok(RenderedPayload { body, content_type })
}

/// Whether a content type denotes a JSON body (`application/json`,
/// `application/vnd.foo+json; charset=utf-8`, ...).
pub fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == JSON_CONTENT_TYPE || mime.ends_with("+json")
}

fn render_template(
    template: &str,
    resolver: &ParameterResolver,
    title: &str,
    message: &str,
    fields: &BTreeMap<String, String>,
    json: bool,
) -> String {
    let escape = |s: String| if json { json_escape(&s) } else { s };
    let title = resolver.resolve_parameters(title);
    let message = resolver.resolve_parameters(message);

    // Single pass over the template; spliced values are never rescanned.
    resolver.replace_tokens(template, |token| {
        let value = match token.strip_prefix('.') {
            Some("Title") => Some(title.clone()),
            Some("Message") => Some(message.clone()),
            Some(name) => fields.get(name).cloned(),
            None => resolver.evaluate(token),
        };
        value.map(&escape)
    })
}

fn merge_fields_into_json(body: String, fields: &BTreeMap<String, String>) -> String {
    let mut value: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "custom payload is not valid JSON, sending it unchanged");
            return body;
        }
    };

    let Some(object) = value.as_object_mut() else {
        tracing::debug!("custom payload is not a JSON object, fields not merged");
        return body;
    };

    for (name, field_value) in fields {
        object
            .entry(name.clone())
            .or_insert_with(|| Value::String(field_value.clone()));
    }

    serde_json::to_string(&value).unwrap_or(body)
}

fn default_envelope(
    config: &WebhookConfig,
    title: &str,
    message: &str,
    fields: &BTreeMap<String, String>,
) -> Map<String, Value> {
    let mut envelope = Map::new();

    match config.custom_payload.as_ref() {
        Some(c) if c.include_title || c.include_message => {
            if c.include_title {
                let key = non_empty(c.title_field.as_deref()).unwrap_or("title");
                envelope.insert(key.to_string(), Value::String(title.to_string()));
            }
            if c.include_message {
                let key = non_empty(c.message_field.as_deref()).unwrap_or("message");
                envelope.insert(key.to_string(), Value::String(message.to_string()));
            }
        }
        _ => {
            envelope.insert("title".into(), Value::String(title.to_string()));
            envelope.insert("message".into(), Value::String(message.to_string()));
            envelope.insert("service".into(), Value::String(DEFAULT_SERVICE_NAME.to_string()));
        }
    }

    for (name, value) in fields {
        envelope
            .entry(name.clone())
            .or_insert_with(|| Value::String(value.clone()));
    }
    envelope
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// JSON-escape `s` without the surrounding quotes.
fn json_escape(s: &str) -> String {
    let quoted = Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
