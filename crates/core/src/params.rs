//! Dynamic parameter resolution for configuration strings.
//!
//! Strings may embed `{{...}}` tokens that are computed at resolution time:
//!
//! | Token            | Value                                          |
//! |------------------|------------------------------------------------|
//! | `{{env(NAME)}}`  | environment variable `NAME`, empty when unset  |
//! | `{{uuid}}`       | fresh v4 UUID, hyphenated                      |
//! | `{{uuid_short}}` | first 8 hex characters of a fresh UUID         |
//! | `{{rand(a,b)}}`  | uniform integer in `[a, b]`                    |
//! | `{{%Y-%m-%d}}`   | local time formatted with a strftime pattern   |
//!
//! Resolution is a single left-to-right pass. Anything that is not a
//! recognized token (including `{{.Title}}` style placeholders and
//! malformed tokens) is copied through verbatim.

use std::fmt::Write as _;
use std::sync::OnceLock;

use chrono::format::{Item, StrftimeItems};
use rand::Rng;
use regex::{Captures, Regex};

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("token pattern is valid"))
}

/// Resolves `{{...}}` tokens in configuration strings.
///
/// Stateless: every call reads the environment, clock and RNG afresh, so two
/// `{{uuid}}` occurrences never share a value. Safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterResolver {
    _private: (),
}

impl ParameterResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Replace every recognized token in `raw`.
    ///
    /// Never fails: unknown or malformed tokens are left untouched.
    pub fn resolve_parameters(&self, raw: &str) -> String {
        self.replace_tokens(raw, |token| self.evaluate(token))
    }

    /// Evaluate a single token body such as `uuid` or `env(HOME)`.
    ///
    /// `None` means the token is not recognized and should stay verbatim.
    pub fn evaluate(&self, token: &str) -> Option<String> {
        evaluate_token(token)
    }

    /// Scan `raw` once, handing every `{{...}}` body to `replace`.
    ///
    /// A `Some` answer is spliced in and never rescanned; `None` keeps the
    /// token as written. Callers use this to layer their own placeholders
    /// over the built-in tokens or to post-process resolved values.
    pub fn replace_tokens<F>(&self, raw: &str, mut replace: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        if !raw.contains("{{") {
            return raw.to_string();
        }

        token_regex()
            .replace_all(raw, |caps: &Captures<'_>| {
                replace(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Convenience wrapper around [`ParameterResolver::resolve_parameters`].
pub fn resolve_parameters(raw: &str) -> String {
    ParameterResolver::new().resolve_parameters(raw)
}

/// Evaluate the body of one token. `None` means "leave it as written".
fn evaluate_token(token: &str) -> Option<String> {
    match token {
        "uuid" => return Some(uuid::Uuid::new_v4().to_string()),
        "uuid_short" => {
            let simple = uuid::Uuid::new_v4().simple().to_string();
            return Some(simple[..8].to_string());
        }
        _ => {}
    }

    if let Some(name) = call_argument(token, "env") {
        return Some(env_value(name));
    }

    if let Some(args) = call_argument(token, "rand") {
        return random_in_range(args);
    }

    if token.starts_with('%') {
        return format_now(token);
    }

    None
}

/// Extract `ARGS` from `name(ARGS)`.
fn call_argument<'a>(token: &'a str, name: &str) -> Option<&'a str> {
    token
        .strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn env_value(name: &str) -> String {
    match std::env::var(name.trim()) {
        Ok(val) => val,
        Err(_) => {
            tracing::debug!(var = %name, "environment variable not set, resolving to empty string");
            String::new()
        }
    }
}

fn random_in_range(args: &str) -> Option<String> {
    let (min, max) = args.split_once(',')?;
    let min: i64 = min.trim().parse().ok()?;
    let max: i64 = max.trim().parse().ok()?;
    if min > max {
        tracing::warn!(min, max, "rand() range is inverted, leaving token unresolved");
        return None;
    }
    Some(rand::thread_rng().gen_range(min..=max).to_string())
}

fn format_now(pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }

    let mut out = String::new();
    write!(out, "{}", chrono::Local::now().format_with_items(items.into_iter())).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_canonical_uuid(s: &str) -> bool {
        s.len() == 36 && uuid::Uuid::parse_str(s).is_ok() && s.chars().filter(|c| *c == '-').count() == 4
    }

    #[test]
    fn plain_text_is_unchanged() {
        let r = ParameterResolver::new();
        for input in ["", "https://example.com/health", "a { b } c", "{single}", "}} {{"] {
            assert_eq!(r.resolve_parameters(input), input);
        }
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let r = ParameterResolver::new();
        assert_eq!(r.resolve_parameters("{{.Title}}"), "{{.Title}}");
        assert_eq!(r.resolve_parameters("x {{nope}} y"), "x {{nope}} y");
        assert_eq!(r.resolve_parameters("{{env(UNCLOSED}}"), "{{env(UNCLOSED}}");
        assert_eq!(r.resolve_parameters("{{ uuid }}"), "{{ uuid }}");
    }

    #[test]
    fn rand_with_equal_bounds() {
        assert_eq!(resolve_parameters("{{rand(1,1)}}"), "1");
        assert_eq!(resolve_parameters("n={{rand( -3 , -3 )}}"), "n=-3");
    }

    #[test]
    fn rand_inverted_range_is_left_verbatim() {
        assert_eq!(resolve_parameters("{{rand(5,1)}}"), "{{rand(5,1)}}");
    }

    #[test]
    fn rand_malformed_is_left_verbatim() {
        assert_eq!(resolve_parameters("{{rand(a,b)}}"), "{{rand(a,b)}}");
        assert_eq!(resolve_parameters("{{rand(7)}}"), "{{rand(7)}}");
    }

    #[test]
    fn rand_stays_within_bounds() {
        for _ in 0..200 {
            let n: i64 = resolve_parameters("{{rand(10,20)}}").parse().unwrap();
            assert!((10..=20).contains(&n), "out of range: {n}");
        }
    }

    #[test]
    fn uuid_tokens_are_fresh_per_occurrence() {
        let out = resolve_parameters("{{uuid}} {{uuid}}");
        let (a, b) = out.split_once(' ').unwrap();
        assert!(is_canonical_uuid(a), "got {a}");
        assert!(is_canonical_uuid(b), "got {b}");
        assert_ne!(a, b);

        let again = resolve_parameters("{{uuid}}");
        assert_ne!(again, a);
    }

    #[test]
    fn uuid_short_is_eight_hex_chars() {
        let out = resolve_parameters("{{uuid_short}}");
        assert_eq!(out.len(), 8);
        assert!(out.chars().all(|c| c.is_ascii_hexdigit()), "got {out}");
    }

    #[test]
    fn env_set_and_unset() {
        std::env::set_var("PONGHUB_PARAMS_TEST_SECRET", "p@ss w0rd!$&{}");
        assert_eq!(
            resolve_parameters("Bearer {{env(PONGHUB_PARAMS_TEST_SECRET)}}"),
            "Bearer p@ss w0rd!$&{}"
        );
        std::env::remove_var("PONGHUB_PARAMS_TEST_SECRET");

        assert_eq!(resolve_parameters("[{{env(PONGHUB_PARAMS_DEFINITELY_UNSET)}}]"), "[]");
    }

    #[test]
    fn resolved_values_are_not_re_expanded() {
        std::env::set_var("PONGHUB_PARAMS_TEST_NESTED", "{{uuid}}");
        assert_eq!(resolve_parameters("{{env(PONGHUB_PARAMS_TEST_NESTED)}}"), "{{uuid}}");
        std::env::remove_var("PONGHUB_PARAMS_TEST_NESTED");
    }

    #[test]
    fn date_pattern_formats_local_time() {
        let out = resolve_parameters("day={{%Y-%m-%d}}");
        let date = out.strip_prefix("day=").unwrap();
        assert!(chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok(), "got {out}");
    }

    #[test]
    fn invalid_date_pattern_is_left_verbatim() {
        assert_eq!(resolve_parameters("{{%Q%}}"), "{{%Q%}}");
    }

    #[test]
    fn mixed_tokens_in_one_string() {
        std::env::set_var("PONGHUB_PARAMS_TEST_HOST", "api.example.com");
        let out = resolve_parameters("https://{{env(PONGHUB_PARAMS_TEST_HOST)}}/v{{rand(2,2)}}?id={{.Id}}");
        assert_eq!(out, "https://api.example.com/v2?id={{.Id}}");
        std::env::remove_var("PONGHUB_PARAMS_TEST_HOST");
    }

    #[test]
    fn replace_tokens_layers_custom_placeholders() {
        std::env::set_var("PONGHUB_PARAMS_TEST_QUOTE", "a\"b");
        let r = ParameterResolver::new();
        let out = r.replace_tokens("{{.name}}|{{env(PONGHUB_PARAMS_TEST_QUOTE)}}|{{.other}}", |token| {
            match token {
                ".name" => Some("{{uuid}}".to_string()),
                _ => r.evaluate(token).map(|v| v.replace('"', "\\\"")),
            }
        });
        assert_eq!(out, "{{uuid}}|a\\\"b|{{.other}}");
        std::env::remove_var("PONGHUB_PARAMS_TEST_QUOTE");
    }
}
