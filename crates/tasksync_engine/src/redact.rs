//! Secret redaction for error messages, logs and reports.

use regex::Regex;
use std::sync::OnceLock;

const REDACTED: &str = "[redacted]";

fn bearer_regex() -> &'static Regex {
    static BEARER: OnceLock<Regex> = OnceLock::new();
    BEARER.get_or_init(|| {
        Regex::new(r"(?i)Bearer\s+[A-Za-z0-9\-._~+/=]+").expect("Valid regex pattern")
    })
}

fn token_field_regex() -> &'static Regex {
    static TOKEN_FIELD: OnceLock<Regex> = OnceLock::new();
    TOKEN_FIELD.get_or_init(|| {
        Regex::new(r#"(?i)"(token|jwt)"\s*:\s*"[^"]*""#).expect("Valid regex pattern")
    })
}

/// Removes credentials from free text.
///
/// Configured secrets are replaced verbatim, bearer tokens and JSON
/// `"token"`/`"jwt"` string fields are replaced by pattern.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Creates a redactor for the given secrets. Empty secrets are ignored.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        // Longest first so a secret containing another is not half-replaced.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Self { secrets }
    }

    /// Adds a secret.
    pub fn with_secret(self, secret: impl Into<String>) -> Self {
        let mut all = self.secrets;
        all.push(secret.into());
        Self::new(all)
    }

    /// Returns `text` with all known credentials replaced.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), REDACTED);
        }
        let out = bearer_regex().replace_all(&out, "Bearer [redacted]");
        token_field_regex()
            .replace_all(&out, r#""${1}":"[redacted]""#)
            .into_owned()
    }
}
