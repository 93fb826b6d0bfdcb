//! Bearer credential handling.
//!
//! Resolves the bearer token from the [`SessionStore`], attaches it to HTTP
//! requests and to stream URLs (the event-stream transport cannot carry
//! custom headers, so the token travels as a `token` query parameter).

use reqwest::Url;
use serde_json::Value as JsonValue;

use crate::error::{Result, TaskLinkError};
use crate::storage::{SessionStore, TOKEN_KEY};

/// Store keys probed for a token, in order.
const TOKEN_KEYS: [&str; 4] = [TOKEN_KEY, "access_token", "jwt_token", "authToken"];

/// Object fields that may hold the token when it is stored as an object.
const TOKEN_FIELDS: [&str; 4] = ["token", "access_token", "value", "jwt"];

/// Authentication applied to outbound requests.
///
/// # Examples
///
/// ```rust
/// use tasklog_link::AuthProvider;
///
/// let auth = AuthProvider::bearer("eyJhbGc...");
/// assert!(auth.is_authenticated());
///
/// let anonymous = AuthProvider::none();
/// assert!(!anonymous.is_authenticated());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProvider {
    Bearer(String),
    None,
}

impl AuthProvider {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    pub fn none() -> Self {
        Self::None
    }

    /// Read the current token from the store.
    pub fn from_store(store: &dyn SessionStore) -> Result<Self> {
        Ok(match resolve_token(store)? {
            Some(token) => Self::Bearer(token),
            None => Self::None,
        })
    }

    /// Attach `Authorization: Bearer <token>` to a request.
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Bearer(token) => request.bearer_auth(token),
            Self::None => request,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Bearer(token) => Some(token),
            Self::None => None,
        }
    }
}

/// Find the bearer token in the store, probing the usual keys in order.
pub fn resolve_token(store: &dyn SessionStore) -> Result<Option<String>> {
    for key in TOKEN_KEYS {
        if let Some(value) = store.get_item(key)? {
            if let Some(token) = extract_token(&value) {
                return Ok(Some(token));
            }
        }
    }
    Ok(None)
}

/// Extract a usable token from a stored value.
///
/// Accepts a bare string, a string holding a JSON object, or an object with
/// one of `token`, `access_token`, `value` or `jwt`. Empty strings and the
/// literals `"null"` / `"undefined"` count as absent.
pub fn extract_token(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            if s.starts_with('{') {
                return match serde_json::from_str::<JsonValue>(s) {
                    Ok(obj @ JsonValue::Object(_)) => extract_token(&obj),
                    _ => {
                        log::warn!("[tasklog-link] Stored token looks like JSON but does not parse");
                        None
                    },
                };
            }
            usable(s)
        },
        JsonValue::Object(map) => TOKEN_FIELDS
            .iter()
            .filter_map(|field| map.get(*field).and_then(JsonValue::as_str))
            .find_map(usable),
        _ => None,
    }
}

fn usable(s: &str) -> Option<String> {
    match s {
        "" | "null" | "undefined" => None,
        s => Some(s.to_string()),
    }
}

/// Shorten a token for logs: the first six characters and an ellipsis.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    if prefix.len() < token.len() {
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}

/// Render a URL for logs with its `token` query parameter redacted.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let v = if k == "token" { redact_token(&v) } else { v.into_owned() };
                    (k.into_owned(), v)
                })
                .collect();
            if pairs.is_empty() {
                return parsed.to_string();
            }
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
            parsed.to_string()
        },
        Err(_) => url.split('?').next().unwrap_or(url).to_string(),
    }
}

/// Append the bearer token to a stream URL as the `token` query parameter.
///
/// The parameter is always present, empty when there is no token, so the
/// backend answers with 401 rather than with a confusing 400.
pub fn stream_url_with_token(url: &str, token: Option<&str>) -> Result<String> {
    let mut parsed = Url::parse(url)
        .map_err(|e| TaskLinkError::ConfigurationError(format!("Invalid stream URL '{}': {}", url, e)))?;
    parsed.query_pairs_mut().append_pair("token", token.unwrap_or(""));
    Ok(parsed.to_string())
}
