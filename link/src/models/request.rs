use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Description of one outbound call, handed to the request gateway.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Absolute URL or a path relative to the API prefix.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    /// Per-request budget; the client default applies when `None`.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: JsonValue) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// Standard response envelope of the backend API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: JsonValue,
}

/// A successful (2xx, non-expiry) response as returned by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    /// Parsed body; `Null` when the body was empty or not JSON.
    pub body: JsonValue,
    /// Raw body text.
    pub raw: String,
}

impl GatewayResponse {
    pub(crate) fn new(status: u16, raw: String) -> Self {
        let body = serde_json::from_str(&raw).unwrap_or(JsonValue::Null);
        Self { status, body, raw }
    }

    /// Body interpreted as the `{code, message, data}` envelope.
    pub fn envelope(&self) -> Option<ApiEnvelope> {
        match &self.body {
            JsonValue::Object(map) if map.contains_key("code") || map.contains_key("data") => {
                serde_json::from_value(self.body.clone()).ok()
            },
            _ => None,
        }
    }

    /// Application-level code carried in the body, if any.
    pub fn body_code(&self) -> Option<i64> {
        self.body.get("code").and_then(JsonValue::as_i64)
    }

    pub fn body_message(&self) -> Option<String> {
        self.body
            .get("message")
            .or_else(|| self.body.get("msg"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }
}
