//! Request and response interceptors.
//!
//! Request interceptors run in registration order after the bearer token
//! has been attached and may rewrite any part of the outgoing request.
//! Response interceptors run in registration order on the fully-read
//! response and may reject it by returning an error.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::MigrationError;

/// Largest raw body excerpt copied into an error message.
const MAX_ERROR_BODY: usize = 512;

/// A request as seen by interceptors, before it is handed to reqwest.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Header map; later inserts overwrite earlier ones.
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Deadline for the whole exchange.
    pub timeout: Duration,
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lowercase names.
    pub headers: BTreeMap<String, String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body decoded as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body decoded as JSON; an empty body decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Unknown`] if the body is not valid JSON
    /// for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, MigrationError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Hook that can rewrite an outgoing request.
pub trait RequestInterceptor: Send + Sync {
    /// Mutate `request` in place, or abort the call with an error.
    fn on_request(&self, request: &mut RequestConfig) -> Result<(), MigrationError>;
}

/// Hook that can inspect, rewrite or reject a response.
pub trait ResponseInterceptor: Send + Sync {
    /// Inspect `response` for the call described by `request`.
    fn on_response(
        &self,
        request: &RequestConfig,
        response: &mut HttpResponse,
    ) -> Result<(), MigrationError>;
}

/// Adds a fixed set of headers to every request.
#[derive(Debug, Clone, Default)]
pub struct HeaderInterceptor {
    headers: BTreeMap<String, String>,
}

impl HeaderInterceptor {
    /// Start with no headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn on_request(&self, request: &mut RequestConfig) -> Result<(), MigrationError> {
        for (name, value) in &self.headers {
            request.headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Turns non-2xx responses into [`MigrationError::Http`].
///
/// The message is taken from a JSON `message` field, then a JSON `error`
/// field (string or `{ "message": … }`), then the raw body truncated to
/// 512 bytes, and finally the status text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorStatusInterceptor;

impl ResponseInterceptor for ErrorStatusInterceptor {
    fn on_response(
        &self,
        request: &RequestConfig,
        response: &mut HttpResponse,
    ) -> Result<(), MigrationError> {
        if response.is_success() {
            return Ok(());
        }
        let message = error_message(response);
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "non-2xx response"
        );
        Err(MigrationError::http(response.status, message))
    }
}

/// Extract the most useful human message from an error response.
pub fn error_message(response: &HttpResponse) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&response.body) {
        if let Some(Value::String(msg)) = map.get("message") {
            return msg.clone();
        }
        match map.get("error") {
            Some(Value::String(msg)) => return msg.clone(),
            Some(Value::Object(inner)) => {
                if let Some(Value::String(msg)) = inner.get("message") {
                    return msg.clone();
                }
            }
            _ => {}
        }
    }

    let text = response.text();
    let text = text.trim();
    if !text.is_empty() {
        return truncate(text, MAX_ERROR_BODY);
    }

    reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("request failed")
        .to_string()
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestConfig {
        RequestConfig {
            method: Method::GET,
            url: "http://localhost/teams".into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout: Duration::from_secs(1),
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: BTreeMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_success_passes_through() {
        let mut resp = response(204, "");
        assert!(ErrorStatusInterceptor
            .on_response(&request(), &mut resp)
            .is_ok());
    }

    #[test]
    fn test_message_field_is_preferred() {
        let mut resp = response(422, r#"{"message":"name required","error":"bad"}"#);
        let err = ErrorStatusInterceptor
            .on_response(&request(), &mut resp)
            .unwrap_err();
        assert_eq!(err, MigrationError::http(422, "name required"));
    }

    #[test]
    fn test_nested_error_object() {
        let resp = response(500, r#"{"error":{"message":"db down"}}"#);
        assert_eq!(error_message(&resp), "db down");
    }

    #[test]
    fn test_raw_body_is_truncated() {
        let long = "x".repeat(2000);
        let resp = response(502, &long);
        let msg = error_message(&resp);
        assert!(msg.len() <= MAX_ERROR_BODY + '…'.len_utf8());
    }

    #[test]
    fn test_empty_body_uses_status_text() {
        let resp = response(404, "");
        assert_eq!(error_message(&resp), "Not Found");
    }

    #[test]
    fn test_header_interceptor_overwrites() {
        let mut req = request();
        req.headers.insert("X-Client".into(), "old".into());
        HeaderInterceptor::new()
            .with_header("X-Client", "migrator")
            .on_request(&mut req)
            .unwrap();
        assert_eq!(req.headers.get("X-Client").map(String::as_str), Some("migrator"));
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let value: Value = response(200, "").json().unwrap();
        assert!(value.is_null());
    }
}
