//! REST transport client.
//!
//! ## Responsibility
//! Send authenticated JSON requests to the REST backend, run interceptors,
//! normalise every failure into a [`MigrationError`], stream NDJSON bodies
//! chunk by chunk and probe backend health.
//!
//! ## Guarantees
//! - Every request carries `Authorization: Bearer <token>` when a
//!   [`TokenManager`] is installed
//! - No request outlives its timeout; request timeouts surface as
//!   `NETWORK_ERROR`, stream timeouts as `STREAM_ERROR`
//! - After cancellation is observed no further `on_chunk` call happens and
//!   the connection is dropped
//!
//! ## NOT Responsible For
//! - Retrying (the router falls back to the other backend instead)
//! - Choosing which backend to call

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::auth::{StaticTokenSource, TokenManager, TokenSource};
use super::interceptor::{
    ErrorStatusInterceptor, HeaderInterceptor, HttpResponse, RequestConfig, RequestInterceptor,
    ResponseInterceptor,
};
use super::stream::{LineDecoder, StreamChunk, StreamOutcome};
use crate::config::{MigratorConfig, RestConfig};
use crate::MigrationError;

/// Per-call request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method, `GET` by default.
    pub method: Method,
    /// Extra headers for this call only.
    pub headers: BTreeMap<String, String>,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// A `GET` without body.
    pub fn get() -> Self {
        Self::default()
    }

    /// A request with the given method and JSON body.
    pub fn with_body(method: Method, body: Value) -> Self {
        Self {
            method,
            body: Some(body),
            ..Self::default()
        }
    }

    /// A `POST` with a JSON body.
    pub fn post(body: Value) -> Self {
        Self::with_body(Method::POST, body)
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a per-call header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Per-call stream options.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Setting the receiver to `true` stops delivery.
    pub cancel: Option<watch::Receiver<bool>>,
    /// Overrides the client's whole-stream timeout.
    pub timeout: Option<Duration>,
}

impl StreamOptions {
    /// Options cancelled through `cancel`.
    pub fn cancellable(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
            timeout: None,
        }
    }

    /// Set the per-call stream timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client for the REST backend.
///
/// ## Example
///
/// ```no_run
/// use backend_migrator::transport::{HttpClient, RequestOptions};
///
/// # async fn demo() -> Result<(), backend_migrator::MigrationError> {
/// let client = HttpClient::new("https://api.example.com");
/// let teams: serde_json::Value = client.request_json("/teams", RequestOptions::get()).await?;
/// # Ok(()) }
/// ```
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Option<Arc<TokenManager>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    timeout: Duration,
    stream_timeout: Duration,
    health_path: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.tokens.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpClient {
    /// Create a client for `base_url` with default timeouts and the
    /// [`ErrorStatusInterceptor`] installed.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: None,
            request_interceptors: Vec::new(),
            response_interceptors: vec![Arc::new(ErrorStatusInterceptor)],
            timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(120),
            health_path: "/health".to_string(),
        }
    }

    /// Create a client from the `[rest]` config section.
    pub fn from_config(config: &RestConfig) -> Self {
        Self::new(config.base_url.clone())
            .with_timeout(Duration::from_millis(config.timeout_ms))
            .with_stream_timeout(Duration::from_millis(config.stream_timeout_ms))
            .with_health_path(config.health_path.clone())
    }

    /// Create an authenticated client from the whole configuration.
    ///
    /// Tokens come from `source`, or from `auth.client_secret` used as an
    /// API key when no source is given; `auth.refresh_skew_s` sets the
    /// expiry skew. A configured `auth.client_id` is sent as `X-Client-Id`.
    pub fn from_migrator_config(
        config: &MigratorConfig,
        source: Option<Arc<dyn TokenSource>>,
    ) -> Self {
        let mut client = Self::from_config(&config.rest);
        let source = source.or_else(|| {
            StaticTokenSource::from_config(&config.auth)
                .map(|s| Arc::new(s) as Arc<dyn TokenSource>)
        });
        if let Some(source) = source {
            client = client.with_token_manager(Arc::new(TokenManager::from_config(
                source,
                &config.auth,
            )));
        }
        if let Some(client_id) = &config.auth.client_id {
            client = client.with_request_interceptor(Arc::new(
                HeaderInterceptor::new().with_header("X-Client-Id", client_id.clone()),
            ));
        }
        client
    }

    /// Attach bearer tokens from `tokens` to every request.
    pub fn with_token_manager(mut self, tokens: Arc<TokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Append a request interceptor.
    pub fn with_request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Append a response interceptor.
    pub fn with_response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    /// Set the default request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the whole-stream timeout.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set the health probe path.
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// The normalised base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request and read the whole response.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Network`] on connect failure or timeout
    /// - [`MigrationError::Http`] for non-2xx statuses (via the default
    ///   interceptor)
    /// - whatever a token refresh or interceptor returns
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, MigrationError> {
        let timeout = options.timeout.unwrap_or(self.timeout);
        let config = self.prepare(path, options, timeout).await?;

        let response = self
            .send(&config)
            .await
            .map_err(|e| network_error(&config, &e))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| network_error(&config, &e))?
            .to_vec();

        let mut response = HttpResponse {
            status,
            headers,
            body,
        };
        self.run_response_interceptors(&config, &mut response)?;
        debug!(method = %config.method, url = %config.url, status, "request completed");
        Ok(response)
    }

    /// Send one request and decode the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request), plus [`MigrationError::Unknown`]
    /// when the body does not decode.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, MigrationError> {
        self.request(path, options).await?.json()
    }

    /// `POST` `body` to `path` and deliver each NDJSON record to `on_chunk`.
    ///
    /// Setting the `options.cancel` receiver to `true` stops delivery and
    /// drops the connection; the call then resolves to
    /// [`StreamOutcome::Cancelled`]. `options.timeout` bounds the whole
    /// stream, falling back to the client's stream timeout.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Stream`] when the connection fails, a read
    ///   fails or the stream timeout elapses
    /// - [`MigrationError::Http`] for a non-2xx status
    pub async fn stream<F>(
        &self,
        path: &str,
        body: Value,
        mut on_chunk: F,
        options: StreamOptions,
    ) -> Result<StreamOutcome, MigrationError>
    where
        F: FnMut(StreamChunk) + Send,
    {
        let StreamOptions {
            mut cancel,
            timeout,
        } = options;
        let timeout = timeout.unwrap_or(self.stream_timeout);
        let request = RequestOptions::post(body).header("Accept", "application/x-ndjson");
        let config = self.prepare(path, request, timeout).await?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut response = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => {
                debug!(url = %config.url, "stream cancelled before response");
                return Ok(StreamOutcome::Cancelled { chunks: 0 });
            }
            _ = &mut deadline => {
                warn!(url = %config.url, "stream timed out before response");
                return Err(MigrationError::stream(format!(
                    "stream timed out after {}ms",
                    timeout.as_millis()
                )));
            }
            sent = self.send(&config) => sent.map_err(|e| stream_error(&config, &e))?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .unwrap_or_default();
            let mut failed = HttpResponse {
                status,
                headers,
                body,
            };
            self.run_response_interceptors(&config, &mut failed)?;
            return Err(MigrationError::http(status, "stream request rejected"));
        }

        let mut decoder = LineDecoder::new();
        let mut delivered = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancel) => {
                    debug!(url = %config.url, delivered, "stream cancelled");
                    return Ok(StreamOutcome::Cancelled { chunks: delivered });
                }
                _ = &mut deadline => {
                    warn!(url = %config.url, delivered, "stream timed out");
                    return Err(MigrationError::stream(format!(
                        "stream timed out after {}ms",
                        timeout.as_millis()
                    )));
                }
                next = response.chunk() => next,
            };

            match next {
                Ok(Some(bytes)) => {
                    for chunk in decoder.push(&bytes) {
                        if is_cancelled(&cancel) {
                            return Ok(StreamOutcome::Cancelled { chunks: delivered });
                        }
                        on_chunk(chunk);
                        delivered += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(stream_error(&config, &e)),
            }
        }

        if let Some(chunk) = decoder.finish() {
            if is_cancelled(&cancel) {
                return Ok(StreamOutcome::Cancelled { chunks: delivered });
            }
            on_chunk(chunk);
            delivered += 1;
        }

        debug!(url = %config.url, delivered, "stream completed");
        Ok(StreamOutcome::Completed { chunks: delivered })
    }

    /// Probe the health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::HealthCheckFailed`] for any transport
    /// failure or non-2xx answer.
    pub async fn health_check(&self) -> Result<(), MigrationError> {
        let url = format!("{}{}", self.base_url, self.health_path);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MigrationError::HealthCheckFailed {
                status: 0,
                message: format!("health probe to {url} failed: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(MigrationError::HealthCheckFailed {
                status: status.as_u16(),
                message: format!("health probe to {url} returned {status}"),
            })
        }
    }

    // ── internals ──────────────────────────────────────────────────────

    async fn prepare(
        &self,
        path: &str,
        options: RequestOptions,
        timeout: Duration,
    ) -> Result<RequestConfig, MigrationError> {
        let mut headers = BTreeMap::new();
        if let Some(tokens) = &self.tokens {
            let token = tokens.get_auth_token().await?;
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        headers.extend(options.headers);

        let mut config = RequestConfig {
            method: options.method,
            url: self.url_for(path),
            query: options.query,
            headers,
            body: options.body,
            timeout,
        };
        for interceptor in &self.request_interceptors {
            interceptor.on_request(&mut config)?;
        }
        Ok(config)
    }

    async fn send(&self, config: &RequestConfig) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .http
            .request(config.method.clone(), &config.url)
            .timeout(config.timeout);
        for (name, value) in &config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !config.query.is_empty() {
            builder = builder.query(&config.query);
        }
        if let Some(body) = &config.body {
            builder = builder.json(body);
        }
        builder.send().await
    }

    fn run_response_interceptors(
        &self,
        config: &RequestConfig,
        response: &mut HttpResponse,
    ) -> Result<(), MigrationError> {
        for interceptor in &self.response_interceptors {
            interceptor.on_response(config, response)?;
        }
        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

fn network_error(config: &RequestConfig, err: &reqwest::Error) -> MigrationError {
    if err.is_timeout() {
        MigrationError::network(format!(
            "{} {} timed out after {}ms",
            config.method,
            config.url,
            config.timeout.as_millis()
        ))
    } else {
        MigrationError::network(format!("{} {} failed: {err}", config.method, config.url))
    }
}

fn stream_error(config: &RequestConfig, err: &reqwest::Error) -> MigrationError {
    if err.is_timeout() {
        MigrationError::stream(format!(
            "stream {} timed out after {}ms",
            config.url,
            config.timeout.as_millis()
        ))
    } else {
        MigrationError::stream(format!("stream {} failed: {err}", config.url))
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolve once the cancel flag is `true`; never resolves without a
/// receiver or after the sender is gone.
async fn wait_cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => loop {
            let flagged = *rx.borrow_and_update();
            if flagged {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending::<()>().await,
    }
}
