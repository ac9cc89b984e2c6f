//! # backend-migrator
//!
//! Incremental, per-operation migration from a legacy SDK backend to a REST
//! backend over Tokio.
//!
//! ## Architecture
//!
//! ```text
//! caller → MigrationRouter → SwitchRegistry lookup → BackendAdapter → HttpClient → network
//!                                  ↑                      ↑
//!                     AbTestController        PerformanceComparator (offline)
//!
//! MigrationPlanner (offline, static source analysis)
//! ```
//!
//! Every operation (an entity or a function) is routed independently, so a
//! single operation can be moved to REST, compared, A/B tested and rolled
//! back without touching the others.

// ── Lint policy ────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod backend;
pub mod compare;
pub mod config;
pub mod experiment;
pub mod metrics;
pub mod planner;
pub mod registry;
pub mod routing;
pub mod transport;

// Re-exports for convenience
pub use backend::{BackendAdapter, LegacyAdapter, LegacySdk, OperationResult, RestAdapter};
pub use compare::{ComparisonReport, PerformanceComparator};
pub use experiment::{AbTestController, ExperimentOptions, ExperimentVerdict, MetricKind};
pub use planner::{ComponentAnalysis, MigrationPlan, MigrationPlanner};
pub use registry::{SwitchRecord, SwitchRegistry};
pub use routing::{ExecuteOptions, MigrationRouter, RouterError};
pub use transport::{HttpClient, StreamChunk, StreamOptions, TokenManager, TokenSource};

/// Initialise the global tracing subscriber with the default
/// observability settings.
///
/// See [`init_tracing_with`].
///
/// # Errors
///
/// Returns [`MigrationError::Unknown`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), MigrationError> {
    init_tracing_with(&config::ObservabilityConfig::default())
}

/// Initialise the global tracing subscriber from `[observability]`.
///
/// The `LOG_FORMAT` environment variable (`json` or `pretty`) overrides
/// `log_format`:
/// - `json`: structured JSON output for log aggregators
/// - `pretty`: human-readable output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`). Logs go
/// to stderr so stdout stays free for command output.
///
/// # Errors
///
/// Returns [`MigrationError::Unknown`] if the global subscriber has already
/// been set.
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing_with(config: &config::ObservabilityConfig) -> Result<(), MigrationError> {
    let env = std::env::var("LOG_FORMAT").ok();
    let result = match resolve_log_format(env.as_deref(), &config.log_format) {
        config::LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .try_init(),
        config::LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init(),
    };

    result.map_err(|e| MigrationError::unknown(format!("tracing init failed: {e}")))
}

fn resolve_log_format(env: Option<&str>, configured: &config::LogFormat) -> config::LogFormat {
    match env.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("json") => config::LogFormat::Json,
        Some(v) if v.eq_ignore_ascii_case("pretty") => config::LogFormat::Pretty,
        _ => configured.clone(),
    }
}

// ── Error taxonomy ─────────────────────────────────────────────────────────

/// Machine-readable error code carried by every [`MigrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Transport failure before any response arrived (includes timeouts).
    NetworkError,
    /// Non-2xx response.
    HttpError,
    /// Failure while reading or decoding a chunked response.
    StreamError,
    /// The backend health probe failed.
    HealthCheckFailed,
    /// Anything not covered by the codes above.
    UnknownError,
}

impl ErrorCode {
    /// The wire representation, e.g. `"NETWORK_ERROR"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::StreamError => "STREAM_ERROR",
            Self::HealthCheckFailed => "HEALTH_CHECK_FAILED",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for everything that touches a backend.
///
/// Every variant exposes a machine-readable [`ErrorCode`], a human message
/// and an HTTP status (`0` when no response was involved). The type is
/// `Clone` so a single refresh failure can be handed to every task awaiting
/// the same in-flight token refresh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    /// Transport failure before a response: DNS, connect, reset, timeout.
    #[error("network error: {message}")]
    Network {
        /// Human-readable description.
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message decoded from the error body, or the raw body.
        message: String,
    },

    /// Failure while reading or decoding a streamed body.
    #[error("stream error: {message}")]
    Stream {
        /// Human-readable description.
        message: String,
    },

    /// The backend health probe did not return a healthy answer.
    #[error("health check failed: {message}")]
    HealthCheckFailed {
        /// HTTP status of the probe, `0` if it never got a response.
        status: u16,
        /// Human-readable description.
        message: String,
    },

    /// Catch-all for errors outside the taxonomy.
    #[error("{message}")]
    Unknown {
        /// Human-readable description.
        message: String,
    },
}

impl MigrationError {
    /// Build a [`MigrationError::Network`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Build a [`MigrationError::Http`].
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Build a [`MigrationError::Stream`].
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Build a [`MigrationError::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error.
    ///
    /// Errors that already belong to the taxonomy pass through unchanged;
    /// everything else becomes [`MigrationError::Unknown`].
    pub fn wrap(err: &(dyn std::error::Error + 'static)) -> Self {
        match err.downcast_ref::<MigrationError>() {
            Some(known) => known.clone(),
            None => Self::unknown(err.to_string()),
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network { .. } => ErrorCode::NetworkError,
            Self::Http { .. } => ErrorCode::HttpError,
            Self::Stream { .. } => ErrorCode::StreamError,
            Self::HealthCheckFailed { .. } => ErrorCode::HealthCheckFailed,
            Self::Unknown { .. } => ErrorCode::UnknownError,
        }
    }

    /// HTTP status associated with the error, `0` when not applicable.
    pub fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } | Self::HealthCheckFailed { status, .. } => *status,
            _ => 0,
        }
    }

    /// The human message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Network { message }
            | Self::Http { message, .. }
            | Self::Stream { message }
            | Self::HealthCheckFailed { message, .. }
            | Self::Unknown { message } => message,
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::unknown(format!("payload decode failed: {err}"))
    }
}

// ── Operations & targets ───────────────────────────────────────────────────

/// The namespace an [`OperationKey`] lives in.
///
/// Entity and function names never collide: `entity:Users` and
/// `function:Users` are different operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// A business entity with CRUD-style access.
    Entity,
    /// A named backend function.
    Function,
}

/// Identifies one logical unit of backend work.
///
/// Renders and parses as `"<namespace>:<name>"`; a bare name parses as a
/// function.
///
/// # Example
///
/// ```rust
/// use backend_migrator::OperationKey;
/// let key: OperationKey = "entity:Users".parse().unwrap_or_else(|_| OperationKey::entity("Users"));
/// assert_eq!(key, OperationKey::entity("Users"));
/// assert_eq!(key.to_string(), "entity:Users");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationKey {
    /// Entity or function namespace.
    pub namespace: Namespace,
    /// Operation name as the application knows it (e.g. `getUserProfile`).
    pub name: String,
}

impl OperationKey {
    /// An entity operation key.
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Entity,
            name: name.into(),
        }
    }

    /// A function operation key.
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Function,
            name: name.into(),
        }
    }

    /// The bare operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this key is in the entity namespace.
    pub fn is_entity(&self) -> bool {
        self.namespace == Namespace::Entity
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Namespace::Entity => write!(f, "entity:{}", self.name),
            Namespace::Function => write!(f, "function:{}", self.name),
        }
    }
}

impl FromStr for OperationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once(':') {
            Some(("entity", name)) => (Namespace::Entity, name),
            Some(("function", name)) => (Namespace::Function, name),
            Some((other, _)) => return Err(format!("unknown operation namespace '{other}'")),
            None => (Namespace::Function, s),
        };
        if name.trim().is_empty() {
            return Err(format!("operation key '{s}' has an empty name"));
        }
        Ok(Self {
            namespace,
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for OperationKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OperationKey> for String {
    fn from(key: OperationKey) -> Self {
        key.to_string()
    }
}

/// Which concrete backend serves an operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendTarget {
    /// The legacy embedded SDK.
    Legacy,
    /// The REST backend.
    Rest,
    /// Reserved third backend, enabled globally by configuration.
    Secondary,
}

impl BackendTarget {
    /// The backend a failed call falls back to.
    ///
    /// `Rest` and `Legacy` fall back to each other; `Secondary` falls back
    /// to `Legacy`, which is always present.
    pub fn alternate(self) -> Self {
        match self {
            Self::Legacy => Self::Rest,
            Self::Rest | Self::Secondary => Self::Legacy,
        }
    }

    /// Lowercase label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Rest => "rest",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "rest" => Ok(Self::Rest),
            "secondary" => Ok(Self::Secondary),
            other => Err(format!("unknown backend target '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_env_overrides_config() {
        use crate::config::LogFormat;
        assert_eq!(resolve_log_format(None, &LogFormat::Json), LogFormat::Json);
        assert_eq!(resolve_log_format(Some("pretty"), &LogFormat::Json), LogFormat::Pretty);
        assert_eq!(resolve_log_format(Some("JSON"), &LogFormat::Pretty), LogFormat::Json);
        assert_eq!(resolve_log_format(Some("xml"), &LogFormat::Json), LogFormat::Json);
    }

    #[test]
    fn test_operation_key_parse_entity_and_function() {
        assert_eq!(
            "entity:Users".parse::<OperationKey>(),
            Ok(OperationKey::entity("Users"))
        );
        assert_eq!(
            "function:getTeams".parse::<OperationKey>(),
            Ok(OperationKey::function("getTeams"))
        );
    }

    #[test]
    fn test_operation_key_bare_name_is_function() {
        assert_eq!(
            "generateAICoaching".parse::<OperationKey>(),
            Ok(OperationKey::function("generateAICoaching"))
        );
    }

    #[test]
    fn test_operation_key_namespaces_are_disjoint() {
        assert_ne!(OperationKey::entity("Users"), OperationKey::function("Users"));
    }

    #[test]
    fn test_operation_key_rejects_empty_and_unknown_namespace() {
        assert!("entity:".parse::<OperationKey>().is_err());
        assert!("widget:Users".parse::<OperationKey>().is_err());
    }

    #[test]
    fn test_operation_key_serde_as_string() {
        let json = serde_json::to_string(&OperationKey::entity("Teams")).unwrap();
        assert_eq!(json, "\"entity:Teams\"");
        let back: OperationKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OperationKey::entity("Teams"));
    }

    #[test]
    fn test_backend_target_alternate() {
        assert_eq!(BackendTarget::Rest.alternate(), BackendTarget::Legacy);
        assert_eq!(BackendTarget::Legacy.alternate(), BackendTarget::Rest);
        assert_eq!(BackendTarget::Secondary.alternate(), BackendTarget::Legacy);
    }

    #[test]
    fn test_backend_target_from_str_case_insensitive() {
        assert_eq!("REST".parse::<BackendTarget>(), Ok(BackendTarget::Rest));
        assert!("grpc".parse::<BackendTarget>().is_err());
    }

    #[test]
    fn test_error_codes_and_status() {
        assert_eq!(MigrationError::network("x").code().as_str(), "NETWORK_ERROR");
        assert_eq!(MigrationError::network("x").status(), 0);
        let http = MigrationError::http(404, "not found");
        assert_eq!(http.code(), ErrorCode::HttpError);
        assert_eq!(http.status(), 404);
        assert_eq!(http.message(), "not found");
    }

    #[test]
    fn test_wrap_passes_known_errors_through() {
        let original = MigrationError::stream("broken pipe");
        let wrapped = MigrationError::wrap(&original);
        assert_eq!(wrapped, original);
    }

    #[test]
    fn test_wrap_maps_foreign_errors_to_unknown() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let wrapped = MigrationError::wrap(&io);
        assert_eq!(wrapped.code(), ErrorCode::UnknownError);
        assert!(wrapped.message().contains("disk on fire"));
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        let _ = init_tracing();
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}
