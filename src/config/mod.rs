//! # Stage: Migrator Configuration
//!
//! ## Responsibility
//! Parse, overlay and validate the settings every other module reads: the
//! REST base URL and timeouts, identity-provider credentials, routing
//! defaults (fallback, secondary backend flag), registry seeding, and the
//! static planner's pattern lists.
//!
//! Settings come from a TOML file, from environment variables, or both
//! (environment wins):
//! ```text
//! MIGRATOR_REST_BASE_URL=https://api.example.com cargo run --bin migration-planner -- analyze src/
//! ```
//!
//! ## Guarantees
//! - Deterministic: the same TOML + environment always yields the same config
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building clients or registries from config (callers do that)
//! - Storing credentials (the identity provider owns them)

pub mod loader;
pub mod validation;

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{BackendTarget, OperationKey};
pub use validation::ConfigError;

// ── Default value functions ──────────────────────────────────────────────

/// Default REST base URL.
fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

/// Default per-request timeout: 30 000ms.
fn default_timeout_ms() -> u64 {
    30_000
}

/// Default streaming timeout: 120 000ms.
fn default_stream_timeout_ms() -> u64 {
    120_000
}

/// Default health probe path.
fn default_health_path() -> String {
    "/health".to_string()
}

/// Default clock skew tolerated before a token counts as expired: 30s.
fn default_refresh_skew_s() -> u64 {
    30
}

/// Default switch history capacity.
fn default_history_capacity() -> usize {
    1000
}

/// Default backend for operations never switched.
fn default_target() -> BackendTarget {
    BackendTarget::Legacy
}

/// Default source extensions the planner scans.
fn default_extensions() -> Vec<String> {
    ["js", "jsx", "ts", "tsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default directory names the planner never descends into.
fn default_skip_dirs() -> Vec<String> {
    ["node_modules", "dist", "build", "coverage"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a migrator instance.
///
/// Every section has a documented default, so an empty TOML document is a
/// valid configuration.
///
/// # Example
///
/// ```toml
/// [rest]
/// base_url = "https://api.example.com"
///
/// [routing]
/// default_target = "legacy"
/// secondary_enabled = false
///
/// [registry.initial]
/// "entity:Users" = "rest"
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct MigratorConfig {
    /// REST backend connection settings.
    #[serde(default)]
    pub rest: RestConfig,
    /// Identity-provider credentials and token refresh policy.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Router defaults.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Switch registry seeding and history settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Static planner patterns.
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Logging output.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── REST ─────────────────────────────────────────────────────────────────

/// REST backend connection settings.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RestConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Timeout for a whole streamed response in milliseconds.
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,
    /// Path probed by the health check.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            stream_timeout_ms: default_stream_timeout_ms(),
            health_path: default_health_path(),
        }
    }
}

// ── Auth ─────────────────────────────────────────────────────────────────

/// Identity-provider settings.
///
/// The credentials are handed to whatever [`crate::transport::TokenSource`]
/// the application plugs in; this crate never persists them.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AuthConfig {
    /// Client identifier registered with the identity provider.
    pub client_id: Option<String>,
    /// Client secret or API key.
    pub client_secret: Option<String>,
    /// Seconds before the real expiry at which a token is treated as expired.
    #[serde(default = "default_refresh_skew_s")]
    pub refresh_skew_s: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_skew_s: default_refresh_skew_s(),
        }
    }
}

// ── Routing ──────────────────────────────────────────────────────────────

/// Router defaults.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RoutingConfig {
    /// Backend serving every operation that was never switched.
    #[serde(default = "default_target")]
    pub default_target: BackendTarget,
    /// Whether `execute` falls back to the alternate backend by default.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    /// Global switch for the reserved third backend.
    #[serde(default)]
    pub secondary_enabled: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_target: default_target(),
            fallback_enabled: true,
            secondary_enabled: false,
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Switch registry settings.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RegistryConfig {
    /// Maximum number of switch records kept in the global history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Whether batch switches run concurrently (`true`) or one by one.
    #[serde(default = "default_true")]
    pub batch_parallel: bool,
    /// Seed assignments applied at construction, keyed by `"entity:Name"`
    /// or `"function:name"`.
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, BackendTarget>")]
    pub initial: BTreeMap<OperationKey, BackendTarget>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            batch_parallel: true,
            initial: BTreeMap::new(),
        }
    }
}

// ── Planner ──────────────────────────────────────────────────────────────

/// Static planner pattern settings.
///
/// Empty pattern lists mean "use the built-in list".
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PlannerConfig {
    /// File extensions (without dot) that are analysed.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names skipped while walking a source tree.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
    /// Extra regexes counted as legacy-SDK references.
    #[serde(default)]
    pub legacy_patterns: Vec<String>,
    /// Extra regexes counted as REST-client dependencies.
    #[serde(default)]
    pub rest_patterns: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            skip_dirs: default_skip_dirs(),
            legacy_patterns: Vec::new(),
            rest_patterns: Vec::new(),
        }
    }
}

// ── Observability ────────────────────────────────────────────────────────

/// Observability configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, colorized log output.
    #[default]
    Pretty,
    /// Structured JSON log output for machine consumption.
    Json,
}

// ── Environment overlay ──────────────────────────────────────────────────

impl MigratorConfig {
    /// Build a config from defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a variable is set to an unparseable
    /// value, or [`ConfigError::Validation`] if the result is invalid.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        validation::validate(&config).map_err(validation::join_errors)?;
        Ok(config)
    }

    /// Overlay values from the process environment onto `self`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] on the first unparseable variable.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary variable lookup onto `self`.
    ///
    /// Recognised variables:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `MIGRATOR_REST_BASE_URL` | `rest.base_url` |
    /// | `MIGRATOR_REST_TIMEOUT_MS` | `rest.timeout_ms` |
    /// | `MIGRATOR_AUTH_CLIENT_ID` | `auth.client_id` |
    /// | `MIGRATOR_AUTH_CLIENT_SECRET` | `auth.client_secret` |
    /// | `MIGRATOR_AUTH_REFRESH_SKEW_S` | `auth.refresh_skew_s` |
    /// | `MIGRATOR_DEFAULT_TARGET` | `routing.default_target` |
    /// | `MIGRATOR_FALLBACK_ENABLED` | `routing.fallback_enabled` |
    /// | `MIGRATOR_SECONDARY_ENABLED` | `routing.secondary_enabled` |
    /// | `MIGRATOR_BATCH_PARALLEL` | `registry.batch_parallel` |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] on the first unparseable variable.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MIGRATOR_REST_BASE_URL") {
            self.rest.base_url = url;
        }
        if let Some(raw) = lookup("MIGRATOR_REST_TIMEOUT_MS") {
            self.rest.timeout_ms = parse_env("MIGRATOR_REST_TIMEOUT_MS", &raw)?;
        }
        if let Some(id) = lookup("MIGRATOR_AUTH_CLIENT_ID") {
            self.auth.client_id = Some(id);
        }
        if let Some(secret) = lookup("MIGRATOR_AUTH_CLIENT_SECRET") {
            self.auth.client_secret = Some(secret);
        }
        if let Some(raw) = lookup("MIGRATOR_AUTH_REFRESH_SKEW_S") {
            self.auth.refresh_skew_s = parse_env("MIGRATOR_AUTH_REFRESH_SKEW_S", &raw)?;
        }
        if let Some(raw) = lookup("MIGRATOR_DEFAULT_TARGET") {
            self.routing.default_target = raw.parse().map_err(|reason| ConfigError::Env {
                var: "MIGRATOR_DEFAULT_TARGET".into(),
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(raw) = lookup("MIGRATOR_FALLBACK_ENABLED") {
            self.routing.fallback_enabled = parse_flag("MIGRATOR_FALLBACK_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("MIGRATOR_SECONDARY_ENABLED") {
            self.routing.secondary_enabled = parse_flag("MIGRATOR_SECONDARY_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("MIGRATOR_BATCH_PARALLEL") {
            self.registry.batch_parallel = parse_flag("MIGRATOR_BATCH_PARALLEL", &raw)?;
        }
        Ok(())
    }
}

fn parse_env<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.into(),
        value: raw.into(),
        reason: e.to_string(),
    })
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.into(),
            value: raw.into(),
            reason: "expected a boolean (true/false/1/0)".into(),
        }),
    }
}

/// Export the JSON Schema for [`MigratorConfig`].
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
///
/// # Panics
///
/// This function never panics.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(MigratorConfig);
    serde_json::to_string_pretty(&schema)
}
