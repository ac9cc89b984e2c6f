//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`MigratorConfig`] that cannot
//! be expressed through the type system alone (URL shape, non-zero
//! timeouts, cross-field invariants).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - Reading the environment (that belongs to `MigratorConfig::apply_env`)

use super::MigratorConfig;
use crate::BackendTarget;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "rest.timeout_ms").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// An environment variable could not be parsed.
    #[error("Environment variable {var}={value} is invalid: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// Raw value as found in the environment.
        value: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Fold a list of violations into a single [`ConfigError::Validation`].
pub(crate) fn join_errors(errors: Vec<ConfigError>) -> ConfigError {
    ConfigError::Validation(
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Validate all semantic constraints on a [`MigratorConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &MigratorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── REST endpoint ────────────────────────────────────────────────
    let base_url = config.rest.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::InvalidField {
            field: "rest.base_url".into(),
            value: format!("'{}'", config.rest.base_url),
            reason: "must be an absolute http:// or https:// URL".into(),
        });
    }

    if config.rest.timeout_ms == 0 {
        errors.push(ConfigError::InvalidField {
            field: "rest.timeout_ms".into(),
            value: "0".into(),
            reason: "timeout must be at least 1ms".into(),
        });
    }

    if config.rest.stream_timeout_ms < config.rest.timeout_ms {
        errors.push(ConfigError::InvalidField {
            field: "rest.stream_timeout_ms".into(),
            value: config.rest.stream_timeout_ms.to_string(),
            reason: "must be \u{2265} rest.timeout_ms".into(),
        });
    }

    if !config.rest.health_path.starts_with('/') {
        errors.push(ConfigError::InvalidField {
            field: "rest.health_path".into(),
            value: format!("'{}'", config.rest.health_path),
            reason: "must start with '/'".into(),
        });
    }

    // ── Auth ─────────────────────────────────────────────────────────
    if config.auth.client_secret.is_some() && config.auth.client_id.is_none() {
        errors.push(ConfigError::InvalidField {
            field: "auth.client_id".into(),
            value: "<unset>".into(),
            reason: "client_id is required when client_secret is set".into(),
        });
    }

    if config.auth.refresh_skew_s >= 3600 {
        errors.push(ConfigError::InvalidField {
            field: "auth.refresh_skew_s".into(),
            value: config.auth.refresh_skew_s.to_string(),
            reason: "must be below one hour".into(),
        });
    }

    // ── Secondary backend gating ─────────────────────────────────────
    if !config.routing.secondary_enabled {
        if config.routing.default_target == BackendTarget::Secondary {
            errors.push(ConfigError::InvalidField {
                field: "routing.default_target".into(),
                value: "secondary".into(),
                reason: "secondary backend is disabled (routing.secondary_enabled)".into(),
            });
        }
        for (op, target) in &config.registry.initial {
            if *target == BackendTarget::Secondary {
                errors.push(ConfigError::InvalidField {
                    field: format!("registry.initial.\"{op}\""),
                    value: "secondary".into(),
                    reason: "secondary backend is disabled (routing.secondary_enabled)".into(),
                });
            }
        }
    }

    // ── Registry ─────────────────────────────────────────────────────
    if config.registry.history_capacity == 0 {
        errors.push(ConfigError::InvalidField {
            field: "registry.history_capacity".into(),
            value: "0".into(),
            reason: "history must hold at least one record".into(),
        });
    }

    // ── Planner ──────────────────────────────────────────────────────
    if config.planner.extensions.is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "planner.extensions".into(),
            value: "[]".into(),
            reason: "at least one extension is required".into(),
        });
    }

    for (field, patterns) in [
        ("planner.legacy_patterns", &config.planner.legacy_patterns),
        ("planner.rest_patterns", &config.planner.rest_patterns),
    ] {
        for pattern in patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError::InvalidField {
                    field: field.into(),
                    value: format!("'{pattern}'"),
                    reason: format!("not a valid regex: {e}"),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
