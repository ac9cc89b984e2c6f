//! Migration router.
//!
//! The [`MigrationRouter`] looks up the current target of an operation in
//! the [`SwitchRegistry`], runs it on the matching [`BackendAdapter`] and,
//! when the primary attempt fails, retries exactly once on the alternate
//! backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{BackendAdapter, OperationResult};
use crate::config::RoutingConfig;
use crate::registry::{RegistryError, SwitchRegistry};
use crate::transport::{StreamChunk, StreamOptions, StreamOutcome};
use crate::{metrics, BackendTarget, ErrorCode, MigrationError, OperationKey};

/// Per-call routing options.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Ignore the registry and use REST. Wins over `force_legacy`.
    pub force_rest: bool,
    /// Ignore the registry and use the legacy backend.
    pub force_legacy: bool,
    /// Retry once on the alternate backend after a failure.
    pub fallback: bool,
    /// Run as a stream; chunks are collected into a JSON array and
    /// fallback is skipped.
    pub streaming: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            force_rest: false,
            force_legacy: false,
            fallback: true,
            streaming: false,
        }
    }
}

impl ExecuteOptions {
    /// Options that never fall back.
    pub fn no_fallback() -> Self {
        Self {
            fallback: false,
            ..Self::default()
        }
    }
}

/// Errors returned by [`MigrationRouter`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    /// The only attempt failed.
    #[error("{source}")]
    Backend {
        /// Backend that failed.
        backend: BackendTarget,
        /// The failure.
        source: MigrationError,
    },

    /// Both the primary and the fallback attempt failed. Reports the
    /// fallback error.
    #[error("{fallback}")]
    FallbackFailed {
        /// Backend of the first attempt.
        primary_backend: BackendTarget,
        /// First attempt's error.
        primary: MigrationError,
        /// Backend of the fallback attempt.
        fallback_backend: BackendTarget,
        /// Fallback attempt's error.
        fallback: MigrationError,
    },

    /// No adapter is registered for the resolved backend.
    #[error("no adapter registered for backend '{0}'")]
    NoAdapter(BackendTarget),

    /// The registry could not be read.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RouterError {
    /// The error that decided the outcome: the fallback error when both
    /// attempts failed, otherwise the only error.
    pub fn last_error(&self) -> Option<&MigrationError> {
        match self {
            Self::Backend { source, .. } => Some(source),
            Self::FallbackFailed { fallback, .. } => Some(fallback),
            Self::NoAdapter(_) | Self::Registry(_) => None,
        }
    }

    /// The primary attempt's error, if fallback ran.
    pub fn primary_error(&self) -> Option<&MigrationError> {
        match self {
            Self::FallbackFailed { primary, .. } => Some(primary),
            _ => None,
        }
    }

    /// Machine-readable code of [`last_error`](Self::last_error).
    pub fn code(&self) -> ErrorCode {
        self.last_error()
            .map_or(ErrorCode::UnknownError, MigrationError::code)
    }

    /// HTTP status of [`last_error`](Self::last_error), `0` if none.
    pub fn status(&self) -> u16 {
        self.last_error().map_or(0, MigrationError::status)
    }
}

/// Snapshot of router counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterStats {
    /// Executions started.
    pub executions: u64,
    /// Fallback attempts made.
    pub fallbacks: u64,
    /// Fallback attempts that succeeded.
    pub fallback_successes: u64,
    /// Fallback attempts that failed.
    pub fallback_failures: u64,
}

/// Per-operation router over the registered backend adapters.
///
/// # Example
///
/// ```rust,ignore
/// let router = MigrationRouter::new(registry, legacy_adapter, rest_adapter);
/// let result = router
///     .execute(&OperationKey::function("getTeams"), json!({}), ExecuteOptions::default())
///     .await?;
/// println!("served by {}", result.backend);
/// ```
pub struct MigrationRouter {
    registry: Arc<SwitchRegistry>,
    adapters: HashMap<BackendTarget, Arc<dyn BackendAdapter>>,
    secondary_enabled: bool,
    fallback_default: bool,

    executions: AtomicU64,
    fallbacks: AtomicU64,
    fallback_successes: AtomicU64,
    fallback_failures: AtomicU64,
}

impl std::fmt::Debug for MigrationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut backends: Vec<_> = self.adapters.keys().copied().collect();
        backends.sort();
        f.debug_struct("MigrationRouter")
            .field("backends", &backends)
            .field("secondary_enabled", &self.secondary_enabled)
            .field("fallback_default", &self.fallback_default)
            .finish()
    }
}

impl MigrationRouter {
    /// Create a router over the two mandatory adapters.
    pub fn new(
        registry: Arc<SwitchRegistry>,
        legacy: Arc<dyn BackendAdapter>,
        rest: Arc<dyn BackendAdapter>,
    ) -> Self {
        let mut adapters = HashMap::new();
        adapters.insert(BackendTarget::Legacy, legacy);
        adapters.insert(BackendTarget::Rest, rest);
        Self {
            registry,
            adapters,
            secondary_enabled: false,
            fallback_default: true,
            executions: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            fallback_successes: AtomicU64::new(0),
            fallback_failures: AtomicU64::new(0),
        }
    }

    /// Register the secondary backend and enable it.
    pub fn with_secondary(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.adapters.insert(BackendTarget::Secondary, adapter);
        self.secondary_enabled = true;
        self
    }

    /// Apply the `[routing]` config section.
    pub fn with_config(mut self, config: &RoutingConfig) -> Self {
        self.secondary_enabled = config.secondary_enabled;
        self.fallback_default = config.fallback_enabled;
        self
    }

    /// The registry the router reads.
    pub fn registry(&self) -> &Arc<SwitchRegistry> {
        &self.registry
    }

    /// Default options for this router (fallback per configuration).
    pub fn default_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            fallback: self.fallback_default,
            ..ExecuteOptions::default()
        }
    }

    /// Decide which backend serves `operation` under `options`.
    ///
    /// # Errors
    ///
    /// [`RouterError::Registry`] if the registry lock is poisoned.
    pub fn resolve_target(
        &self,
        operation: &OperationKey,
        options: &ExecuteOptions,
    ) -> Result<BackendTarget, RouterError> {
        if options.force_rest {
            return Ok(BackendTarget::Rest);
        }
        if options.force_legacy {
            return Ok(BackendTarget::Legacy);
        }
        let target = self.registry.get_status(operation)?;
        Ok(self.usable(operation, target))
    }

    /// Execute `operation` with `data` on the resolved backend, falling back
    /// once if enabled.
    ///
    /// # Errors
    ///
    /// - [`RouterError::Backend`] when the only attempt failed
    /// - [`RouterError::FallbackFailed`] when both attempts failed
    /// - [`RouterError::NoAdapter`] / [`RouterError::Registry`] on setup
    ///   problems
    pub async fn execute(
        &self,
        operation: &OperationKey,
        data: Value,
        options: ExecuteOptions,
    ) -> Result<OperationResult, RouterError> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let primary = self.resolve_target(operation, &options)?;

        if options.streaming {
            let mut chunks = Vec::new();
            let started = Instant::now();
            let outcome = self
                .stream_on(
                    primary,
                    operation,
                    &data,
                    &mut |c: StreamChunk| chunks.push(c),
                    StreamOptions::default(),
                )
                .await;
            return match outcome {
                Ok(_) => {
                    let data = serde_json::to_value(&chunks)
                        .map_err(|e| RouterError::Backend {
                            backend: primary,
                            source: e.into(),
                        })?;
                    Ok(OperationResult {
                        data,
                        backend: primary,
                        latency: started.elapsed(),
                    })
                }
                Err(source) => Err(RouterError::Backend {
                    backend: primary,
                    source,
                }),
            };
        }

        let first = self.attempt(primary, operation, &data, false).await;
        let primary_error = match first {
            Ok(result) => return Ok(result),
            Err(RouterError::Backend { source, .. }) => source,
            Err(other) => return Err(other),
        };

        if !options.fallback {
            return Err(RouterError::Backend {
                backend: primary,
                source: primary_error,
            });
        }

        let fallback = primary.alternate();
        warn!(
            operation = %operation,
            backend = %primary,
            fallback_backend = %fallback,
            error = %primary_error,
            "primary failed, falling back"
        );
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        metrics::inc_fallback(primary.as_str(), fallback.as_str());

        match self.attempt(fallback, operation, &data, true).await {
            Ok(result) => {
                self.fallback_successes.fetch_add(1, Ordering::Relaxed);
                Ok(result)
            }
            Err(RouterError::Backend { source, .. }) => {
                self.fallback_failures.fetch_add(1, Ordering::Relaxed);
                Err(RouterError::FallbackFailed {
                    primary_backend: primary,
                    primary: primary_error,
                    fallback_backend: fallback,
                    fallback: source,
                })
            }
            Err(other) => {
                self.fallback_failures.fetch_add(1, Ordering::Relaxed);
                Err(other)
            }
        }
    }

    /// Stream `operation` from its resolved backend without fallback.
    ///
    /// Returns the outcome and the backend that served it.
    ///
    /// # Errors
    ///
    /// [`RouterError::Backend`] with the adapter's error.
    pub async fn execute_stream(
        &self,
        operation: &OperationKey,
        data: Value,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
        options: StreamOptions,
    ) -> Result<(StreamOutcome, BackendTarget), RouterError> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let target = self.resolve_target(operation, &ExecuteOptions::default())?;
        self.stream_on(target, operation, &data, on_chunk, options)
            .await
            .map(|outcome| (outcome, target))
            .map_err(|source| RouterError::Backend {
                backend: target,
                source,
            })
    }

    /// Probe every registered backend.
    pub async fn health_check(&self) -> BTreeMap<BackendTarget, Result<(), MigrationError>> {
        let mut out = BTreeMap::new();
        for (target, adapter) in &self.adapters {
            out.insert(*target, adapter.health_check().await);
        }
        out
    }

    /// Current counter values.
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            executions: self.executions.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            fallback_successes: self.fallback_successes.load(Ordering::Relaxed),
            fallback_failures: self.fallback_failures.load(Ordering::Relaxed),
        }
    }

    // ── internals ──────────────────────────────────────────────────────

    fn usable(&self, operation: &OperationKey, target: BackendTarget) -> BackendTarget {
        if target == BackendTarget::Secondary
            && !(self.secondary_enabled && self.adapters.contains_key(&BackendTarget::Secondary))
        {
            warn!(
                operation = %operation,
                "secondary backend unavailable, routing to legacy"
            );
            return BackendTarget::Legacy;
        }
        target
    }

    fn adapter(&self, target: BackendTarget) -> Result<&Arc<dyn BackendAdapter>, RouterError> {
        self.adapters
            .get(&target)
            .ok_or(RouterError::NoAdapter(target))
    }

    async fn attempt(
        &self,
        target: BackendTarget,
        operation: &OperationKey,
        data: &Value,
        is_fallback: bool,
    ) -> Result<OperationResult, RouterError> {
        let adapter = self.adapter(target)?;
        let started = Instant::now();
        let outcome = adapter.execute(operation, data).await;
        let latency = started.elapsed();
        metrics::inc_execution(target.as_str(), outcome.is_ok(), latency);

        match outcome {
            Ok(data) => {
                debug!(
                    operation = %operation,
                    backend = %target,
                    fallback = is_fallback,
                    latency_ms = latency.as_millis() as u64,
                    "operation executed"
                );
                if is_fallback {
                    info!(operation = %operation, backend = %target, "fallback succeeded");
                }
                Ok(OperationResult {
                    data,
                    backend: target,
                    latency,
                })
            }
            Err(source) => {
                metrics::inc_error(target.as_str(), source.code().as_str());
                debug!(
                    operation = %operation,
                    backend = %target,
                    fallback = is_fallback,
                    code = %source.code(),
                    "operation failed"
                );
                Err(RouterError::Backend {
                    backend: target,
                    source,
                })
            }
        }
    }

    async fn stream_on(
        &self,
        target: BackendTarget,
        operation: &OperationKey,
        data: &Value,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
        options: StreamOptions,
    ) -> Result<StreamOutcome, MigrationError> {
        let adapter = self
            .adapter(target)
            .map_err(|e| MigrationError::unknown(e.to_string()))?;
        let started = Instant::now();
        let outcome = adapter.execute_stream(operation, data, on_chunk, options).await;
        metrics::inc_execution(target.as_str(), outcome.is_ok(), started.elapsed());
        if let Err(e) = &outcome {
            metrics::inc_error(target.as_str(), e.code().as_str());
        }
        debug!(operation = %operation, backend = %target, streaming = true, "stream finished");
        outcome
    }
}
