//! # Stage: Backend Adapters
//!
//! ## Responsibility
//! Translate an abstract operation + JSON payload into concrete calls on
//! one backend and normalise the answer into an [`OperationResult`].
//!
//! ## Guarantees
//! - Both adapters return the same result shape; callers never branch on
//!   backend identity
//! - Adapter errors are always [`MigrationError`]s
//!
//! ## NOT Responsible For
//! - Choosing the backend or falling back (see `routing`)
//! - Payload schema validation (owned by the calling application)

pub mod legacy;
pub mod rest;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::transport::{StreamChunk, StreamOptions, StreamOutcome};
use crate::{BackendTarget, MigrationError, OperationKey};

pub use legacy::{LegacyAdapter, LegacySdk};
pub use rest::RestAdapter;

/// Normalised result of one routed execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    /// Response payload with transport envelopes removed.
    pub data: Value,
    /// Backend that produced `data`.
    pub backend: BackendTarget,
    /// Wall-clock time spent in the adapter.
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Common interface every backend adapter implements.
///
/// Implementations must be `Send + Sync` so the router can share them
/// across tasks behind an `Arc`.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which backend this adapter talks to.
    fn target(&self) -> BackendTarget;

    /// Execute `operation` with `data` and return the normalised payload.
    async fn execute(&self, operation: &OperationKey, data: &Value)
        -> Result<Value, MigrationError>;

    /// Execute `operation` as a stream, delivering records to `on_chunk`.
    ///
    /// `options` carries the cancel signal and the per-call timeout. The
    /// default implementation reports that the backend cannot stream.
    async fn execute_stream(
        &self,
        operation: &OperationKey,
        data: &Value,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
        options: StreamOptions,
    ) -> Result<StreamOutcome, MigrationError> {
        let _ = (data, on_chunk, options);
        Err(MigrationError::unknown(format!(
            "{} backend cannot stream {operation}",
            self.target()
        )))
    }

    /// Probe the backend. Defaults to healthy.
    async fn health_check(&self) -> Result<(), MigrationError> {
        Ok(())
    }
}

/// Strip a `{ "data": … }` response envelope.
///
/// An object whose keys are `data` plus only bookkeeping keys (`success`,
/// `meta`, `status`, `message`) is unwrapped to its `data` value; anything
/// else is returned unchanged.
pub fn normalize_payload(value: Value) -> Value {
    const ENVELOPE_KEYS: [&str; 5] = ["data", "success", "meta", "status", "message"];
    match value {
        Value::Object(mut map)
            if map.contains_key("data")
                && map.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str())) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
