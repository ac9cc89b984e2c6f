//! Legacy SDK adapter.
//!
//! The legacy backend is an embedded SDK reached through the [`LegacySdk`]
//! trait. The adapter turns an operation into an SDK method name
//! (`functions.getTeams`, `entities.Users.list`, ...) and normalises the answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{normalize_payload, BackendAdapter};
use crate::routing::endpoints::sdk_call;
use crate::{BackendTarget, MigrationError, OperationKey};

/// The embedded legacy SDK, as seen by the adapter.
#[async_trait]
pub trait LegacySdk: Send + Sync {
    /// Invoke SDK method `method` (e.g. `entities.Users.get`) with `args`.
    async fn call(&self, method: &str, args: Value) -> Result<Value, MigrationError>;

    /// Whether the SDK is usable. Defaults to `true`.
    async fn ready(&self) -> bool {
        true
    }
}

/// Adapter that serves operations from the legacy SDK.
#[derive(Clone)]
pub struct LegacyAdapter {
    sdk: Arc<dyn LegacySdk>,
}

impl std::fmt::Debug for LegacyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyAdapter").finish_non_exhaustive()
    }
}

impl LegacyAdapter {
    /// Wrap an SDK handle.
    pub fn new(sdk: Arc<dyn LegacySdk>) -> Self {
        Self { sdk }
    }
}

#[async_trait]
impl BackendAdapter for LegacyAdapter {
    fn target(&self) -> BackendTarget {
        BackendTarget::Legacy
    }

    async fn execute(
        &self,
        operation: &OperationKey,
        data: &Value,
    ) -> Result<Value, MigrationError> {
        let (method, args) = sdk_call(operation, data)?;
        debug!(operation = %operation, sdk_method = %method, "legacy call");
        let value = self.sdk.call(&method, args).await?;
        Ok(normalize_payload(value))
    }

    async fn health_check(&self) -> Result<(), MigrationError> {
        if self.sdk.ready().await {
            Ok(())
        } else {
            Err(MigrationError::HealthCheckFailed {
                status: 0,
                message: "legacy SDK is not ready".into(),
            })
        }
    }
}
