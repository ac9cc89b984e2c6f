//! REST backend adapter.
//!
//! Resolves each operation through the endpoint table and sends it with
//! the shared [`HttpClient`]. Streaming calls go to the same endpoint and
//! are decoded as NDJSON.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{normalize_payload, BackendAdapter};
use crate::routing::endpoints::resolve_rest_call;
use crate::transport::{HttpClient, RequestOptions, StreamChunk, StreamOptions, StreamOutcome};
use crate::{BackendTarget, MigrationError, OperationKey};

/// Adapter that serves operations from the REST backend.
///
/// ## Example
///
/// ```no_run
/// use backend_migrator::{HttpClient, RestAdapter};
/// use std::sync::Arc;
///
/// let adapter = RestAdapter::new(Arc::new(HttpClient::new("https://api.example.com")));
/// ```
#[derive(Debug, Clone)]
pub struct RestAdapter {
    client: Arc<HttpClient>,
    target: BackendTarget,
}

impl RestAdapter {
    /// Create an adapter over `client`.
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            target: BackendTarget::Rest,
        }
    }

    /// Report a different target, e.g. to serve the secondary backend
    /// through a second REST deployment.
    pub fn as_target(mut self, target: BackendTarget) -> Self {
        self.target = target;
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }
}

#[async_trait]
impl BackendAdapter for RestAdapter {
    fn target(&self) -> BackendTarget {
        self.target
    }

    async fn execute(
        &self,
        operation: &OperationKey,
        data: &Value,
    ) -> Result<Value, MigrationError> {
        let call = resolve_rest_call(operation, data)?;
        debug!(
            operation = %operation,
            method = %call.method,
            path = %call.path,
            "rest call"
        );

        let mut options = RequestOptions {
            method: call.method,
            body: call.body,
            ..RequestOptions::default()
        };
        options.query = call.query;

        let value: Value = self.client.request_json(&call.path, options).await?;
        Ok(normalize_payload(value))
    }

    async fn execute_stream(
        &self,
        operation: &OperationKey,
        data: &Value,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
        options: StreamOptions,
    ) -> Result<StreamOutcome, MigrationError> {
        let call = resolve_rest_call(operation, data)?;
        let body = call.body.unwrap_or_else(|| data.clone());
        debug!(operation = %operation, path = %call.path, "rest stream");
        self.client
            .stream(&call.path, body, |chunk| on_chunk(chunk), options)
            .await
    }

    async fn health_check(&self) -> Result<(), MigrationError> {
        self.client.health_check().await
    }
}
