//! # Stage: Transport Core
//!
//! ## Responsibility
//! Everything between a REST adapter and the network: bearer-token
//! lifecycle with single-flight refresh, request/response interceptors,
//! JSON requests with per-call timeouts, NDJSON streaming with
//! cancellation, and the health probe.
//!
//! ## Guarantees
//! - At most one token refresh is in flight per [`TokenManager`]
//! - Every failure leaves this module as a [`crate::MigrationError`] with
//!   one of the five codes
//! - Stream chunks are delivered in order, each record exactly once
//!
//! ## NOT Responsible For
//! - Endpoint mapping (see `routing::endpoints`)
//! - Retrying or falling back (see `routing::router`)

pub mod auth;
pub mod client;
pub mod interceptor;
pub mod stream;

pub use auth::{AuthToken, StaticTokenSource, TokenManager, TokenSource};
pub use client::{HttpClient, RequestOptions, StreamOptions};
pub use interceptor::{
    ErrorStatusInterceptor, HeaderInterceptor, HttpResponse, RequestConfig, RequestInterceptor,
    ResponseInterceptor,
};
pub use stream::{LineDecoder, StreamChunk, StreamOutcome};
