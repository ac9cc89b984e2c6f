//! # Stage: Migration Routing
//!
//! ## Responsibility
//! Route every operation to the backend the switch registry currently
//! assigns it, with per-call overrides and a single automatic fallback to
//! the alternate backend.
//!
//! ## Guarantees
//! - Deterministic: the same registry state and options always pick the
//!   same backend
//! - Bounded: at most two adapter calls per execution (primary + one
//!   fallback); streams never fall back
//! - Thread-safe: counters are atomics, state lives in the registry
//!
//! ## NOT Responsible For
//! - Deciding when an operation should move (operators, experiments)
//! - Retrying the same backend

pub mod endpoints;
pub mod router;

// Re-exports for convenience
pub use endpoints::{EntityAction, Endpoint, RestCall};
pub use router::{ExecuteOptions, MigrationRouter, RouterError, RouterStats};
