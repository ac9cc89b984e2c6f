//! # Stage: Performance Comparison
//!
//! ## Responsibility
//! Measure an operation on both backends through the router and recommend
//! one, and check that the two backends return payloads of the same shape.
//!
//! ## Guarantees
//! - The operation's registry target is restored after every comparison
//! - Latency statistics cover successful calls only
//! - Parity checks never touch the registry
//!
//! ## NOT Responsible For
//! - Concurrent load generation (calls are sequential)
//! - Moving the operation to the recommended backend

pub mod comparator;
pub mod parity;
pub mod stats;

// Re-exports for convenience
pub use comparator::{BatchComparison, ComparisonReport, PerformanceComparator};
pub use parity::{compare_payloads, ParityReport, TypeMismatch, DEFAULT_PARITY_THRESHOLD};
pub use stats::{LatencyStats, Recommendation};
