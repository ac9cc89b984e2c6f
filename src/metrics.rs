//! Prometheus counters for routing and switching.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_execution`, `inc_fallback`, …) are no-ops if `init_metrics` was
//! never called, so the router is always safe to run and observability
//! simply degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `migrator_executions_total` | Counter | `backend`, `outcome` |
//! | `migrator_fallbacks_total` | Counter | `from`, `to` |
//! | `migrator_errors_total` | Counter | `backend`, `code` |
//! | `migrator_switches_total` | Counter | `to` |
//! | `migrator_execution_duration_seconds` | Histogram | `backend` |

use crate::MigrationError;
use prometheus::{
    core::Collector, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the migrator, bundled together so they can
/// be stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Executions per backend and outcome (`ok` / `err`).
    pub executions_total: CounterVec,
    /// Fallback attempts by source and destination backend.
    pub fallbacks_total: CounterVec,
    /// Errors by backend and error code.
    pub errors_total: CounterVec,
    /// Registry transitions by destination backend.
    pub switches_total: CounterVec,
    /// Wall-clock duration of an adapter call.
    pub execution_duration: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build_counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<CounterVec, MigrationError> {
    let counter = CounterVec::new(Opts::new(name, help), labels)
        .map_err(|e| MigrationError::unknown(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| MigrationError::unknown(format!("metrics registration failed: {e}")))?;
    Ok(counter)
}

/// Build a complete bundle on the given registry with a name prefix.
fn build_metrics(registry: Registry, prefix: &str) -> Result<Metrics, MigrationError> {
    let executions_total = build_counter(
        &registry,
        &format!("{prefix}_executions_total"),
        "Adapter executions by backend and outcome",
        &["backend", "outcome"],
    )?;
    let fallbacks_total = build_counter(
        &registry,
        &format!("{prefix}_fallbacks_total"),
        "Fallback attempts by source and destination backend",
        &["from", "to"],
    )?;
    let errors_total = build_counter(
        &registry,
        &format!("{prefix}_errors_total"),
        "Errors by backend and error code",
        &["backend", "code"],
    )?;
    let switches_total = build_counter(
        &registry,
        &format!("{prefix}_switches_total"),
        "Backend switches by destination",
        &["to"],
    )?;

    let execution_duration = HistogramVec::new(
        HistogramOpts::new(
            format!("{prefix}_execution_duration_seconds"),
            "Adapter call duration per backend",
        ),
        &["backend"],
    )
    .map_err(|e| MigrationError::unknown(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(execution_duration.clone()))
        .map_err(|e| MigrationError::unknown(format!("metrics registration failed: {e}")))?;

    Ok(Metrics {
        registry,
        executions_total,
        fallbacks_total,
        errors_total,
        switches_total,
        execution_duration,
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`MigrationError::Unknown`] if metric construction or registry
/// registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), MigrationError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let bundle = build_metrics(Registry::new(), "migrator")?;

    // If another thread raced us, the first one wins; both bundles carry
    // identical descriptors.
    let _ = METRICS.set(bundle);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one adapter execution and record its duration.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_execution(backend: &str, ok: bool, elapsed: Duration) {
    if let Some(m) = metrics() {
        let outcome = if ok { "ok" } else { "err" };
        if let Ok(c) = m
            .executions_total
            .get_metric_with_label_values(&[backend, outcome])
        {
            c.inc();
        }
        if let Ok(h) = m.execution_duration.get_metric_with_label_values(&[backend]) {
            h.observe(elapsed.as_secs_f64());
        }
    }
}

/// Count one fallback attempt from `from` to `to`.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_fallback(from: &str, to: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.fallbacks_total.get_metric_with_label_values(&[from, to]) {
            c.inc();
        }
    }
}

/// Count one error on `backend` with the given error code.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_error(backend: &str, code: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.errors_total.get_metric_with_label_values(&[backend, code]) {
            c.inc();
        }
    }
}

/// Count one registry transition to `to`.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_switch(to: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.switches_total.get_metric_with_label_values(&[to]) {
            c.inc();
        }
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = metrics().map_or_else(Vec::new, |m| m.registry.gather());
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// A structured snapshot of the counters.
#[derive(Debug, Default)]
pub struct MetricsSummary {
    /// Execution counts keyed by `"backend:outcome"`.
    pub executions_total: HashMap<String, u64>,
    /// Fallback counts keyed by `"from->to"`.
    pub fallbacks_total: HashMap<String, u64>,
    /// Error counts keyed by `"backend:code"`.
    pub errors_total: HashMap<String, u64>,
}

fn summarise(m: &Metrics) -> MetricsSummary {
    fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
        metric
            .get_label()
            .iter()
            .find(|l| l.get_name() == name)
            .map_or("unknown", |l| l.get_value())
    }

    let mut summary = MetricsSummary::default();

    for family in m.executions_total.collect() {
        for metric in family.get_metric() {
            let key = format!("{}:{}", label(metric, "backend"), label(metric, "outcome"));
            let value = metric.get_counter().get_value() as u64;
            summary.executions_total.insert(key, value);
        }
    }

    for family in m.fallbacks_total.collect() {
        for metric in family.get_metric() {
            let key = format!("{}->{}", label(metric, "from"), label(metric, "to"));
            let value = metric.get_counter().get_value() as u64;
            summary.fallbacks_total.insert(key, value);
        }
    }

    for family in m.errors_total.collect() {
        for metric in family.get_metric() {
            let key = format!("{}:{}", label(metric, "backend"), label(metric, "code"));
            let value = metric.get_counter().get_value() as u64;
            summary.errors_total.insert(key, value);
        }
    }

    summary
}

/// Return a structured summary of current metric counter values.
///
/// Returns a zeroed [`MetricsSummary`] if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn get_metrics_summary() -> MetricsSummary {
    metrics().map_or_else(MetricsSummary::default, summarise)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fresh, isolated [`Metrics`] bundle backed by its own registry.
    ///
    /// The global `METRICS` OnceLock cannot be reset between tests, so tests
    /// that need exact counter values build a local bundle instead.
    fn make_test_metrics() -> Metrics {
        build_metrics(Registry::new(), "t").expect("test: build metrics")
    }

    #[test]
    fn test_init_metrics_idempotent_second_call_is_noop() {
        let _ = init_metrics();
        let result = init_metrics();
        assert!(result.is_ok(), "second call must be a no-op returning Ok");
    }

    #[test]
    fn test_helpers_before_init_do_not_panic() {
        inc_execution("rest", true, Duration::from_millis(5));
        inc_fallback("rest", "legacy");
        inc_error("rest", "NETWORK_ERROR");
        inc_switch("rest");
    }

    #[test]
    fn test_isolated_bundle_counts_executions_by_outcome() {
        let m = make_test_metrics();
        for _ in 0..3 {
            m.executions_total
                .get_metric_with_label_values(&["rest", "ok"])
                .expect("test: labels")
                .inc();
        }
        m.executions_total
            .get_metric_with_label_values(&["rest", "err"])
            .expect("test: labels")
            .inc();

        let summary = summarise(&m);
        assert_eq!(summary.executions_total.get("rest:ok"), Some(&3));
        assert_eq!(summary.executions_total.get("rest:err"), Some(&1));
    }

    #[test]
    fn test_isolated_bundle_counts_fallbacks_and_errors() {
        let m = make_test_metrics();
        m.fallbacks_total
            .get_metric_with_label_values(&["rest", "legacy"])
            .expect("test: labels")
            .inc();
        m.errors_total
            .get_metric_with_label_values(&["rest", "HTTP_ERROR"])
            .expect("test: labels")
            .inc();

        let summary = summarise(&m);
        assert_eq!(summary.fallbacks_total.get("rest->legacy"), Some(&1));
        assert_eq!(summary.errors_total.get("rest:HTTP_ERROR"), Some(&1));
    }

    #[test]
    fn test_gather_metrics_after_init_is_valid_text() {
        let _ = init_metrics();
        inc_switch("rest");
        let text = gather_metrics();
        assert!(text.contains("migrator_switches_total"));
    }
}
