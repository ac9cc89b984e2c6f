//! Side-by-side timing of both backends through the router.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::parity::{compare_with_threshold, ParityReport, DEFAULT_PARITY_THRESHOLD};
use super::stats::{LatencyStats, Recommendation};
use crate::registry::COMPARISON_TAG_PREFIX;
use crate::routing::{ExecuteOptions, MigrationRouter, RouterError};
use crate::{BackendTarget, OperationKey};

/// Result of timing one operation on both backends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// Operation that was timed.
    pub operation: OperationKey,
    /// Calls made per backend.
    pub iterations: usize,
    /// REST measurements.
    pub rest: LatencyStats,
    /// Legacy measurements.
    pub legacy: LatencyStats,
    /// Which backend the numbers favour.
    pub recommendation: Recommendation,
    /// When the comparison finished.
    pub timestamp: DateTime<Utc>,
}

/// Aggregate of several comparisons.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchComparison {
    /// Comparisons that completed.
    pub reports: Vec<ComparisonReport>,
    /// Operations whose comparison could not run, with the reason.
    pub failures: Vec<(OperationKey, String)>,
}

impl BatchComparison {
    /// Number of completed comparisons recommending `target`.
    pub fn preferred(&self, target: BackendTarget) -> usize {
        self.reports
            .iter()
            .filter(|r| r.recommendation.backend() == Some(target))
            .count()
    }

    /// Mean improvement over completed comparisons that recommend REST.
    pub fn mean_rest_improvement_pct(&self) -> f64 {
        let gains: Vec<f64> = self
            .reports
            .iter()
            .filter_map(|r| match r.recommendation {
                Recommendation::Prefer {
                    backend: BackendTarget::Rest,
                    improvement_pct,
                } => Some(improvement_pct),
                _ => None,
            })
            .collect();
        if gains.is_empty() {
            0.0
        } else {
            gains.iter().sum::<f64>() / gains.len() as f64
        }
    }
}

/// Times operations on the REST and legacy backends.
///
/// Measurements go through the router with fallback disabled, so a
/// failing backend is counted as an error rather than silently served by
/// the other one.
#[derive(Debug, Clone)]
pub struct PerformanceComparator {
    router: Arc<MigrationRouter>,
    parity_threshold: f64,
}

impl PerformanceComparator {
    /// Create a comparator over `router`.
    pub fn new(router: Arc<MigrationRouter>) -> Self {
        Self {
            router,
            parity_threshold: DEFAULT_PARITY_THRESHOLD,
        }
    }

    /// Similarity required by [`validate_parity`](Self::validate_parity).
    pub fn with_parity_threshold(mut self, threshold: f64) -> Self {
        self.parity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Time `iterations` sequential calls on each backend.
    ///
    /// The operation is switched to REST, then to legacy, through the
    /// registry; its original target is restored afterwards even when the
    /// run stops early. These switches stay in the history tagged
    /// `comparison:<id>` and are ignored by
    /// [`SwitchRegistry::rollback`](crate::SwitchRegistry::rollback).
    ///
    /// # Errors
    ///
    /// [`RouterError::Registry`] if a switch fails. Failed calls are not
    /// errors; they show up in [`LatencyStats::errors`].
    pub async fn compare(
        &self,
        operation: &OperationKey,
        payload: &Value,
        iterations: usize,
    ) -> Result<ComparisonReport, RouterError> {
        let registry = self.router.registry();
        let original = registry.get_status(operation)?;
        let tag = format!("{COMPARISON_TAG_PREFIX}{}", Uuid::new_v4());

        let measured = self.measure_both(operation, payload, iterations, &tag).await;

        let restored = registry.switch_to(operation, original, Some(&tag));
        if let Err(e) = &restored {
            warn!(operation = %operation, error = %e, "failed to restore target after comparison");
        }
        let (rest, legacy) = measured?;
        restored?;

        let recommendation = Recommendation::from_stats(&rest, &legacy);
        info!(
            operation = %operation,
            iterations,
            rest_avg_ms = rest.avg_ms,
            legacy_avg_ms = legacy.avg_ms,
            recommended = recommendation.backend().map(|b| b.as_str()).unwrap_or("none"),
            "comparison finished"
        );
        Ok(ComparisonReport {
            operation: operation.clone(),
            iterations,
            rest,
            legacy,
            recommendation,
            timestamp: Utc::now(),
        })
    }

    /// Compare several operations one after another.
    ///
    /// A failing comparison is recorded in
    /// [`BatchComparison::failures`] and the batch continues.
    pub async fn compare_batch(
        &self,
        operations: &[(OperationKey, Value)],
        iterations: usize,
    ) -> BatchComparison {
        let mut batch = BatchComparison::default();
        for (operation, payload) in operations {
            match self.compare(operation, payload, iterations).await {
                Ok(report) => batch.reports.push(report),
                Err(e) => batch.failures.push((operation.clone(), e.to_string())),
            }
        }
        batch
    }

    /// Run `operation` once on each backend and compare the payload shapes.
    ///
    /// Uses forced routing, so the registry is not touched.
    ///
    /// # Errors
    ///
    /// The router error of whichever backend failed first (legacy runs
    /// first).
    pub async fn validate_parity(
        &self,
        operation: &OperationKey,
        payload: &Value,
    ) -> Result<ParityReport, RouterError> {
        let legacy = self
            .router
            .execute(
                operation,
                payload.clone(),
                ExecuteOptions {
                    force_legacy: true,
                    ..ExecuteOptions::no_fallback()
                },
            )
            .await?;
        let rest = self
            .router
            .execute(
                operation,
                payload.clone(),
                ExecuteOptions {
                    force_rest: true,
                    ..ExecuteOptions::no_fallback()
                },
            )
            .await?;

        let report = compare_with_threshold(&legacy.data, &rest.data, self.parity_threshold);
        info!(
            operation = %operation,
            similarity = report.similarity,
            compatible = report.is_compatible,
            "parity checked"
        );
        Ok(report)
    }

    async fn measure_both(
        &self,
        operation: &OperationKey,
        payload: &Value,
        iterations: usize,
        tag: &str,
    ) -> Result<(LatencyStats, LatencyStats), RouterError> {
        let rest = self
            .measure(BackendTarget::Rest, operation, payload, iterations, tag)
            .await?;
        let legacy = self
            .measure(BackendTarget::Legacy, operation, payload, iterations, tag)
            .await?;
        Ok((rest, legacy))
    }

    async fn measure(
        &self,
        target: BackendTarget,
        operation: &OperationKey,
        payload: &Value,
        iterations: usize,
        tag: &str,
    ) -> Result<LatencyStats, RouterError> {
        self.router
            .registry()
            .switch_to(operation, target, Some(tag))?;

        let mut samples = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let started = Instant::now();
            let outcome = self
                .router
                .execute(operation, payload.clone(), ExecuteOptions::no_fallback())
                .await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            match outcome {
                Ok(_) => samples.push(Some(elapsed_ms)),
                Err(e) => {
                    debug!(operation = %operation, backend = %target, error = %e, "timed call failed");
                    samples.push(None);
                }
            }
        }
        Ok(LatencyStats::from_samples(&samples))
    }
}
