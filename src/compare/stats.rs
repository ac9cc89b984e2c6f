//! Latency statistics and the backend recommendation.

use serde::{Deserialize, Serialize};

use crate::BackendTarget;

// ── LatencyStats ───────────────────────────────────────────────────────────

/// Summary of one backend's timed calls.
///
/// Latency figures cover successful calls only; `errors` counts the
/// failed ones.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Successful calls.
    pub count: usize,
    /// Failed calls.
    pub errors: usize,
    /// Mean latency of successes, `0` with none.
    pub avg_ms: f64,
    /// Fastest success, `0` with none.
    pub min_ms: f64,
    /// Slowest success, `0` with none.
    pub max_ms: f64,
    /// Nearest-rank 95th percentile of successes, `0` with none.
    pub p95_ms: f64,
}

impl LatencyStats {
    /// Build stats from per-call samples; `None` marks a failed call.
    pub fn from_samples(samples: &[Option<f64>]) -> Self {
        let mut ok: Vec<f64> = samples.iter().flatten().copied().collect();
        let errors = samples.len() - ok.len();
        if ok.is_empty() {
            return Self {
                errors,
                ..Self::default()
            };
        }
        ok.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = ok.len();
        let sum: f64 = ok.iter().sum();
        Self {
            count: n,
            errors,
            avg_ms: sum / n as f64,
            min_ms: ok[0],
            max_ms: ok[n - 1],
            p95_ms: percentile_sorted(&ok, 95.0),
        }
    }

    /// `true` when at least one call succeeded.
    pub fn has_successes(&self) -> bool {
        self.count > 0
    }
}

/// Nearest-rank percentile of an ascending slice; `0.0` when empty.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

// ── Recommendation ─────────────────────────────────────────────────────────

/// Which backend the measurements favour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Recommendation {
    /// Prefer `backend`, which was `improvement_pct` percent faster on
    /// average (100 when the other side never succeeded).
    Prefer {
        /// The faster backend.
        backend: BackendTarget,
        /// `(slower - faster) / slower * 100`.
        improvement_pct: f64,
    },
    /// Neither backend produced a successful call.
    Inconclusive,
}

impl Recommendation {
    /// Decide between the REST and legacy measurements.
    ///
    /// Lower average wins; equal averages favour legacy.
    pub fn from_stats(rest: &LatencyStats, legacy: &LatencyStats) -> Self {
        match (rest.has_successes(), legacy.has_successes()) {
            (false, false) => Self::Inconclusive,
            (true, false) => Self::Prefer {
                backend: BackendTarget::Rest,
                improvement_pct: 100.0,
            },
            (false, true) => Self::Prefer {
                backend: BackendTarget::Legacy,
                improvement_pct: 100.0,
            },
            (true, true) => {
                let (backend, faster, slower) = if rest.avg_ms < legacy.avg_ms {
                    (BackendTarget::Rest, rest.avg_ms, legacy.avg_ms)
                } else {
                    (BackendTarget::Legacy, legacy.avg_ms, rest.avg_ms)
                };
                let improvement_pct = if slower > 0.0 {
                    (slower - faster) / slower * 100.0
                } else {
                    0.0
                };
                Self::Prefer {
                    backend,
                    improvement_pct,
                }
            }
        }
    }

    /// The favoured backend, if any.
    pub fn backend(&self) -> Option<BackendTarget> {
        match self {
            Self::Prefer { backend, .. } => Some(*backend),
            Self::Inconclusive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_exclude_failures() {
        let stats = LatencyStats::from_samples(&[Some(10.0), None, Some(30.0), None]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.errors, 2);
        assert!((stats.avg_ms - 20.0).abs() < f64::EPSILON);
        assert!((stats.min_ms - 10.0).abs() < f64::EPSILON);
        assert!((stats.max_ms - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_all_failed_are_zero() {
        let stats = LatencyStats::from_samples(&[None, None]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.p95_ms, 0.0);
        assert!(!stats.has_successes());
    }

    #[test]
    fn test_p95_nearest_rank() {
        let samples: Vec<Option<f64>> = (1..=20).map(|i| Some(i as f64)).collect();
        let stats = LatencyStats::from_samples(&samples);
        assert!((stats.p95_ms - 19.0).abs() < f64::EPSILON);
        assert_eq!(percentile_sorted(&[5.0], 95.0), 5.0);
        assert_eq!(percentile_sorted(&[], 95.0), 0.0);
    }

    #[test]
    fn test_recommendation_faster_wins() {
        let rest = LatencyStats::from_samples(&[Some(50.0)]);
        let legacy = LatencyStats::from_samples(&[Some(100.0)]);
        match Recommendation::from_stats(&rest, &legacy) {
            Recommendation::Prefer {
                backend,
                improvement_pct,
            } => {
                assert_eq!(backend, BackendTarget::Rest);
                assert!((improvement_pct - 50.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_recommendation_one_sided_and_inconclusive() {
        let ok = LatencyStats::from_samples(&[Some(80.0)]);
        let failed = LatencyStats::from_samples(&[None]);
        assert_eq!(
            Recommendation::from_stats(&failed, &ok).backend(),
            Some(BackendTarget::Legacy)
        );
        assert_eq!(
            Recommendation::from_stats(&failed, &failed),
            Recommendation::Inconclusive
        );
    }
}
