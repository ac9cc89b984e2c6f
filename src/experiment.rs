//! # Stage: A/B Test Controller
//!
//! ## Responsibility
//! Run traffic-split experiments between the legacy and REST backends for
//! one operation at a time: pick an arm, collect per-arm request, error
//! and latency counts, and produce a verdict when the experiment ends.
//!
//! ## Guarantees
//! - Thread-safe: experiments live in a concurrent map keyed by id
//! - At most one experiment per operation, claimed atomically before the
//!   registry is switched
//! - Deterministic verdicts: [`decide`] is a pure function of the results
//! - Unknown ids are silent no-ops for metric recording and queries
//! - Ending an experiment leaves the registry in a known state (restored
//!   or winner applied) and removes the experiment
//!
//! ## NOT Responsible For
//! - Statistical significance testing (confidence is a relative score gap)
//! - Executing the traffic itself (callers use the router)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::registry::{RegistryError, SwitchRegistry};
use crate::{BackendTarget, OperationKey};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced by the A/B test controller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExperimentError {
    /// `traffic_split` was outside `[0, 1]`.
    #[error("traffic split {0} is outside [0, 1]")]
    InvalidSplit(f64),

    /// Another experiment already targets this operation.
    #[error("operation '{operation}' already has running experiment '{id}'")]
    AlreadyRunning {
        /// The contested operation.
        operation: OperationKey,
        /// The running experiment.
        id: String,
    },

    /// The registry refused the switch.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// Arms and metrics
// ---------------------------------------------------------------------------

/// One side of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    /// The legacy backend (control).
    Legacy,
    /// The REST backend (treatment).
    Rest,
}

impl Arm {
    /// Backend served by this arm.
    pub fn target(self) -> BackendTarget {
        match self {
            Self::Legacy => BackendTarget::Legacy,
            Self::Rest => BackendTarget::Rest,
        }
    }
}

impl TryFrom<BackendTarget> for Arm {
    type Error = BackendTarget;

    fn try_from(target: BackendTarget) -> Result<Self, Self::Error> {
        match target {
            BackendTarget::Legacy => Ok(Self::Legacy),
            BackendTarget::Rest => Ok(Self::Rest),
            other => Err(other),
        }
    }
}

/// A single observation for one arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    /// A call took this many milliseconds.
    Latency(f64),
    /// A call failed.
    Error,
    /// A call succeeded.
    Success,
}

/// Raw per-arm counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmStats {
    /// Requests observed (successes + errors).
    pub requests: u64,
    /// Failed requests.
    pub errors: u64,
    /// Sum of recorded latencies in milliseconds.
    pub total_latency_ms: f64,
}

impl ArmStats {
    fn record(&mut self, metric: MetricKind) {
        match metric {
            MetricKind::Latency(ms) => self.total_latency_ms += ms.max(0.0),
            MetricKind::Error => {
                self.errors += 1;
                self.requests += 1;
            }
            MetricKind::Success => self.requests += 1,
        }
    }

    /// Derived averages.
    pub fn summarise(&self) -> ArmResults {
        let (avg_latency_ms, error_rate) = if self.requests == 0 {
            (0.0, 0.0)
        } else {
            let n = self.requests as f64;
            (self.total_latency_ms / n, self.errors as f64 / n)
        };
        ArmResults {
            requests: self.requests,
            errors: self.errors,
            avg_latency_ms,
            error_rate,
        }
    }
}

/// Per-arm derived results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmResults {
    /// Requests observed.
    pub requests: u64,
    /// Failed requests.
    pub errors: u64,
    /// Mean latency in ms, `0` with no requests.
    pub avg_latency_ms: f64,
    /// `errors / requests`, `0` with no requests.
    pub error_rate: f64,
}

/// Results of both arms of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    /// Experiment id.
    pub id: String,
    /// Operation under test.
    pub operation: OperationKey,
    /// Control arm.
    pub legacy: ArmResults,
    /// Treatment arm.
    pub rest: ArmResults,
}

/// Outcome of an ended experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentVerdict {
    /// Arm with the higher score; ties go to `Legacy`.
    pub winner: Arm,
    /// Relative score gap in `[0, 1]`.
    pub confidence: f64,
    /// The results the verdict was computed from.
    pub results: ExperimentResults,
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// Options for [`AbTestController::start`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentOptions {
    /// How long the experiment should run.
    pub duration: Duration,
    /// Probability of drawing the REST arm, in `[0, 1]`.
    pub traffic_split: f64,
    /// Names of the metrics the caller intends to record.
    pub metrics: Vec<String>,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(3600),
            traffic_split: 0.5,
            metrics: vec!["latency".into(), "errors".into()],
        }
    }
}

/// What [`AbTestController::end`] does to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndPolicy {
    /// Put the operation back on its pre-experiment target.
    #[default]
    Restore,
    /// Move the operation to the winning arm.
    ApplyWinner,
}

/// A running experiment.
#[derive(Debug, Clone, Serialize)]
pub struct Experiment {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Operation under test.
    pub operation: OperationKey,
    /// Start time.
    pub start_time: DateTime<Utc>,
    /// Planned end time.
    pub end_time: DateTime<Utc>,
    /// Probability of the REST arm.
    pub traffic_split: f64,
    /// Metric names declared at start.
    pub metrics: Vec<String>,
    /// Arm the registry was switched to at start.
    pub assigned: Arm,
    /// Target before the experiment started.
    pub previous_target: BackendTarget,
    /// Control arm counters.
    pub legacy: ArmStats,
    /// Treatment arm counters.
    pub rest: ArmStats,
}

impl Experiment {
    /// Derived results for both arms.
    pub fn results(&self) -> ExperimentResults {
        ExperimentResults {
            id: self.id.clone(),
            operation: self.operation.clone(),
            legacy: self.legacy.summarise(),
            rest: self.rest.summarise(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Score of one arm: `(1 - error_rate) / max(avg_latency_ms, 1)`.
///
/// An arm without requests scores `0`.
pub fn arm_score(arm: &ArmResults) -> f64 {
    if arm.requests == 0 {
        return 0.0;
    }
    (1.0 - arm.error_rate) / arm.avg_latency_ms.max(1.0)
}

/// Compute the verdict for frozen results.
///
/// # Panics
///
/// This function never panics.
pub fn decide(results: &ExperimentResults) -> ExperimentVerdict {
    let legacy = arm_score(&results.legacy);
    let rest = arm_score(&results.rest);
    let winner = if rest > legacy { Arm::Rest } else { Arm::Legacy };
    let top = legacy.max(rest);
    let confidence = if top <= 0.0 {
        0.0
    } else {
        (legacy - rest).abs() / top
    };
    ExperimentVerdict {
        winner,
        confidence,
        results: results.clone(),
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Thread-safe controller of running experiments.
///
/// # Example
/// ```rust,ignore
/// let controller = AbTestController::new(registry.clone());
/// let id = controller.start(&OperationKey::function("getTeams"), ExperimentOptions::default())?;
/// controller.record_metric(&id, Arm::Rest, MetricKind::Latency(42.0));
/// controller.record_metric(&id, Arm::Rest, MetricKind::Success);
/// let verdict = controller.end(&id)?;
/// ```
pub struct AbTestController {
    registry: Arc<SwitchRegistry>,
    experiments: DashMap<String, Experiment>,
    /// Operation under test → experiment id.
    claims: DashMap<OperationKey, String>,
    policy: EndPolicy,
}

impl std::fmt::Debug for AbTestController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbTestController")
            .field("active", &self.experiments.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl AbTestController {
    /// Create a controller that switches operations in `registry`.
    pub fn new(registry: Arc<SwitchRegistry>) -> Self {
        Self {
            registry,
            experiments: DashMap::new(),
            claims: DashMap::new(),
            policy: EndPolicy::default(),
        }
    }

    /// Set what [`end`](Self::end) does to the registry.
    pub fn with_end_policy(mut self, policy: EndPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start an experiment on `operation` and return its id.
    ///
    /// Draws the REST arm with probability `traffic_split` and switches the
    /// operation to the drawn arm, tagging the record with the id.
    ///
    /// # Errors
    ///
    /// - [`ExperimentError::InvalidSplit`] for a split outside `[0, 1]`
    /// - [`ExperimentError::AlreadyRunning`] if `operation` is under test
    /// - [`ExperimentError::Registry`] if the switch is rejected
    pub fn start(
        &self,
        operation: &OperationKey,
        options: ExperimentOptions,
    ) -> Result<String, ExperimentError> {
        let split = options.traffic_split;
        if !(0.0..=1.0).contains(&split) {
            return Err(ExperimentError::InvalidSplit(split));
        }

        let id = Uuid::new_v4().to_string();
        match self.claims.entry(operation.clone()) {
            Entry::Occupied(running) => {
                return Err(ExperimentError::AlreadyRunning {
                    operation: operation.clone(),
                    id: running.get().clone(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let assigned = draw(split);
        let previous_target = match self
            .registry
            .switch_to(operation, assigned.target(), Some(&id))
        {
            Ok(previous) => previous,
            Err(e) => {
                self.claims.remove_if(operation, |_, claimed| *claimed == id);
                return Err(e.into());
            }
        };

        let start_time = Utc::now();
        let end_time = chrono::Duration::from_std(options.duration)
            .ok()
            .and_then(|d| start_time.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        info!(
            experiment_id = %id,
            operation = %operation,
            traffic_split = split,
            arm = ?assigned,
            "experiment started"
        );

        self.experiments.insert(
            id.clone(),
            Experiment {
                id: id.clone(),
                operation: operation.clone(),
                start_time,
                end_time,
                traffic_split: split,
                metrics: options.metrics,
                assigned,
                previous_target,
                legacy: ArmStats::default(),
                rest: ArmStats::default(),
            },
        );
        Ok(id)
    }

    /// Record one observation. Unknown ids are ignored.
    pub fn record_metric(&self, id: &str, arm: Arm, metric: MetricKind) {
        match self.experiments.get_mut(id) {
            Some(mut experiment) => match arm {
                Arm::Legacy => experiment.legacy.record(metric),
                Arm::Rest => experiment.rest.record(metric),
            },
            None => debug!(experiment_id = id, "metric for unknown experiment ignored"),
        }
    }

    /// Draw an arm for one live request according to the split.
    pub fn route_arm(&self, id: &str) -> Option<Arm> {
        self.experiments.get(id).map(|e| draw(e.traffic_split))
    }

    /// Current results, or `None` for an unknown id.
    pub fn results(&self, id: &str) -> Option<ExperimentResults> {
        self.experiments.get(id).map(|e| e.results())
    }

    /// End the experiment using the controller's [`EndPolicy`].
    ///
    /// Returns `Ok(None)` for an unknown id.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Registry`] if the final switch is rejected.
    pub fn end(&self, id: &str) -> Result<Option<ExperimentVerdict>, ExperimentError> {
        self.end_with(id, self.policy)
    }

    /// End the experiment with an explicit policy.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Registry`] if the final switch is rejected.
    pub fn end_with(
        &self,
        id: &str,
        policy: EndPolicy,
    ) -> Result<Option<ExperimentVerdict>, ExperimentError> {
        let Some((_, experiment)) = self.experiments.remove(id) else {
            return Ok(None);
        };
        let verdict = decide(&experiment.results());

        let target = match policy {
            EndPolicy::Restore => experiment.previous_target,
            EndPolicy::ApplyWinner => verdict.winner.target(),
        };
        let switched = self
            .registry
            .switch_to(&experiment.operation, target, Some(id));
        self.claims
            .remove_if(&experiment.operation, |_, claimed| claimed == id);
        switched?;

        info!(
            experiment_id = id,
            operation = %experiment.operation,
            winner = ?verdict.winner,
            confidence = verdict.confidence,
            applied = %target,
            "experiment ended"
        );
        Ok(Some(verdict))
    }

    /// Snapshot of every running experiment.
    pub fn active(&self) -> Vec<Experiment> {
        self.experiments.iter().map(|e| e.value().clone()).collect()
    }

    /// Ids of running experiments past their planned end time.
    pub fn expired(&self) -> Vec<String> {
        let now = Utc::now();
        self.experiments
            .iter()
            .filter(|e| e.value().end_time <= now)
            .map(|e| e.key().clone())
            .collect()
    }
}

fn draw(split: f64) -> Arm {
    if rand::thread_rng().gen_bool(split) {
        Arm::Rest
    } else {
        Arm::Legacy
    }
}
