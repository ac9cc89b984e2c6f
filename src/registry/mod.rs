//! # Stage: Switch Registry
//!
//! ## Responsibility
//! Own the current backend target of every operation, record each
//! transition in a bounded history, and provide rollback, reset and batch
//! switching on top of that history.
//!
//! ## Guarantees
//! - Thread-safe: a status mutation and its history append happen in one
//!   critical section
//! - Bounded: history holds at most `capacity` records; trimming the oldest
//!   record is the only eviction
//! - Consistent: a record's `from` is always the status immediately before it
//! - Every operation has a target: unswitched operations report the default
//!
//! ## NOT Responsible For
//! - Executing operations (see `routing`)
//! - Persisting state across restarts

pub mod listener;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::MigratorConfig;
use crate::{metrics, BackendTarget, OperationKey};

pub use listener::{SwitchListener, TracingListener};

/// Prefix of the tag carried by switches a performance comparison makes.
///
/// A comparison always ends where it started, so [`SwitchRegistry::rollback`]
/// skips these records.
pub const COMPARISON_TAG_PREFIX: &str = "comparison:";

/// Default number of records kept in the history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Operations every fresh registry knows about, all served by the default
/// target until switched.
pub const DEFAULT_ENTITIES: &[&str] = &[
    "Users",
    "Teams",
    "Assessment",
    "CoachingSession",
    "Goal",
    "Notification",
];

/// Functions every fresh registry knows about.
pub const DEFAULT_FUNCTIONS: &[&str] = &[
    "generateAICoaching",
    "createAssessment",
    "getUserProfile",
    "getTeams",
    "getUserAnalytics",
];

// ── Errors ─────────────────────────────────────────────────────────────────

/// Errors produced by the switch registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Internal lock was poisoned by a panicking thread.
    #[error("switch registry lock poisoned")]
    LockPoisoned,

    /// The operation key cannot be registered.
    #[error("invalid operation '{0}': name must not be empty")]
    InvalidOperation(String),
}

// ── Records ────────────────────────────────────────────────────────────────

/// One committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    /// Operation that moved.
    pub operation: OperationKey,
    /// Target before the switch.
    pub from: BackendTarget,
    /// Target after the switch.
    pub to: BackendTarget,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
    /// Experiment that caused the switch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

impl SwitchRecord {
    /// Whether a performance comparison made this switch.
    pub fn is_comparison(&self) -> bool {
        self.experiment_id
            .as_deref()
            .is_some_and(|id| id.starts_with(COMPARISON_TAG_PREFIX))
    }
}

/// How [`SwitchRegistry::batch_switch`] schedules its switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// All switches are polled concurrently.
    #[default]
    Parallel,
    /// Switches run one after another in input order.
    Sequential,
}

impl From<bool> for BatchMode {
    /// `true` means parallel, matching `registry.batch_parallel`.
    fn from(parallel: bool) -> Self {
        if parallel {
            Self::Parallel
        } else {
            Self::Sequential
        }
    }
}

/// Per-operation outcome of a batch switch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// The operation.
    pub operation: OperationKey,
    /// Previous target on success, the rejection otherwise.
    pub result: Result<BackendTarget, RegistryError>,
}

/// Result of a batch switch, one entry per input operation in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSwitchReport {
    /// Outcomes in input order.
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchSwitchReport {
    /// Operations that switched (or were already at the target).
    pub fn succeeded(&self) -> Vec<&OperationKey> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| &o.operation)
            .collect()
    }

    /// Operations that were rejected, with the reason.
    pub fn failed(&self) -> Vec<(&OperationKey, &RegistryError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.operation, e)))
            .collect()
    }

    /// Whether every operation succeeded.
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Migration progress across all known operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationSummary {
    /// Number of known operations.
    pub total: usize,
    /// Operations per current target.
    pub per_target: BTreeMap<BackendTarget, usize>,
    /// Share of operations not served by the legacy backend, 0–100.
    pub migrated_pct: f64,
    /// Records currently held in history.
    pub history_len: usize,
}

// ── Registry ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct RegistryInner {
    statuses: HashMap<OperationKey, BackendTarget>,
    history: VecDeque<SwitchRecord>,
}

/// Thread-safe owner of per-operation backend targets.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
///
/// # Example
/// ```rust
/// use backend_migrator::{BackendTarget, OperationKey, SwitchRegistry};
///
/// let registry = SwitchRegistry::with_defaults();
/// let users = OperationKey::entity("Users");
/// registry.switch_to(&users, BackendTarget::Rest, None).ok();
/// assert_eq!(registry.get_status(&users).ok(), Some(BackendTarget::Rest));
/// ```
pub struct SwitchRegistry {
    inner: Mutex<RegistryInner>,
    listeners: RwLock<Vec<Arc<dyn SwitchListener>>>,
    default_target: BackendTarget,
    capacity: usize,
    batch_mode: BatchMode,
}

impl std::fmt::Debug for SwitchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchRegistry")
            .field("default_target", &self.default_target)
            .field("capacity", &self.capacity)
            .field("batch_mode", &self.batch_mode)
            .finish_non_exhaustive()
    }
}

impl Default for SwitchRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SwitchRegistry {
    /// An empty registry.
    ///
    /// A `capacity` of zero is raised to one.
    pub fn new(default_target: BackendTarget, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                statuses: HashMap::new(),
                history: VecDeque::new(),
            }),
            listeners: RwLock::new(Vec::new()),
            default_target,
            capacity: capacity.max(1),
            batch_mode: BatchMode::default(),
        }
    }

    /// Set how [`batch_switch`](Self::batch_switch) schedules switches.
    pub fn with_batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = mode;
        self
    }

    /// A registry seeded with the built-in operation table, all on
    /// `Legacy`, with a history of 1000 records.
    pub fn with_defaults() -> Self {
        let registry = Self::new(BackendTarget::Legacy, DEFAULT_HISTORY_CAPACITY);
        registry.seed(default_table(BackendTarget::Legacy));
        registry
    }

    /// A registry built from configuration: default target, history
    /// capacity, batch mode, built-in table, then the `[registry.initial]`
    /// overrides.
    ///
    /// Seeding does not produce history records.
    pub fn from_config(config: &MigratorConfig) -> Self {
        let default_target = config.routing.default_target;
        let registry = Self::new(default_target, config.registry.history_capacity)
            .with_batch_mode(BatchMode::from(config.registry.batch_parallel));
        registry.seed(default_table(default_target));
        registry.seed(config.registry.initial.clone());
        registry
    }

    fn seed(&self, table: impl IntoIterator<Item = (OperationKey, BackendTarget)>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.statuses.extend(table);
        }
    }

    /// Register a transition observer.
    pub fn add_listener(&self, listener: Arc<dyn SwitchListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    /// How batch switches are scheduled.
    pub fn batch_mode(&self) -> BatchMode {
        self.batch_mode
    }

    /// Target used for operations never switched.
    pub fn default_target(&self) -> BackendTarget {
        self.default_target
    }

    /// Maximum number of history records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current target of `operation`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::LockPoisoned`] if the internal lock is poisoned.
    pub fn get_status(&self, operation: &OperationKey) -> Result<BackendTarget, RegistryError> {
        let inner = self.lock()?;
        Ok(inner
            .statuses
            .get(operation)
            .copied()
            .unwrap_or(self.default_target))
    }

    /// Set `operation` to `target`, always producing one record.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidOperation`] for an empty operation name
    /// - [`RegistryError::LockPoisoned`] if the internal lock is poisoned
    pub fn set_status(
        &self,
        operation: &OperationKey,
        target: BackendTarget,
    ) -> Result<SwitchRecord, RegistryError> {
        validate(operation)?;
        let record = {
            let mut inner = self.lock()?;
            self.commit(&mut inner, operation, target, None)
        };
        self.notify(&record);
        Ok(record)
    }

    /// Move `operation` to `target` and return the previous target.
    ///
    /// Switching to the current target is a no-op: nothing is recorded and
    /// no listener fires.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidOperation`] for an empty operation name
    /// - [`RegistryError::LockPoisoned`] if the internal lock is poisoned
    pub fn switch_to(
        &self,
        operation: &OperationKey,
        target: BackendTarget,
        experiment_id: Option<&str>,
    ) -> Result<BackendTarget, RegistryError> {
        validate(operation)?;
        let (previous, record) = {
            let mut inner = self.lock()?;
            let previous = inner
                .statuses
                .get(operation)
                .copied()
                .unwrap_or(self.default_target);
            if previous == target {
                debug!(operation = %operation, target = %target, "already at target");
                return Ok(previous);
            }
            let record = self.commit(&mut inner, operation, target, experiment_id);
            (previous, record)
        };
        self.notify(&record);
        Ok(previous)
    }

    /// Undo the most recent transition of `operation`.
    ///
    /// Applies the latest record's `from` as a new transition, ignoring
    /// records tagged by a performance comparison. Returns `None` when the
    /// operation has no such history.
    ///
    /// # Errors
    ///
    /// [`RegistryError::LockPoisoned`] if the internal lock is poisoned.
    pub fn rollback(&self, operation: &OperationKey) -> Result<Option<SwitchRecord>, RegistryError> {
        let record = {
            let mut inner = self.lock()?;
            let Some(last) = inner
                .history
                .iter()
                .rev()
                .find(|r| &r.operation == operation && !r.is_comparison())
            else {
                debug!(operation = %operation, "rollback without history");
                return Ok(None);
            };
            let restore = last.from;
            self.commit(&mut inner, operation, restore, None)
        };
        self.notify(&record);
        Ok(Some(record))
    }

    /// Return `operation` to the default target.
    ///
    /// Returns the record produced, or `None` if it was already there.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidOperation`] for an empty operation name
    /// - [`RegistryError::LockPoisoned`] if the internal lock is poisoned
    pub fn reset(&self, operation: &OperationKey) -> Result<Option<SwitchRecord>, RegistryError> {
        validate(operation)?;
        let record = {
            let mut inner = self.lock()?;
            let current = inner
                .statuses
                .get(operation)
                .copied()
                .unwrap_or(self.default_target);
            if current == self.default_target {
                return Ok(None);
            }
            self.commit(&mut inner, operation, self.default_target, None)
        };
        self.notify(&record);
        Ok(Some(record))
    }

    /// Switch many operations to `target` using the configured
    /// [`BatchMode`].
    ///
    /// A rejected operation never aborts the batch; every input gets an
    /// outcome, in input order.
    pub async fn batch_switch(
        &self,
        operations: &[OperationKey],
        target: BackendTarget,
    ) -> BatchSwitchReport {
        self.batch_switch_with(operations, target, self.batch_mode)
            .await
    }

    /// [`batch_switch`](Self::batch_switch) with an explicit mode.
    pub async fn batch_switch_with(
        &self,
        operations: &[OperationKey],
        target: BackendTarget,
        mode: BatchMode,
    ) -> BatchSwitchReport {
        let switch_one = |operation: OperationKey| async move {
            let result = self.switch_to(&operation, target, None);
            BatchOutcome { operation, result }
        };

        let outcomes = match mode {
            BatchMode::Parallel => {
                futures::future::join_all(operations.iter().cloned().map(switch_one)).await
            }
            BatchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(operations.len());
                for operation in operations.iter().cloned() {
                    outcomes.push(switch_one(operation).await);
                }
                outcomes
            }
        };

        let report = BatchSwitchReport { outcomes };
        debug!(
            target = %target,
            ok = report.succeeded().len(),
            failed = report.failed().len(),
            "batch switch finished"
        );
        report
    }

    /// History records, oldest first, optionally for one operation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::LockPoisoned`] if the internal lock is poisoned.
    pub fn history(&self, operation: Option<&OperationKey>) -> Result<Vec<SwitchRecord>, RegistryError> {
        let inner = self.lock()?;
        Ok(inner
            .history
            .iter()
            .filter(|r| operation.map_or(true, |op| &r.operation == op))
            .cloned()
            .collect())
    }

    /// Snapshot of every known operation's target.
    ///
    /// # Errors
    ///
    /// [`RegistryError::LockPoisoned`] if the internal lock is poisoned.
    pub fn all_statuses(&self) -> Result<BTreeMap<OperationKey, BackendTarget>, RegistryError> {
        let inner = self.lock()?;
        Ok(inner
            .statuses
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    /// Migration progress over every known operation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::LockPoisoned`] if the internal lock is poisoned.
    pub fn summary(&self) -> Result<MigrationSummary, RegistryError> {
        let inner = self.lock()?;
        let total = inner.statuses.len();
        let mut per_target = BTreeMap::new();
        for target in inner.statuses.values() {
            *per_target.entry(*target).or_insert(0usize) += 1;
        }
        let migrated = total - per_target.get(&BackendTarget::Legacy).copied().unwrap_or(0);
        let migrated_pct = if total == 0 {
            0.0
        } else {
            migrated as f64 / total as f64 * 100.0
        };
        Ok(MigrationSummary {
            total,
            per_target,
            migrated_pct,
            history_len: inner.history.len(),
        })
    }

    // ── internals ──────────────────────────────────────────────────────

    /// Apply and record one transition. Caller holds the lock.
    fn commit(
        &self,
        inner: &mut RegistryInner,
        operation: &OperationKey,
        target: BackendTarget,
        experiment_id: Option<&str>,
    ) -> SwitchRecord {
        let from = inner
            .statuses
            .insert(operation.clone(), target)
            .unwrap_or(self.default_target);
        let record = SwitchRecord {
            operation: operation.clone(),
            from,
            to: target,
            timestamp: Utc::now(),
            experiment_id: experiment_id.map(str::to_string),
        };
        inner.history.push_back(record.clone());
        while inner.history.len() > self.capacity {
            inner.history.pop_front();
        }
        metrics::inc_switch(target.as_str());
        record
    }

    fn notify(&self, record: &SwitchRecord) {
        let listeners = match self.listeners.read() {
            Ok(l) => l.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener.on_switch(record);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryInner>, RegistryError> {
        self.inner.lock().map_err(|_| RegistryError::LockPoisoned)
    }
}

fn validate(operation: &OperationKey) -> Result<(), RegistryError> {
    if operation.name().trim().is_empty() {
        return Err(RegistryError::InvalidOperation(operation.to_string()));
    }
    Ok(())
}

fn default_table(target: BackendTarget) -> Vec<(OperationKey, BackendTarget)> {
    DEFAULT_ENTITIES
        .iter()
        .map(|e| OperationKey::entity(*e))
        .chain(DEFAULT_FUNCTIONS.iter().map(|f| OperationKey::function(*f)))
        .map(|k| (k, target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn users() -> OperationKey {
        OperationKey::entity("Users")
    }

    #[test]
    fn test_unswitched_operation_returns_default() {
        let registry = SwitchRegistry::new(BackendTarget::Legacy, 10);
        assert_eq!(
            registry.get_status(&OperationKey::function("neverSeen")).unwrap(),
            BackendTarget::Legacy
        );
        let rest_default = SwitchRegistry::new(BackendTarget::Rest, 10);
        assert_eq!(
            rest_default.get_status(&users()).unwrap(),
            BackendTarget::Rest
        );
    }

    #[test]
    fn test_switch_returns_previous_and_records_from() {
        let registry = SwitchRegistry::with_defaults();
        let prev = registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        assert_eq!(prev, BackendTarget::Legacy);
        let history = registry.history(Some(&users())).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, BackendTarget::Legacy);
        assert_eq!(history[0].to, BackendTarget::Rest);
    }

    #[test]
    fn test_switch_to_same_target_is_noop() {
        let registry = SwitchRegistry::with_defaults();
        registry.switch_to(&users(), BackendTarget::Legacy, None).unwrap();
        assert!(registry.history(None).unwrap().is_empty());
    }

    #[test]
    fn test_set_status_always_records() {
        let registry = SwitchRegistry::with_defaults();
        registry.set_status(&users(), BackendTarget::Legacy).unwrap();
        assert_eq!(registry.history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_rollback_restores_second_to_last() {
        let registry = SwitchRegistry::with_defaults();
        registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        registry
            .switch_to(&users(), BackendTarget::Secondary, None)
            .unwrap();

        let record = registry.rollback(&users()).unwrap().unwrap();
        assert_eq!(record.from, BackendTarget::Secondary);
        assert_eq!(record.to, BackendTarget::Rest);
        assert_eq!(registry.get_status(&users()).unwrap(), BackendTarget::Rest);
    }

    #[test]
    fn test_rollback_without_history_is_none() {
        let registry = SwitchRegistry::with_defaults();
        assert_eq!(
            registry.rollback(&OperationKey::function("ghost")).unwrap(),
            None
        );
        assert!(registry.history(None).unwrap().is_empty());
    }

    #[test]
    fn test_rollback_skips_comparison_records() {
        let registry = SwitchRegistry::with_defaults();
        registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        registry
            .switch_to(&users(), BackendTarget::Legacy, Some("comparison:c1"))
            .unwrap();
        registry
            .switch_to(&users(), BackendTarget::Rest, Some("comparison:c1"))
            .unwrap();

        let record = registry.rollback(&users()).unwrap().unwrap();
        assert_eq!(record.to, BackendTarget::Legacy);
        assert!(!record.is_comparison());
        assert_eq!(registry.get_status(&users()).unwrap(), BackendTarget::Legacy);
    }

    #[test]
    fn test_history_is_trimmed_to_capacity() {
        let registry = SwitchRegistry::new(BackendTarget::Legacy, 3);
        for i in 0..5 {
            let target = if i % 2 == 0 {
                BackendTarget::Rest
            } else {
                BackendTarget::Legacy
            };
            registry.switch_to(&users(), target, None).unwrap();
        }
        let history = registry.history(None).unwrap();
        assert_eq!(history.len(), 3);
        // Oldest surviving record is the third switch (Legacy -> Rest).
        assert_eq!(history[0].to, BackendTarget::Rest);
        for pair in history.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[test]
    fn test_empty_operation_rejected() {
        let registry = SwitchRegistry::with_defaults();
        let err = registry
            .switch_to(&OperationKey::entity(""), BackendTarget::Rest, None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidOperation(_)));
    }

    #[test]
    fn test_reset_restores_default_and_records() {
        let registry = SwitchRegistry::with_defaults();
        registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        let record = registry.reset(&users()).unwrap().unwrap();
        assert_eq!(record.to, BackendTarget::Legacy);
        assert_eq!(registry.reset(&users()).unwrap(), None);
    }

    #[test]
    fn test_listener_fires_once_per_transition() {
        let registry = SwitchRegistry::with_defaults();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        registry.add_listener(Arc::new(move |_: &SwitchRecord| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        registry.add_listener(Arc::new(TracingListener));

        registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        registry.rollback(&users()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_experiment_id_is_recorded() {
        let registry = SwitchRegistry::with_defaults();
        registry
            .switch_to(&users(), BackendTarget::Rest, Some("exp-1"))
            .unwrap();
        let history = registry.history(None).unwrap();
        assert_eq!(history[0].experiment_id.as_deref(), Some("exp-1"));
    }

    #[tokio::test]
    async fn test_batch_switch_continues_past_failures() {
        for mode in [BatchMode::Parallel, BatchMode::Sequential] {
            let registry = SwitchRegistry::with_defaults();
            let ops = vec![
                users(),
                OperationKey::entity(""),
                OperationKey::function("getTeams"),
            ];
            let report = registry
                .batch_switch_with(&ops, BackendTarget::Rest, mode)
                .await;
            assert_eq!(report.outcomes.len(), 3);
            assert_eq!(report.succeeded().len(), 2);
            assert_eq!(report.failed().len(), 1);
            assert!(!report.all_ok());
            assert_eq!(
                registry
                    .get_status(&OperationKey::function("getTeams"))
                    .unwrap(),
                BackendTarget::Rest
            );
        }
    }

    #[test]
    fn test_summary_counts_migrated_share() {
        let registry = SwitchRegistry::new(BackendTarget::Legacy, 10);
        registry.switch_to(&users(), BackendTarget::Rest, None).unwrap();
        registry
            .switch_to(&OperationKey::function("getTeams"), BackendTarget::Rest, None)
            .unwrap();
        registry
            .set_status(&OperationKey::entity("Goal"), BackendTarget::Legacy)
            .unwrap();
        registry
            .set_status(&OperationKey::entity("Teams"), BackendTarget::Legacy)
            .unwrap();

        let summary = registry.summary().unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.per_target.get(&BackendTarget::Rest), Some(&2));
        assert!((summary.migrated_pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_config_applies_seed_table() {
        let mut config = MigratorConfig::default();
        config
            .registry
            .initial
            .insert(users(), BackendTarget::Rest);
        config.registry.history_capacity = 5;
        config.registry.batch_parallel = false;
        let registry = SwitchRegistry::from_config(&config);
        assert_eq!(registry.get_status(&users()).unwrap(), BackendTarget::Rest);
        assert_eq!(registry.capacity(), 5);
        assert_eq!(registry.batch_mode(), BatchMode::Sequential);
        assert_eq!(SwitchRegistry::with_defaults().batch_mode(), BatchMode::Parallel);
        assert!(registry.history(None).unwrap().is_empty());
    }
}
