//! Switch notification hooks.

use tracing::info;

use super::SwitchRecord;

/// Observer notified after every registry transition.
///
/// Listeners run after the mutation has been committed and the registry
/// lock released; they cannot veto or reorder a switch.
pub trait SwitchListener: Send + Sync {
    /// Called once per committed [`SwitchRecord`].
    fn on_switch(&self, record: &SwitchRecord);
}

/// Logs every transition at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl SwitchListener for TracingListener {
    fn on_switch(&self, record: &SwitchRecord) {
        info!(
            operation = %record.operation,
            from = %record.from,
            to = %record.to,
            experiment_id = record.experiment_id.as_deref().unwrap_or("-"),
            "backend switched"
        );
    }
}

impl<F> SwitchListener for F
where
    F: Fn(&SwitchRecord) + Send + Sync,
{
    fn on_switch(&self, record: &SwitchRecord) {
        self(record)
    }
}
