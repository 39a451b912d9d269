use super::Observer;
use crate::error::TaskError;
use crate::task::Task;
use std::time::Duration;
use tracing::warn;

/// Cancels a task with an `ExecutionFailed` error if it has neither finished
/// nor been cancelled by the deadline, measured from the moment the work
/// routine starts.
///
/// The cancellation is cooperative like any other: the work routine still has
/// to observe the token and call `finish`.
pub struct TimeoutObserver {
    timeout: Duration,
}

impl TimeoutObserver {
    pub const TIMEOUT_KEY: &'static str = "timeout_secs";

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Observer for TimeoutObserver {
    fn started(&self, task: &Task) {
        let task = task.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !task.is_finished() && !task.is_cancelled() {
                warn!(
                    "task `{}` timed out after {:.1}s",
                    task.name(),
                    timeout.as_secs_f64()
                );
                task.cancel_with_error(
                    TaskError::execution_failed()
                        .with(Self::TIMEOUT_KEY, timeout.as_secs_f64()),
                );
            }
        });
    }
}
