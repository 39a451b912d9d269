use crate::task::Task;
use tracing::trace;

/// The external concurrent scheduler a [`TaskQueue`](crate::TaskQueue) hands
/// tasks to.
///
/// The queue does all of the wiring (condition dependencies, exclusivity
/// chains, delegate plumbing); the scheduler only has to run each submitted
/// task once it becomes ready. Implementations must honor the readiness
/// protocol: a task may not run until every predecessor has finished and its
/// conditions have been evaluated.
pub trait Scheduler: Send + Sync {
    /// Take ownership of a wired, pending task and drive it to completion
    fn submit(&self, task: Task);
}

/// Default scheduler backed by the tokio runtime's shared worker pool.
///
/// Each submitted task gets a lightweight driver that waits for the task's
/// predecessors, kicks off lazy condition evaluation, then runs the task.
/// Cancellation short-circuits the wait, so a cancelled pending task finishes
/// promptly without its work routine running.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, task: Task) {
        trace!("driver spawned for task `{}`", task.name());
        tokio::spawn(async move {
            task.await_ready().await;
            task.run().await;
        });
    }
}
