pub mod activity;
pub mod block;
pub mod timeout;

pub use activity::{ActivityIndicator, ActivityObserver};
pub use block::BlockObserver;
pub use timeout::TimeoutObserver;

use crate::error::TaskError;
use crate::task::Task;

/// Lifecycle hooks attached to a task for cross-cutting concerns (UI
/// indicators, timeouts, delegate bridging) without touching the task's work
/// routine.
///
/// Hooks run synchronously, in attachment order, on whichever thread raises
/// the event; they must not block indefinitely.
pub trait Observer: Send + Sync {
    /// The task's work routine is about to run
    fn started(&self, _task: &Task) {}

    /// The task handed off a newly discovered task for scheduling
    fn produced(&self, _task: &Task, _new_task: &Task) {}

    /// The task reached its terminal state, with the merged error list
    fn finished(&self, _task: &Task, _errors: &[TaskError]) {}
}
