pub mod negated;
pub mod no_cancelled_dependencies;
pub mod permission;
pub mod reachability;

pub use negated::NegatedCondition;
pub use no_cancelled_dependencies::NoCancelledDependencies;
pub use permission::{AuthorizationService, PermissionCondition, PermissionStatus};
pub use reachability::ReachabilityCondition;

use crate::error::TaskError;
use crate::task::Task;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Outcome of evaluating a single condition
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionResult {
    Satisfied,
    Failed(TaskError),
}

impl ConditionResult {
    pub fn into_error(self) -> Option<TaskError> {
        match self {
            ConditionResult::Satisfied => None,
            ConditionResult::Failed(error) => Some(error),
        }
    }
}

/// An asynchronous predicate gating a task's readiness.
///
/// Conditions are attached to a task before it is enqueued. The owning queue
/// resolves each condition's optional dependency task at enqueue time, and
/// the task evaluates all of its conditions concurrently once every
/// predecessor has finished.
#[async_trait]
pub trait Condition: Send + Sync {
    /// The condition's name; doubles as the exclusivity category when the
    /// condition is mutually exclusive, and names `ConditionFailed` errors.
    fn name(&self) -> &str;

    /// Whether tasks gated by this condition may execute concurrently.
    /// When true, the owning queue registers the task under this condition's
    /// name with the [`ExclusivityController`](crate::ExclusivityController).
    fn is_mutually_exclusive(&self) -> bool {
        false
    }

    /// An optional prerequisite task, e.g. one that requests a permission so
    /// the condition can pass. Invoked once per gated task at enqueue time;
    /// the result is added as a predecessor and scheduled alongside.
    fn dependency_for_task(&self, _task: &Task) -> Option<Task> {
        None
    }

    /// Evaluate the condition against the gated task
    async fn evaluate(&self, task: &Task) -> ConditionResult;
}

/// Evaluate all conditions concurrently and collect the failures in
/// attachment order. The barrier resolves only after every condition has
/// reported.
pub(crate) async fn evaluate_all(conditions: &[Arc<dyn Condition>], task: &Task) -> Vec<TaskError> {
    let results = join_all(conditions.iter().map(|condition| condition.evaluate(task))).await;
    results
        .into_iter()
        .filter_map(ConditionResult::into_error)
        .collect()
}
