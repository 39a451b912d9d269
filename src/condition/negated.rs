use super::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::task::Task;
use async_trait::async_trait;
use std::sync::Arc;

/// Inverts the evaluation of another condition.
///
/// Useful for example to run a task only when the network is *not*
/// reachable. Mutual exclusivity and the dependency factory are forwarded to
/// the wrapped condition.
pub struct NegatedCondition {
    inner: Arc<dyn Condition>,
    name: String,
}

impl NegatedCondition {
    pub fn new(inner: Arc<dyn Condition>) -> Self {
        let name = format!("Not<{}>", inner.name());
        Self { inner, name }
    }
}

#[async_trait]
impl Condition for NegatedCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        self.inner.is_mutually_exclusive()
    }

    fn dependency_for_task(&self, task: &Task) -> Option<Task> {
        self.inner.dependency_for_task(task)
    }

    async fn evaluate(&self, task: &Task) -> ConditionResult {
        match self.inner.evaluate(task).await {
            // the wrapped condition succeeded, so this one fails
            ConditionResult::Satisfied => ConditionResult::Failed(
                TaskError::condition_failed(&self.name)
                    .with("negated_condition", self.inner.name()),
            ),
            ConditionResult::Failed(_) => ConditionResult::Satisfied,
        }
    }
}
