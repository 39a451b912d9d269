use super::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::task::Task;
use async_trait::async_trait;

/// Requires that every direct predecessor ran to completion without being
/// cancelled. Attach it to propagate cancellation down a dependency chain:
/// the gated task fails (and skips its work) instead of running against
/// half-finished inputs.
#[derive(Default)]
pub struct NoCancelledDependencies;

impl NoCancelledDependencies {
    pub const NAME: &'static str = "NoCancelledDependencies";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Condition for NoCancelledDependencies {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn evaluate(&self, task: &Task) -> ConditionResult {
        let cancelled: Vec<String> = task
            .dependencies()
            .into_iter()
            .filter(|dep| dep.is_cancelled())
            .map(|dep| dep.name().to_string())
            .collect();

        if cancelled.is_empty() {
            ConditionResult::Satisfied
        } else {
            ConditionResult::Failed(
                TaskError::condition_failed(Self::NAME).with("cancelled_dependencies", cancelled),
            )
        }
    }
}
