use serde::{Deserialize, Serialize};

/// Lifecycle states of a [`Task`](crate::Task), in strict forward order.
///
/// State only ever moves forward through this sequence, with one exception:
/// a task cancelled while `Initialized`, `Pending`, or `Ready` fast-forwards
/// straight to `Finishing` without its work routine ever running.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    /// Freshly created; conditions, observers, and dependencies may be added
    Initialized,
    /// Enqueued; ready to begin evaluating conditions once predecessors finish
    Pending,
    /// Conditions are being evaluated
    EvaluatingConditions,
    /// All conditions evaluated; the task can be picked up for execution
    Ready,
    /// The work routine is running
    Executing,
    /// `finish` has been called but observers have not all been notified yet
    Finishing,
    /// Terminal state
    Finished,
}

impl TaskState {
    /// Validated transition table. Illegal transitions are rejected by the
    /// task's state cell (`debug_assert!` in test builds, ignored writes in
    /// release builds).
    pub fn can_transition_to(self, target: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, target),
            (Initialized, Pending)
                | (Pending, EvaluatingConditions)
                | (EvaluatingConditions, Ready)
                | (Ready, Executing)
                | (Ready, Finishing)
                | (Executing, Finishing)
                | (Finishing, Finished)
                // cancellation fast-forward
                | (Initialized, Finishing)
                | (Pending, Finishing)
        )
    }

    /// The task can be picked up by a scheduler
    pub fn is_ready(self) -> bool {
        self == TaskState::Ready
    }

    /// The work routine is currently running
    pub fn is_executing(self) -> bool {
        self == TaskState::Executing
    }

    /// The task reached its terminal state
    pub fn is_finished(self) -> bool {
        self == TaskState::Finished
    }
}
