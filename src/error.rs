use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value context attached to task errors.
///
/// Carries arbitrary serializable details about a failure: the offending
/// condition name, a timeout duration, the list of cancelled predecessors.
/// Keys are kept in sorted order so serialized errors are stable.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ErrorContext {
    entries: BTreeMap<String, Value>,
}

impl ErrorContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a serializable value under the given key
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.entries.insert(key.into(), value);
        self
    }

    /// Look up a context value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Check if the context carries no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors surfaced by the task lifecycle.
///
/// These never interrupt control flow. They accumulate on the task and are
/// delivered exclusively through `finish(errors)`, the `Work::finished` hook,
/// and `Observer::finished`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// A readiness condition was not satisfied
    #[error("condition `{condition}` failed")]
    ConditionFailed {
        condition: String,
        #[serde(default)]
        context: ErrorContext,
    },
    /// The work routine reported a failure
    #[error("task execution failed")]
    ExecutionFailed {
        #[serde(default)]
        context: ErrorContext,
    },
}

impl TaskError {
    /// Create a `ConditionFailed` error naming the failed condition
    pub fn condition_failed(condition: impl Into<String>) -> Self {
        TaskError::ConditionFailed {
            condition: condition.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an `ExecutionFailed` error with an empty context
    pub fn execution_failed() -> Self {
        TaskError::ExecutionFailed {
            context: ErrorContext::new(),
        }
    }

    /// Attach a context entry to either variant
    pub fn with(self, key: impl Into<String>, value: impl Serialize) -> Self {
        match self {
            TaskError::ConditionFailed { condition, context } => TaskError::ConditionFailed {
                condition,
                context: context.with(key, value),
            },
            TaskError::ExecutionFailed { context } => TaskError::ExecutionFailed {
                context: context.with(key, value),
            },
        }
    }

    /// The failed condition's name, if this is a condition failure
    pub fn condition_name(&self) -> Option<&str> {
        match self {
            TaskError::ConditionFailed { condition, .. } => Some(condition),
            TaskError::ExecutionFailed { .. } => None,
        }
    }

    /// The error's key/value context
    pub fn context(&self) -> &ErrorContext {
        match self {
            TaskError::ConditionFailed { context, .. } => context,
            TaskError::ExecutionFailed { context } => context,
        }
    }
}
