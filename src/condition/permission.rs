use super::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::task::Task;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of a permission check against an external authorization API
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    /// The user has not been asked yet
    NotDetermined,
    Granted,
    Denied,
}

/// Seam to the platform's authorization API.
///
/// Implementations wrap whatever permission system the application talks to
/// (file access prompts, calendar access, cloud entitlements). `request` is
/// expected to be idempotent: if a decision already exists it returns it
/// without prompting again.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Current status for a scope, without prompting
    async fn status(&self, scope: &str) -> PermissionStatus;

    /// Prompt for (or re-read) the decision for a scope
    async fn request(&self, scope: &str) -> PermissionStatus;
}

/// Gates a task on a granted permission.
///
/// The condition synthesizes a "request permission" dependency task, so the
/// prompt runs (and completes) before the condition is evaluated. It is
/// mutually exclusive: at most one permission request is in flight at a time,
/// which keeps multiple prompts from stacking on screen.
pub struct PermissionCondition {
    scope: String,
    service: Arc<dyn AuthorizationService>,
}

impl PermissionCondition {
    pub const NAME: &'static str = "Permission";

    pub fn new(scope: impl Into<String>, service: Arc<dyn AuthorizationService>) -> Self {
        Self {
            scope: scope.into(),
            service,
        }
    }
}

#[async_trait]
impl Condition for PermissionCondition {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_mutually_exclusive(&self) -> bool {
        true
    }

    fn dependency_for_task(&self, _task: &Task) -> Option<Task> {
        let service = self.service.clone();
        let scope = self.scope.clone();
        Some(Task::from_fn(
            format!("request-permission.{}", self.scope),
            move |task| {
                let service = service.clone();
                let scope = scope.clone();
                async move {
                    // a denial is surfaced by the condition, not by this task
                    let _ = service.request(&scope).await;
                    task.finish_ok();
                }
            },
        ))
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        match self.service.status(&self.scope).await {
            PermissionStatus::Granted => ConditionResult::Satisfied,
            status => ConditionResult::Failed(
                TaskError::condition_failed(Self::NAME)
                    .with("scope", &self.scope)
                    .with("status", format!("{status:?}")),
            ),
        }
    }
}
