use crate::task::Task;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Tracks in-flight tasks that have declared themselves mutually exclusive,
/// serializing tasks that share a category across the whole process,
/// regardless of which queue runs them.
///
/// The controller is an explicitly constructed, injectable service: an
/// application shares one instance across all of its queues for process-wide
/// exclusion, while tests construct isolated instances. Cloning shares the
/// underlying registry.
///
/// Within a category, registration order defines execution order: each newly
/// registered task gains a dependency on the category's current tail, so
/// entries form a FIFO chain. No cycle is possible, since a registration only
/// ever references the tail as it existed at registration time.
#[derive(Clone, Default)]
pub struct ExclusivityController {
    categories: Arc<DashMap<String, Vec<Task>>>,
}

impl ExclusivityController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under each category, chaining it behind the current
    /// tail.
    ///
    /// This must complete before the task can be evaluated as ready; the
    /// queue calls it synchronously during `add`, before the task is released
    /// to the scheduler. Each category's entry lock is held only long enough
    /// to splice the chain.
    pub fn register(&self, task: &Task, categories: &[String]) {
        for category in categories {
            let mut tasks = self.categories.entry(category.clone()).or_default();
            if let Some(tail) = tasks.last() {
                debug!(
                    "category `{}`: task `{}` chained behind `{}`",
                    category,
                    task.name(),
                    tail.name()
                );
                task.add_dependency(tail);
            }
            tasks.push(task.clone());
        }
    }

    /// Drop a task from each of its categories once it has finished.
    /// Invoked from a finish observer; may run on any thread.
    pub fn unregister(&self, task: &Task, categories: &[String]) {
        for category in categories {
            if let Some(mut tasks) = self.categories.get_mut(category) {
                tasks.retain(|entry| entry.id() != task.id());
            }
        }
    }

    /// Number of registered, not-yet-finished tasks in a category
    pub fn in_flight(&self, category: &str) -> usize {
        self.categories
            .get(category)
            .map(|tasks| tasks.len())
            .unwrap_or(0)
    }
}
