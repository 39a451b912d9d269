use crate::error::TaskError;
use crate::exclusivity::ExclusivityController;
use crate::queue::{QueueDelegate, TaskQueue};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::task::{Task, Work};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Hook for reacting to individual children of a [`GroupTask`] finishing,
/// without observing each child separately. Sentinels are filtered out.
pub trait GroupDelegate: Send + Sync {
    fn child_finished(&self, task: &Task, errors: &[TaskError]);
}

struct GroupCore {
    queue: TaskQueue,
    start: Task,
    finish: Task,
    aggregated: Mutex<Vec<TaskError>>,
    group: Mutex<Option<crate::task::WeakTask>>,
    delegate: Mutex<Option<Arc<dyn GroupDelegate>>>,
}

struct GroupWork {
    core: Arc<GroupCore>,
}

#[async_trait]
impl Work for GroupWork {
    async fn execute(&self, _task: &Task) {
        // Releasing the internal queue starts the cascade; the finish
        // sentinel goes in last, behind every child added so far. The group
        // finishes from the delegate when the sentinel does, not here.
        self.core.queue.resume();
        self.core.queue.add(&self.core.finish);
    }
}

impl QueueDelegate for GroupCore {
    fn will_add(&self, _queue: &TaskQueue, task: &Task) {
        assert!(
            !self.finish.is_finished() && !self.finish.is_executing(),
            "cannot add tasks to a group after it has begun finishing"
        );

        // The finish sentinel trails every other task, including ones
        // produced while the group is running.
        if task.id() != self.finish.id() {
            self.finish.add_dependency(task);
        }

        // Everything waits on the start sentinel, so children's conditions
        // cannot evaluate before the group itself executes.
        if task.id() != self.start.id() {
            task.add_dependency(&self.start);
        }
    }

    fn task_did_finish(&self, _queue: &TaskQueue, task: &Task, errors: &[TaskError]) {
        {
            let mut aggregated = self.aggregated.lock().unwrap();
            aggregated.extend_from_slice(errors);
        }

        if task.id() == self.finish.id() {
            self.queue.suspend();
            let errors = std::mem::take(&mut *self.aggregated.lock().unwrap());
            if let Some(group) = self
                .group
                .lock()
                .unwrap()
                .as_ref()
                .and_then(|weak| weak.upgrade())
            {
                debug!(
                    "group `{}` finishing with {} aggregated error(s)",
                    group.name(),
                    errors.len()
                );
                group.finish(errors);
            }
        } else if task.id() != self.start.id() {
            let delegate = self.delegate.lock().unwrap().clone();
            if let Some(delegate) = delegate {
                delegate.child_finished(task, errors);
            }
        }
    }
}

/// A task that executes zero or more child tasks as a unit.
///
/// Children (including ones produced dynamically while the group runs) go
/// through a private, initially suspended queue. A start sentinel gates every
/// child, so nothing (conditions included) runs before the group itself
/// executes; a finish sentinel trails every child, and the group finishes
/// when it does, reporting the union of all descendants' errors in completion
/// order.
///
/// Groups are also the way to express "a chain that may loop": put a login
/// task inside a group and any follow-up tasks it produces will run before
/// the group, and thus anything depending on the group, completes.
pub struct GroupTask {
    task: Task,
    core: Arc<GroupCore>,
}

/// Configures a [`GroupTask`] before construction
pub struct GroupTaskBuilder {
    name: String,
    children: Vec<Task>,
    scheduler: Arc<dyn Scheduler>,
    exclusivity: ExclusivityController,
}

impl GroupTaskBuilder {
    /// Add an initial child
    pub fn task(mut self, task: Task) -> Self {
        self.children.push(task);
        self
    }

    /// Add several initial children
    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.children.extend(tasks);
        self
    }

    /// Scheduler for the internal queue
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Share the application's exclusivity controller with the internal
    /// queue, so children's categories are exclusive process-wide rather than
    /// group-wide
    pub fn exclusivity(mut self, exclusivity: ExclusivityController) -> Self {
        self.exclusivity = exclusivity;
        self
    }

    pub fn build(self) -> GroupTask {
        let queue = TaskQueue::builder(format!("{}.internal", self.name))
            .scheduler(self.scheduler)
            .exclusivity(self.exclusivity)
            .start_suspended()
            .build();

        let core = Arc::new(GroupCore {
            queue: queue.clone(),
            start: Task::noop(format!("{}.start", self.name)),
            finish: Task::noop(format!("{}.finish", self.name)),
            aggregated: Mutex::new(Vec::new()),
            group: Mutex::new(None),
            delegate: Mutex::new(None),
        });

        let delegate: Arc<dyn QueueDelegate> = core.clone();
        queue.set_delegate(&delegate);

        queue.add(&core.start);
        for child in &self.children {
            queue.add(child);
        }

        let task = Task::new(self.name, GroupWork { core: core.clone() });
        *core.group.lock().unwrap() = Some(task.downgrade());

        GroupTask { task, core }
    }
}

impl GroupTask {
    /// A group over the given children, with a private scheduler and an
    /// isolated exclusivity controller
    pub fn new(name: impl Into<String>, children: impl IntoIterator<Item = Task>) -> Self {
        Self::builder(name).tasks(children).build()
    }

    pub fn builder(name: impl Into<String>) -> GroupTaskBuilder {
        GroupTaskBuilder {
            name: name.into(),
            children: Vec::new(),
            scheduler: Arc::new(TokioScheduler::new()),
            exclusivity: ExclusivityController::new(),
        }
    }

    /// The group's own task; submit this to an outer queue, decorate it with
    /// conditions and observers, or depend on it
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Add a child after construction.
    ///
    /// Panics if the group has already begun finishing.
    pub fn add_task(&self, task: &Task) {
        self.core.queue.add(task);
    }

    /// Add several children after construction
    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = Task>) {
        for task in tasks {
            self.core.queue.add(&task);
        }
    }

    /// Cancel every child, then the group itself.
    ///
    /// Also covers a group that never executed: children buffered in the
    /// still-suspended internal queue are released so their drivers observe
    /// the cancellation and finish.
    pub fn cancel(&self) {
        self.core.queue.cancel_all();
        self.core.queue.resume();
        self.task.cancel();
    }

    /// Install the hook invoked as each non-sentinel child finishes
    pub fn set_delegate(&self, delegate: Arc<dyn GroupDelegate>) {
        *self.core.delegate.lock().unwrap() = Some(delegate);
    }
}

impl AsRef<Task> for GroupTask {
    fn as_ref(&self) -> &Task {
        &self.task
    }
}
