use crate::error::TaskError;
use crate::exclusivity::ExclusivityController;
use crate::observer::BlockObserver;
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::task::{Task, TaskState};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Responds to task lifecycle events on behalf of a whole queue.
///
/// Most code should attach an [`Observer`](crate::Observer) to individual
/// tasks instead; the delegate exists for the cases where per-queue plumbing
/// is simpler. A [`GroupTask`](crate::GroupTask) is the delegate of its own
/// internal queue and uses it to manage sentinel dependencies and error
/// aggregation.
pub trait QueueDelegate: Send + Sync {
    /// A wired task is about to be handed to the scheduler
    fn will_add(&self, _queue: &TaskQueue, _task: &Task) {}

    /// A task admitted to this queue reached its terminal state
    fn task_did_finish(&self, _queue: &TaskQueue, _task: &Task, _errors: &[TaskError]) {}
}

struct Suspension {
    suspended: bool,
    /// Tasks wired while suspended, released in admission order on resume
    buffer: Vec<Task>,
}

struct QueueInner {
    name: String,
    scheduler: Arc<dyn Scheduler>,
    exclusivity: ExclusivityController,
    delegate: Mutex<Option<Weak<dyn QueueDelegate>>>,
    suspension: Mutex<Suspension>,
    /// Every admitted, not-yet-finished task; drives `cancel_all`
    tasks: Mutex<Vec<Task>>,
}

/// The single entry point for scheduling tasks.
///
/// `add` wires a task up before releasing it to the underlying scheduler:
/// produced tasks are forwarded back into the queue, condition dependencies
/// are resolved and scheduled, mutual-exclusion categories are registered
/// with the [`ExclusivityController`], and the delegate is notified. Clones
/// share the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

/// Configures a [`TaskQueue`] before construction
pub struct TaskQueueBuilder {
    name: String,
    scheduler: Arc<dyn Scheduler>,
    exclusivity: ExclusivityController,
    suspended: bool,
}

impl TaskQueueBuilder {
    /// Replace the default tokio-backed scheduler
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Share an exclusivity controller with other queues. Without this the
    /// queue gets a fresh, isolated controller.
    pub fn exclusivity(mut self, exclusivity: ExclusivityController) -> Self {
        self.exclusivity = exclusivity;
        self
    }

    /// Start with admission open but scheduling paused; tasks are wired on
    /// `add` and released on [`TaskQueue::resume`]
    pub fn start_suspended(mut self) -> Self {
        self.suspended = true;
        self
    }

    pub fn build(self) -> TaskQueue {
        TaskQueue {
            inner: Arc::new(QueueInner {
                name: self.name,
                scheduler: self.scheduler,
                exclusivity: self.exclusivity,
                delegate: Mutex::new(None),
                suspension: Mutex::new(Suspension {
                    suspended: self.suspended,
                    buffer: Vec::new(),
                }),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl TaskQueue {
    /// A queue with the default scheduler and an isolated exclusivity
    /// controller
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> TaskQueueBuilder {
        TaskQueueBuilder {
            name: name.into(),
            scheduler: Arc::new(TokioScheduler::new()),
            exclusivity: ExclusivityController::new(),
            suspended: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The controller this queue registers mutually-exclusive tasks with
    pub fn exclusivity(&self) -> &ExclusivityController {
        &self.inner.exclusivity
    }

    /// Install the queue's delegate. Held weakly, so the delegate owning the
    /// queue does not leak.
    pub fn set_delegate(&self, delegate: &Arc<dyn QueueDelegate>) {
        *self.inner.delegate.lock().unwrap() = Some(Arc::downgrade(delegate));
    }

    /// Wire a task into the queue and release it to the scheduler.
    ///
    /// Panics if the task was already added to a queue.
    pub fn add(&self, task: &Task) {
        assert_eq!(
            task.state(),
            TaskState::Initialized,
            "task `{}` was already enqueued",
            task.name()
        );
        debug!("queue `{}`: adding task `{}`", self.name(), task.name());
        self.inner.tasks.lock().unwrap().push(task.clone());

        // Forward produced tasks back into this queue and finish events to
        // the delegate.
        let produce_queue = self.clone();
        let finish_queue = self.clone();
        task.add_observer(Arc::new(
            BlockObserver::new()
                .on_produce(move |_task, new_task| produce_queue.add(new_task))
                .on_finish(move |task, errors| finish_queue.task_finished(task, errors)),
        ));

        // Extract dependencies generated by the task's conditions and
        // schedule them ahead of it.
        let conditions = task.conditions_snapshot();
        for dependency in conditions
            .iter()
            .filter_map(|condition| condition.dependency_for_task(task))
        {
            task.add_dependency(&dependency);
            self.add(&dependency);
        }

        // With condition dependencies in place, chain the task behind any
        // in-flight work sharing one of its exclusivity categories.
        let categories: Vec<String> = conditions
            .iter()
            .filter(|condition| condition.is_mutually_exclusive())
            .map(|condition| condition.name().to_string())
            .collect();
        if !categories.is_empty() {
            self.inner.exclusivity.register(task, &categories);
            let exclusivity = self.inner.exclusivity.clone();
            task.add_observer(Arc::new(BlockObserver::new().on_finish(
                move |task, _errors| exclusivity.unregister(task, &categories),
            )));
        }

        // Wiring done; the task may evaluate readiness once probed.
        task.will_enqueue();

        if let Some(delegate) = self.delegate() {
            delegate.will_add(self, task);
        }

        self.submit_or_buffer(task);
    }

    /// Add a batch of tasks, then wait until every one of them has finished.
    ///
    /// This blocks an unrelated caller on tasks it just submitted, never a
    /// task on itself or a sibling. A single-task wait is deliberately not
    /// offered: composition belongs in dependencies, not in blocking.
    pub async fn add_batch_and_wait(&self, tasks: &[Task]) {
        for task in tasks {
            self.add(task);
        }
        for task in tasks {
            task.wait_finished().await;
        }
    }

    /// Pause handing tasks to the scheduler; `add` keeps wiring and buffering
    pub fn suspend(&self) {
        self.inner.suspension.lock().unwrap().suspended = true;
    }

    /// Release every buffered task in admission order and resume scheduling
    pub fn resume(&self) {
        let buffered = {
            let mut suspension = self.inner.suspension.lock().unwrap();
            suspension.suspended = false;
            std::mem::take(&mut suspension.buffer)
        };
        for task in buffered {
            self.inner.scheduler.submit(task);
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.suspension.lock().unwrap().suspended
    }

    /// Cancel every task admitted so far that has not yet finished
    pub fn cancel_all(&self) {
        let tasks = self.inner.tasks.lock().unwrap().clone();
        debug!("queue `{}`: cancelling {} task(s)", self.name(), tasks.len());
        for task in tasks {
            task.cancel();
        }
    }

    fn submit_or_buffer(&self, task: &Task) {
        let mut suspension = self.inner.suspension.lock().unwrap();
        if suspension.suspended {
            suspension.buffer.push(task.clone());
        } else {
            drop(suspension);
            self.inner.scheduler.submit(task.clone());
        }
    }

    fn task_finished(&self, task: &Task, errors: &[TaskError]) {
        self.inner
            .tasks
            .lock()
            .unwrap()
            .retain(|entry| entry.id() != task.id());
        if let Some(delegate) = self.delegate() {
            delegate.task_did_finish(self, task, errors);
        }
    }

    fn delegate(&self) -> Option<Arc<dyn QueueDelegate>> {
        self.inner
            .delegate
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
    }
}
