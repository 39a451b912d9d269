pub mod delay;
pub mod state;


pub use state::TaskState;

use crate::condition::{Condition, evaluate_all};
use crate::error::TaskError;
use crate::observer::Observer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// The work routine behind a [`Task`].
///
/// `execute` must eventually call `task.finish(..)` (or one of its
/// conveniences) on every path, including after observing mid-work
/// cancellation; later calls are no-ops. The `finished` hook runs once with
/// the merged error list before observers are notified.
#[async_trait]
pub trait Work: Send + Sync {
    /// Entry point of execution. Runs at most once per task.
    async fn execute(&self, task: &Task);

    /// Called exactly once when the task finishes, with the merged errors.
    fn finished(&self, _task: &Task, _errors: &[TaskError]) {}
}

struct FnWork<F>(F);

#[async_trait]
impl<F, Fut> Work for FnWork<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn execute(&self, task: &Task) {
        (self.0)(task.clone()).await;
    }
}

struct TaskInner {
    id: TaskId,
    name: String,
    created_at: DateTime<Utc>,
    /// Narrow lock around the state cell; notifications go out via
    /// `state_tx` after the lock is released so re-entrant reads from
    /// observers cannot deadlock.
    state: Mutex<TaskState>,
    state_tx: watch::Sender<TaskState>,
    conditions: Mutex<Vec<Arc<dyn Condition>>>,
    observers: Mutex<Vec<Arc<dyn Observer>>>,
    dependencies: Mutex<Vec<Task>>,
    cancel: CancellationToken,
    internal_errors: Mutex<Vec<TaskError>>,
    finished_once: AtomicBool,
    work: Box<dyn Work>,
}

/// A schedulable unit of work with conditions, dependencies, observers, and a
/// one-shot finish contract.
///
/// `Task` is a cheap handle; clones share the same underlying state. A task
/// is built, decorated with conditions/observers/dependencies, submitted to a
/// [`TaskQueue`](crate::TaskQueue), and driven by a
/// [`Scheduler`](crate::Scheduler): once every predecessor has finished, its
/// conditions are evaluated (lazily, exactly once), then the work routine
/// runs and reports completion through [`Task::finish`].
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Create a task backed by the given work routine
    pub fn new(name: impl Into<String>, work: impl Work + 'static) -> Self {
        let (state_tx, _) = watch::channel(TaskState::Initialized);
        Self {
            inner: Arc::new(TaskInner {
                id: Uuid::new_v4(),
                name: name.into(),
                created_at: Utc::now(),
                state: Mutex::new(TaskState::Initialized),
                state_tx,
                conditions: Mutex::new(Vec::new()),
                observers: Mutex::new(Vec::new()),
                dependencies: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
                internal_errors: Mutex::new(Vec::new()),
                finished_once: AtomicBool::new(false),
                work: Box::new(work),
            }),
        }
    }

    /// Create a task from an async closure.
    ///
    /// The closure receives a handle to the task itself and must call
    /// `finish` on every path.
    pub fn from_fn<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(name, FnWork(work))
    }

    /// A no-op task, useful as a dependency anchor (sentinel)
    pub fn noop(name: impl Into<String>) -> Self {
        Self::from_fn(name, |task| async move { task.finish_ok() })
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        *self.inner.state.lock().unwrap()
    }

    /// All conditions evaluated and the task can be picked up for execution
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// The work routine is currently running
    pub fn is_executing(&self) -> bool {
        self.state().is_executing()
    }

    /// The task reached its terminal state
    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Cancellation has been requested (cooperative; the work routine must
    /// observe this and call `finish` itself once executing)
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Token tripped when the task is cancelled. Long work routines should
    /// check it at their yield points, e.g. via `tokio::select!`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Resolves when the task is cancelled
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await;
    }

    // ------------------------------------------------------------------
    // Decoration (frozen once the lifecycle passes the relevant state)
    // ------------------------------------------------------------------

    /// Attach a readiness condition.
    ///
    /// Panics if condition evaluation has already begun.
    pub fn add_condition(&self, condition: Arc<dyn Condition>) {
        assert!(
            self.state() < TaskState::EvaluatingConditions,
            "cannot add conditions to task `{}` after condition evaluation has begun",
            self.name()
        );
        self.inner.conditions.lock().unwrap().push(condition);
    }

    /// Attach a lifecycle observer.
    ///
    /// Panics if execution has already begun.
    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        assert!(
            self.state() < TaskState::Executing,
            "cannot add observers to task `{}` after execution has begun",
            self.name()
        );
        self.inner.observers.lock().unwrap().push(observer);
    }

    /// Declare that this task must not start until `dependency` has finished.
    ///
    /// Panics if execution has already begun.
    pub fn add_dependency(&self, dependency: &Task) {
        assert!(
            self.state() < TaskState::Executing,
            "cannot add dependencies to task `{}` after execution has begun",
            self.name()
        );
        self.inner
            .dependencies
            .lock()
            .unwrap()
            .push(dependency.clone());
    }

    /// Snapshot of the current predecessor set
    pub fn dependencies(&self) -> Vec<Task> {
        self.inner.dependencies.lock().unwrap().clone()
    }

    pub(crate) fn conditions_snapshot(&self) -> Vec<Arc<dyn Condition>> {
        self.inner.conditions.lock().unwrap().clone()
    }

    fn observers_snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.inner.observers.lock().unwrap().clone()
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Request cooperative cancellation.
    ///
    /// Before execution this short-circuits the task straight to finished
    /// without running its work routine. During execution it only trips the
    /// cancellation token; the work routine must poll it and call `finish`.
    pub fn cancel(&self) {
        debug!("cancelling task `{}`", self.name());
        self.inner.cancel.cancel();
    }

    /// Record an error, then cancel
    pub fn cancel_with_error(&self, error: TaskError) {
        self.inner.internal_errors.lock().unwrap().push(error);
        self.cancel();
    }

    // ------------------------------------------------------------------
    // Produce
    // ------------------------------------------------------------------

    /// Hand a newly discovered task to whoever is observing this one.
    ///
    /// An owning queue forwards produced tasks back into itself, so a work
    /// routine can discover work, schedule it, and then finish.
    pub fn produce(&self, new_task: Task) {
        debug!("task `{}` produced task `{}`", self.name(), new_task.name());
        for observer in self.observers_snapshot() {
            observer.produced(self, &new_task);
        }
    }

    // ------------------------------------------------------------------
    // Finishing
    // ------------------------------------------------------------------

    /// Mark the task finished, merging `errors` with any already-recorded
    /// internal errors (condition failures, cancellation errors).
    ///
    /// Idempotent: only the first call has any effect.
    pub fn finish(&self, errors: Vec<TaskError>) {
        if self.inner.finished_once.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transition_to(TaskState::Finishing);

        let mut combined = std::mem::take(&mut *self.inner.internal_errors.lock().unwrap());
        combined.extend(errors);

        self.inner.work.finished(self, &combined);
        for observer in self.observers_snapshot() {
            observer.finished(self, &combined);
        }

        self.transition_to(TaskState::Finished);
        debug!(
            "task `{}` finished with {} error(s)",
            self.name(),
            combined.len()
        );
    }

    /// Finish without contributing further errors
    pub fn finish_ok(&self) {
        self.finish(Vec::new());
    }

    /// Finish with a single error
    pub fn finish_with_error(&self, error: TaskError) {
        self.finish(vec![error]);
    }

    // ------------------------------------------------------------------
    // Scheduling protocol (crate-internal)
    // ------------------------------------------------------------------

    /// The owning queue has finished wiring this task; it may now begin
    /// evaluating readiness when probed.
    pub(crate) fn will_enqueue(&self) {
        self.transition_to(TaskState::Pending);
    }

    /// Resolve when this task reaches its terminal state.
    ///
    /// Deliberately not public: waiting on a single task invites deadlocks
    /// and discourages dependency-based composition. Use
    /// [`TaskQueue::add_batch_and_wait`](crate::TaskQueue::add_batch_and_wait).
    pub(crate) async fn wait_finished(&self) {
        let mut rx = self.inner.state_tx.subscribe();
        let _ = rx.wait_for(|state| state.is_finished()).await;
    }

    /// Wait until the task is ready to run: every predecessor finished and
    /// conditions evaluated, or cancellation observed.
    ///
    /// The dependency list is re-snapshotted after each pass so edges added
    /// while pending (exclusivity chains, group rewiring) are honored.
    pub(crate) async fn await_ready(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let unfinished: Vec<Task> = self
                .dependencies()
                .into_iter()
                .filter(|dep| !dep.is_finished())
                .collect();
            if unfinished.is_empty() {
                break;
            }
            for dep in unfinished {
                tokio::select! {
                    _ = self.cancelled() => return,
                    _ = dep.wait_finished() => {}
                }
            }
        }
        self.evaluate_conditions().await;
    }

    /// Evaluate all conditions concurrently, exactly once.
    ///
    /// Failures aggregate in attachment order; a cancellation observed during
    /// evaluation appends one more failure. A cancellation observed after
    /// this point merges into the recorded errors at execution time instead
    /// of triggering re-evaluation.
    async fn evaluate_conditions(&self) {
        if !self.try_transition(TaskState::Pending, TaskState::EvaluatingConditions) {
            return;
        }
        let conditions = self.conditions_snapshot();
        trace!(
            "evaluating {} condition(s) for task `{}`",
            conditions.len(),
            self.name()
        );
        let mut failures = evaluate_all(&conditions, self).await;
        if self.is_cancelled() {
            failures.push(
                TaskError::condition_failed("Cancelled")
                    .with("reason", "task was cancelled during condition evaluation"),
            );
        }
        if !failures.is_empty() {
            debug!(
                "task `{}` has {} failed condition(s)",
                self.name(),
                failures.len()
            );
        }
        self.inner.internal_errors.lock().unwrap().extend(failures);
        self.transition_to(TaskState::Ready);
    }

    /// Run the task: skip the work routine when cancelled or when conditions
    /// failed, otherwise notify observers and execute.
    pub(crate) async fn run(&self) {
        let has_errors = !self.inner.internal_errors.lock().unwrap().is_empty();
        if self.is_cancelled() || has_errors {
            self.finish(Vec::new());
            return;
        }
        self.transition_to(TaskState::Executing);
        for observer in self.observers_snapshot() {
            observer.started(self);
        }
        debug!("executing task `{}`", self.name());
        self.inner.work.execute(self).await;
    }

    pub(crate) fn downgrade(&self) -> WeakTask {
        WeakTask(Arc::downgrade(&self.inner))
    }

    // ------------------------------------------------------------------
    // State cell
    // ------------------------------------------------------------------

    fn transition_to(&self, target: TaskState) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state == TaskState::Finished {
                return;
            }
            debug_assert!(
                state.can_transition_to(target),
                "invalid state transition {:?} -> {:?} on task `{}`",
                *state,
                target,
                self.name()
            );
            if !state.can_transition_to(target) {
                return;
            }
            trace!("task `{}`: {:?} -> {:?}", self.name(), *state, target);
            *state = target;
        }
        // published outside the lock; subscribers may re-read task state
        self.inner.state_tx.send_replace(target);
    }

    fn try_transition(&self, from: TaskState, to: TaskState) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state != from || !state.can_transition_to(to) {
                return false;
            }
            *state = to;
        }
        self.inner.state_tx.send_replace(to);
        true
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Task {}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Non-owning task handle, used where an owning reference would form a cycle
/// (a group's delegate pointing back at the group's own task).
pub(crate) struct WeakTask(Weak<TaskInner>);

impl WeakTask {
    pub(crate) fn upgrade(&self) -> Option<Task> {
        self.0.upgrade().map(|inner| Task { inner })
    }
}
