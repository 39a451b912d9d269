//! # Taskkit
//!
//! A cooperative task-execution framework for sequencing background jobs
//! (network fetches, permission checks, rendering) with conditional
//! readiness, explicit dependency graphs, lifecycle observation, and
//! mutual-exclusion categories.
//!
//! ## Architecture Overview
//!
//! The framework consists of a handful of cooperating pieces:
//!
//! - **[`task`]**: the task state machine, a strict forward lifecycle with
//!   cooperative cancellation, a one-shot finish contract, and dynamic task
//!   production
//! - **[`condition`]**: async predicates gating readiness, optionally
//!   synthesizing prerequisite tasks (e.g. "request this permission first")
//! - **[`observer`]**: lifecycle hooks for cross-cutting concerns: timeouts,
//!   activity indicators, ad hoc closures
//! - **[`exclusivity`]**: a process-wide registry serializing tasks that
//!   share a named category
//! - **[`queue`]**: the scheduling entry point, wiring conditions into
//!   dependencies and categories into exclusivity chains
//! - **[`group`]**: a composite task running children through a private
//!   queue, bracketed by sentinel tasks, aggregating every descendant's
//!   errors
//!
//! ## Lifecycle
//!
//! A task moves through `Initialized → Pending → EvaluatingConditions →
//! Ready → Executing → Finishing → Finished`. Conditions evaluate lazily and
//! exactly once, only after every predecessor has finished, so a condition
//! never runs before the prerequisite task it synthesized. Errors never
//! interrupt control flow: condition failures and execution errors accumulate
//! on the task and are delivered once, through the finish path, to the work
//! routine's `finished` hook and every observer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskkit::{Task, TaskQueue};
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = TaskQueue::new("background");
//!
//!     let fetch = Task::from_fn("fetch-movies", |task| async move {
//!         // ... perform the fetch ...
//!         task.finish_ok();
//!     });
//!     let render = Task::from_fn("render-posters", |task| async move {
//!         // ... render ...
//!         task.finish_ok();
//!     });
//!     render.add_dependency(&fetch);
//!
//!     queue.add_batch_and_wait(&[fetch, render]).await;
//! }
//! ```

/// Task state machine, work routines, and the delay task.
///
/// Provides the core [`Task`] type with its strict forward lifecycle,
/// cooperative cancellation, one-shot finishing, and dynamic production of
/// follow-up tasks.
pub mod task;

/// Readiness conditions.
///
/// The [`Condition`] trait plus built-ins: negation, cancelled-dependency
/// checks, one-shot reachability probes, and permission gates backed by an
/// external authorization service.
pub mod condition;

/// Lifecycle observers.
///
/// The [`Observer`] trait plus built-ins: closure-backed observers, per-task
/// timeouts, and a debounced activity indicator.
pub mod observer;

/// Mutual-exclusion categories across queues.
pub mod exclusivity;

/// Scheduling entry point and queue delegation.
pub mod queue;

/// The external scheduler seam and the default tokio-backed implementation.
pub mod scheduler;

/// Composite tasks aggregating children behind sentinel tasks.
pub mod group;

/// Error taxonomy shared by conditions and work routines.
pub mod error;

// Re-export the main task types
pub use task::{Task, TaskId, TaskState, Work};

// Re-export condition types
pub use condition::{
    AuthorizationService, Condition, ConditionResult, NegatedCondition, NoCancelledDependencies,
    PermissionCondition, PermissionStatus, ReachabilityCondition,
};

// Re-export observer types
pub use observer::{ActivityIndicator, ActivityObserver, BlockObserver, Observer, TimeoutObserver};

// Re-export scheduling types
pub use exclusivity::ExclusivityController;
pub use queue::{QueueDelegate, TaskQueue, TaskQueueBuilder};
pub use scheduler::{Scheduler, TokioScheduler};

// Re-export group types
pub use group::{GroupDelegate, GroupTask, GroupTaskBuilder};

// Re-export error types
pub use error::{ErrorContext, TaskError};
