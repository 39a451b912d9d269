use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskkit::{Condition, ConditionResult, ExclusivityController, Task, TaskQueue};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn wait_finished(task: &Task) {
    while !task.is_finished() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Always-satisfied condition whose only job is to claim a category
struct Category(&'static str);

#[async_trait]
impl Condition for Category {
    fn name(&self) -> &str {
        self.0
    }

    fn is_mutually_exclusive(&self) -> bool {
        true
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        ConditionResult::Satisfied
    }
}

/// Tracks how many tasks are inside their work routine at once
#[derive(Default)]
struct Concurrency {
    current: AtomicUsize,
    peak: AtomicUsize,
}

fn overlapping_task(name: &str, category: &'static str, gauge: &Arc<Concurrency>) -> Task {
    let gauge = gauge.clone();
    let task = Task::from_fn(name, move |task| {
        let gauge = gauge.clone();
        async move {
            let current = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            gauge.current.fetch_sub(1, Ordering::SeqCst);
            task.finish_ok();
        }
    });
    task.add_condition(Arc::new(Category(category)));
    task
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_category_tasks_never_overlap() {
    init_tracing();
    let queue = TaskQueue::new("exclusive");
    let gauge = Arc::new(Concurrency::default());

    let a = overlapping_task("a", "downloads", &gauge);
    let b = overlapping_task("b", "downloads", &gauge);
    let c = overlapping_task("c", "downloads", &gauge);

    queue.add_batch_and_wait(&[a, b, c]).await;

    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn admission_order_becomes_dependency_order() {
    init_tracing();
    let queue = TaskQueue::new("exclusive");
    let log = Arc::new(Mutex::new(Vec::new()));

    let task = |name: &str| {
        let log = log.clone();
        let entry = name.to_string();
        let task = Task::from_fn(name, move |task| {
            let log = log.clone();
            let entry = entry.clone();
            async move {
                log.lock().unwrap().push(entry);
                task.finish_ok();
            }
        });
        task.add_condition(Arc::new(Category("journal")));
        task
    };

    let a = task("a");
    let b = task("b");
    queue.add(&a);
    queue.add(&b);

    // the later registrant picked up a dependency on the earlier one
    assert!(b.dependencies().iter().any(|dep| dep.id() == a.id()));
    assert!(a.dependencies().is_empty());

    wait_finished(&a).await;
    wait_finished(&b).await;
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn categories_drain_as_tasks_finish() {
    init_tracing();
    let queue = TaskQueue::new("exclusive");
    let controller = queue.exclusivity().clone();
    let gauge = Arc::new(Concurrency::default());

    let a = overlapping_task("a", "sync", &gauge);
    queue.add_batch_and_wait(&[a]).await;
    assert_eq!(controller.in_flight("sync"), 0);

    // a fresh registrant after the category drained starts unencumbered
    let b = overlapping_task("b", "sync", &gauge);
    queue.add(&b);
    assert!(b.dependencies().is_empty());
    wait_finished(&b).await;
}

#[tokio::test]
async fn one_task_can_hold_several_categories() {
    init_tracing();
    let queue = TaskQueue::new("exclusive");
    let controller = queue.exclusivity().clone();

    let task = Task::from_fn("migrate", |task| async move {
        task.cancelled().await;
        task.finish_ok();
    });
    task.add_condition(Arc::new(Category("database")));
    task.add_condition(Arc::new(Category("settings")));

    queue.add(&task);
    assert_eq!(controller.in_flight("database"), 1);
    assert_eq!(controller.in_flight("settings"), 1);

    task.cancel();
    wait_finished(&task).await;
    assert_eq!(controller.in_flight("database"), 0);
    assert_eq!(controller.in_flight("settings"), 0);
}

#[tokio::test]
async fn separate_queues_have_isolated_controllers_by_default() {
    init_tracing();
    let gauge = Arc::new(Concurrency::default());
    let q1 = TaskQueue::new("first");
    let q2 = TaskQueue::new("second");

    let a = overlapping_task("a", "uploads", &gauge);
    let b = overlapping_task("b", "uploads", &gauge);
    q1.add(&a);
    q2.add(&b);

    // no cross-queue chaining without a shared controller
    assert!(b.dependencies().is_empty());
    wait_finished(&a).await;
    wait_finished(&b).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_controller_serializes_across_queues() {
    init_tracing();
    let controller = ExclusivityController::new();
    let gauge = Arc::new(Concurrency::default());
    let q1 = TaskQueue::builder("first")
        .exclusivity(controller.clone())
        .build();
    let q2 = TaskQueue::builder("second")
        .exclusivity(controller.clone())
        .build();

    let a = overlapping_task("a", "uploads", &gauge);
    let b = overlapping_task("b", "uploads", &gauge);
    q1.add(&a);
    q2.add(&b);

    assert!(b.dependencies().iter().any(|dep| dep.id() == a.id()));
    wait_finished(&a).await;
    wait_finished(&b).await;
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
}
