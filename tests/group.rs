use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskkit::{BlockObserver, GroupDelegate, GroupTask, Task, TaskError, TaskQueue};

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

fn logged_task(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Task {
    let log = log.clone();
    let entry = name.to_string();
    Task::from_fn(name, move |task| {
        let log = log.clone();
        let entry = entry.clone();
        async move {
            log.lock().unwrap().push(entry);
            task.finish_ok();
        }
    })
}

fn failing_task(name: &str, stage: &str) -> Task {
    let stage = stage.to_string();
    Task::from_fn(name, move |task| {
        let stage = stage.clone();
        async move {
            task.finish_with_error(TaskError::execution_failed().with("stage", stage));
        }
    })
}

/// Captures the error list the group reports when it finishes
fn record_group_errors(group: &GroupTask, errors: &Arc<Mutex<Vec<TaskError>>>) {
    let errors = errors.clone();
    group.task().add_observer(Arc::new(BlockObserver::new().on_finish(
        move |_task, reported| {
            errors.lock().unwrap().extend_from_slice(reported);
        },
    )));
}

#[tokio::test]
async fn group_finishes_after_every_child() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let log = Arc::new(Mutex::new(Vec::new()));

    let group = GroupTask::new(
        "import",
        ["parse", "validate", "store"]
            .iter()
            .map(|name| logged_task(name, &log)),
    );
    {
        let log = log.clone();
        group.task().add_observer(Arc::new(BlockObserver::new().on_finish(
            move |_, _| log.lock().unwrap().push("group".to_string()),
        )));
    }

    queue.add_batch_and_wait(&[group.task().clone()]).await;

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 4);
    assert_eq!(log.last().map(String::as_str), Some("group"));
    assert!(group.task().is_finished());
}

#[tokio::test]
async fn group_aggregates_child_errors() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let group = GroupTask::new(
        "import",
        [
            logged_task("ok", &log),
            failing_task("bad-parse", "parse"),
            failing_task("bad-store", "store"),
        ],
    );
    record_group_errors(&group, &errors);

    queue.add_batch_and_wait(&[group.task().clone()]).await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|error| error.condition_name().is_none()));
    assert_eq!(*log.lock().unwrap(), vec!["ok"]);
}

#[tokio::test]
async fn children_gate_on_the_group_executing() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));

    let group = GroupTask::new("deferred", [logged_task("child", &log)]);
    // construction alone must not run children
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(log.lock().unwrap().is_empty());

    let queue = TaskQueue::new("outer");
    queue.add_batch_and_wait(&[group.task().clone()]).await;
    assert_eq!(*log.lock().unwrap(), vec!["child"]);
}

#[tokio::test]
async fn produced_grandchildren_finish_before_the_group() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let log = Arc::new(Mutex::new(Vec::new()));

    let grandchild = logged_task("grandchild", &log);
    let producer = {
        let log = log.clone();
        Task::from_fn("producer", move |task| {
            let log = log.clone();
            let grandchild = grandchild.clone();
            async move {
                log.lock().unwrap().push("producer".to_string());
                task.produce(grandchild);
                task.finish_ok();
            }
        })
    };

    let group = GroupTask::new("chain", [producer]);
    {
        let log = log.clone();
        group.task().add_observer(Arc::new(BlockObserver::new().on_finish(
            move |_, _| log.lock().unwrap().push("group".to_string()),
        )));
    }

    queue.add_batch_and_wait(&[group.task().clone()]).await;

    assert_eq!(*log.lock().unwrap(), vec!["producer", "grandchild", "group"]);
}

#[derive(Default)]
struct ChildCounter {
    finished: AtomicUsize,
    failed: AtomicUsize,
}

impl GroupDelegate for ChildCounter {
    fn child_finished(&self, _task: &Task, errors: &[TaskError]) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        if !errors.is_empty() {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn delegate_sees_children_but_not_sentinels() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let log = Arc::new(Mutex::new(Vec::new()));
    let counter = Arc::new(ChildCounter::default());

    let group = GroupTask::new(
        "watched",
        [
            logged_task("one", &log),
            logged_task("two", &log),
            failing_task("three", "flush"),
        ],
    );
    group.set_delegate(counter.clone());

    queue.add_batch_and_wait(&[group.task().clone()]).await;

    assert_eq!(counter.finished.load(Ordering::SeqCst), 3);
    assert_eq!(counter.failed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tasks_can_join_a_running_group() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let log = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(tokio::sync::Notify::new());

    let holder = {
        let gate = gate.clone();
        Task::from_fn("holder", move |task| {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                task.finish_ok();
            }
        })
    };
    let group = Arc::new(GroupTask::new("open", [holder]));

    let runner = {
        let queue = queue.clone();
        let task = group.task().clone();
        tokio::spawn(async move { queue.add_batch_and_wait(&[task]).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // the holder keeps the finish sentinel waiting, so admission is still open
    group.add_task(&logged_task("late", &log));
    gate.notify_one();
    runner.await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["late"]);
    assert!(group.task().is_finished());
}

#[tokio::test]
#[should_panic(expected = "cannot add tasks to a group")]
async fn adding_to_a_finished_group_panics() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let group = GroupTask::new("done", [Task::noop("only")]);

    queue.add_batch_and_wait(&[group.task().clone()]).await;
    assert!(group.task().is_finished());

    group.add_task(&Task::noop("late"));
}

#[tokio::test]
async fn cancelling_a_group_releases_stuck_children() {
    init_tracing();
    let queue = TaskQueue::new("outer");

    let stuck = Task::from_fn("stuck", |task| async move {
        task.cancelled().await;
        task.finish_ok();
    });
    let group = Arc::new(GroupTask::new("doomed", [stuck]));

    let runner = {
        let queue = queue.clone();
        let task = group.task().clone();
        tokio::spawn(async move { queue.add_batch_and_wait(&[task]).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    group.cancel();
    runner.await.unwrap();
    assert!(group.task().is_finished());
}

#[tokio::test]
async fn cancelling_an_unstarted_group_still_finishes_its_children() {
    init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));

    let child = logged_task("never-runs", &log);
    let group = GroupTask::new("abandoned", [child.clone()]);
    // never added to an outer queue, so the internal queue stays suspended
    group.cancel();

    wait_finished(&child).await;
    assert!(group.task().is_cancelled());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_group_finishes_cleanly() {
    init_tracing();
    let queue = TaskQueue::new("outer");
    let errors = Arc::new(Mutex::new(Vec::new()));

    let group = GroupTask::new("empty", Vec::new());
    record_group_errors(&group, &errors);

    queue.add_batch_and_wait(&[group.task().clone()]).await;

    assert!(group.task().is_finished());
    assert!(errors.lock().unwrap().is_empty());
}
