use super::Observer;
use crate::error::TaskError;
use crate::task::Task;

type StartFn = Box<dyn Fn(&Task) + Send + Sync>;
type ProduceFn = Box<dyn Fn(&Task, &Task) + Send + Sync>;
type FinishFn = Box<dyn Fn(&Task, &[TaskError]) + Send + Sync>;

/// Attaches ad hoc closures to the significant events in a task's lifecycle.
/// Any subset of the three hooks may be set.
#[derive(Default)]
pub struct BlockObserver {
    start_handler: Option<StartFn>,
    produce_handler: Option<ProduceFn>,
    finish_handler: Option<FinishFn>,
}

impl BlockObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, handler: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.start_handler = Some(Box::new(handler));
        self
    }

    pub fn on_produce(mut self, handler: impl Fn(&Task, &Task) + Send + Sync + 'static) -> Self {
        self.produce_handler = Some(Box::new(handler));
        self
    }

    pub fn on_finish(
        mut self,
        handler: impl Fn(&Task, &[TaskError]) + Send + Sync + 'static,
    ) -> Self {
        self.finish_handler = Some(Box::new(handler));
        self
    }
}

impl Observer for BlockObserver {
    fn started(&self, task: &Task) {
        if let Some(handler) = &self.start_handler {
            handler(task);
        }
    }

    fn produced(&self, task: &Task, new_task: &Task) {
        if let Some(handler) = &self.produce_handler {
            handler(task, new_task);
        }
    }

    fn finished(&self, task: &Task, errors: &[TaskError]) {
        if let Some(handler) = &self.finish_handler {
            handler(task, errors);
        }
    }
}
