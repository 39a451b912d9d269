use super::Observer;
use crate::error::TaskError;
use crate::task::Task;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

struct IndicatorState {
    active: usize,
    /// Bumped on every start/end so a scheduled hide can tell whether
    /// activity resumed while it was waiting.
    epoch: u64,
}

struct IndicatorInner {
    state: Mutex<IndicatorState>,
    busy_tx: watch::Sender<bool>,
    hide_delay: Duration,
}

/// A reference-counted "busy" flag for UI activity indicators.
///
/// The flag goes up as soon as any observed task starts. When the last task
/// finishes, hiding is debounced by a fixed delay: if another task starts
/// within that window the flag never drops, so short gaps between tasks do
/// not make an indicator flicker.
#[derive(Clone)]
pub struct ActivityIndicator {
    inner: Arc<IndicatorInner>,
}

impl ActivityIndicator {
    pub fn new(hide_delay: Duration) -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(IndicatorInner {
                state: Mutex::new(IndicatorState {
                    active: 0,
                    epoch: 0,
                }),
                busy_tx,
                hide_delay,
            }),
        }
    }

    /// An observer that ties a task's lifetime to this indicator
    pub fn observer(&self) -> ActivityObserver {
        ActivityObserver {
            indicator: self.clone(),
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.inner.busy_tx.borrow()
    }

    /// Watch the busy flag, e.g. to drive a spinner
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.busy_tx.subscribe()
    }

    fn activity_started(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.active += 1;
            state.epoch += 1;
        }
        self.inner.busy_tx.send_replace(true);
    }

    fn activity_ended(&self) {
        let scheduled_epoch = {
            let mut state = self.inner.state.lock().unwrap();
            state.active = state.active.saturating_sub(1);
            state.epoch += 1;
            (state.active == 0).then_some(state.epoch)
        };
        let Some(epoch) = scheduled_epoch else {
            return;
        };
        let indicator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(indicator.inner.hide_delay).await;
            let still_idle = {
                let state = indicator.inner.state.lock().unwrap();
                state.epoch == epoch && state.active == 0
            };
            if still_idle {
                indicator.inner.busy_tx.send_replace(false);
            }
        });
    }
}

/// Raises an [`ActivityIndicator`] while the observed task executes
pub struct ActivityObserver {
    indicator: ActivityIndicator,
}

impl Observer for ActivityObserver {
    fn started(&self, _task: &Task) {
        self.indicator.activity_started();
    }

    fn finished(&self, _task: &Task, _errors: &[TaskError]) {
        self.indicator.activity_ended();
    }
}
