use super::{Task, Work};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

enum Delay {
    Interval(Duration),
    Until(DateTime<Utc>),
}

/// Waits out its delay without blocking a worker thread, then finishes.
/// Cancellation cuts the wait short.
struct DelayWork {
    delay: Delay,
}

#[async_trait]
impl Work for DelayWork {
    async fn execute(&self, task: &Task) {
        let interval = match self.delay {
            Delay::Interval(interval) => interval,
            // a date in the past yields a zero interval
            Delay::Until(date) => (date - Utc::now()).to_std().unwrap_or_default(),
        };
        if interval.is_zero() {
            task.finish_ok();
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = task.cancelled() => {}
        }
        task.finish_ok();
    }
}

impl Task {
    /// A task that finishes after the given interval elapses.
    ///
    /// Useful as a dependency to delay other work: make a task depend on a
    /// delay task and it will not start before the interval has passed.
    pub fn delay_for(interval: Duration) -> Task {
        Task::new(
            format!("delay.{}ms", interval.as_millis()),
            DelayWork {
                delay: Delay::Interval(interval),
            },
        )
    }

    /// A task that finishes once the given point in time has been reached.
    /// If the date is already in the past it finishes immediately.
    pub fn delay_until(date: DateTime<Utc>) -> Task {
        Task::new(
            format!("delay.until.{}", date.to_rfc3339()),
            DelayWork {
                delay: Delay::Until(date),
            },
        )
    }
}
