use super::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::task::Task;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// A very high-level, one-shot reachability check: can a TCP connection to
/// `host:port` be opened within the probe timeout?
///
/// This does *not* monitor reachability continuously, nor does it react to
/// changes. It is evaluated once, when the gated task's predecessors have
/// finished and the task is asked about its readiness.
pub struct ReachabilityCondition {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ReachabilityCondition {
    pub const NAME: &'static str = "Reachability";

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Bound the connect probe by a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Condition for ReachabilityCondition {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        let address = format!("{}:{}", self.host, self.port);
        let probe = tokio::time::timeout(self.timeout, TcpStream::connect(&address)).await;
        match probe {
            Ok(Ok(_stream)) => ConditionResult::Satisfied,
            Ok(Err(error)) => {
                debug!("reachability probe to {} failed: {}", address, error);
                ConditionResult::Failed(
                    TaskError::condition_failed(Self::NAME)
                        .with("host", &self.host)
                        .with("port", self.port)
                        .with("cause", error.to_string()),
                )
            }
            Err(_elapsed) => {
                debug!("reachability probe to {} timed out", address);
                ConditionResult::Failed(
                    TaskError::condition_failed(Self::NAME)
                        .with("host", &self.host)
                        .with("port", self.port)
                        .with("cause", "probe timed out"),
                )
            }
        }
    }
}
