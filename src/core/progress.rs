use crate::logging::{log, LogLevel};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Receives the running "X of Y" status while pages are being retrieved.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, done: u64, target: u64);
}

/// Sink that only writes the status to the log.
pub struct LogProgressSink;

#[async_trait]
impl ProgressSink for LogProgressSink {
    async fn publish(&self, done: u64, target: u64) {
        log(
            LogLevel::Info,
            &format!("Parsing items... {} of {} completed.", done, target),
        );
    }
}

/// Sink for callers that do not care about progress.
pub struct NoopProgressSink;

#[async_trait]
impl ProgressSink for NoopProgressSink {
    async fn publish(&self, _done: u64, _target: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEnd {
    TargetReached,
    SendersClosed,
    IdleTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub done: u64,
    pub target: u64,
    pub end: ProgressEnd,
}

#[derive(Clone)]
pub struct ProgressSender(mpsc::UnboundedSender<u64>);

impl ProgressSender {
    /// Records one finished page. A reporter that already stopped is not an error.
    pub fn page_done(&self, item_count: usize) {
        let _ = self.0.send(item_count as u64);
    }
}

pub struct ProgressReporter {
    rx: mpsc::UnboundedReceiver<u64>,
    target: u64,
    idle_timeout: Duration,
    sink: Arc<dyn ProgressSink>,
}

pub fn progress_channel(
    target: u64,
    idle_timeout: Duration,
    sink: Arc<dyn ProgressSink>,
) -> (ProgressSender, ProgressReporter) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender(tx),
        ProgressReporter {
            rx,
            target,
            idle_timeout,
            sink,
        },
    )
}

impl ProgressReporter {
    /// Sums page counts until the target is reached, every sender is gone, or
    /// nothing arrives within the idle timeout.
    pub async fn run(mut self) -> ProgressSummary {
        let mut done: u64 = 0;
        self.sink.publish(done, self.target).await;

        let end = loop {
            if done >= self.target {
                break ProgressEnd::TargetReached;
            }
            match timeout(self.idle_timeout, self.rx.recv()).await {
                Ok(Some(count)) => {
                    done = done.saturating_add(count);
                    self.sink.publish(done, self.target).await;
                }
                Ok(None) => break ProgressEnd::SendersClosed,
                Err(_) => {
                    log(
                        LogLevel::Warning,
                        &format!(
                            "Progress: no page finished within {:?}, stopping at {} of {}.",
                            self.idle_timeout, done, self.target
                        ),
                    );
                    break ProgressEnd::IdleTimeout;
                }
            }
        };

        ProgressSummary {
            done,
            target: self.target,
            end,
        }
    }
}
