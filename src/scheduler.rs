//! Execution context for subscriber continuations
//!
//! A `Scheduler` runs acknowledgment continuations on a tokio runtime and
//! owns the failure hook for signals that cannot be delivered downstream
//! (for example a second error after a terminal signal was already sent).

use crate::error::{Result, StreamError};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Hook for errors that cannot be delivered to any subscriber
pub trait FailureReporter: Send + Sync {
    /// Report an undeliverable error
    fn report(&self, error: StreamError);
}

/// Default reporter: logs undeliverable errors
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, error: StreamError) {
        tracing::error!(error = %error, "Undeliverable stream failure");
    }
}

/// A reported failure, kept by `MemoryFailureReporter`
#[derive(Debug, Clone)]
pub struct ReportedFailure {
    /// Rendered error message
    pub message: String,

    /// Unix timestamp in milliseconds when the failure was reported
    pub reported_at: u64,
}

/// In-memory failure reporter for development and testing
///
/// Keeps reported failures in a `Vec` with configurable max capacity.
pub struct MemoryFailureReporter {
    failures: RwLock<Vec<ReportedFailure>>,
    max_failures: usize,
}

impl MemoryFailureReporter {
    /// Create a new in-memory reporter
    pub fn new(max_failures: usize) -> Self {
        Self {
            failures: RwLock::new(Vec::new()),
            max_failures,
        }
    }

    /// Number of failures currently kept
    pub fn count(&self) -> usize {
        self.failures.read().map(|f| f.len()).unwrap_or_default()
    }

    /// List recent failures, most recent first
    pub fn list(&self, limit: usize) -> Vec<ReportedFailure> {
        match self.failures.read() {
            Ok(failures) => failures.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for MemoryFailureReporter {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl FailureReporter for MemoryFailureReporter {
    fn report(&self, error: StreamError) {
        tracing::warn!(error = %error, "Stream failure reported");

        let Ok(mut failures) = self.failures.write() else {
            return;
        };
        failures.push(ReportedFailure {
            message: error.to_string(),
            reported_at: now_millis(),
        });

        if self.max_failures > 0 && failures.len() > self.max_failures {
            let drain_count = failures.len() - self.max_failures;
            failures.drain(..drain_count);
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Runtime handle plus failure hook shared by a subscriber chain
#[derive(Clone)]
pub struct Scheduler {
    handle: Handle,
    reporter: Arc<dyn FailureReporter>,
}

impl Scheduler {
    /// Create a scheduler on the given runtime, logging undeliverable failures
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            reporter: Arc::new(LogReporter),
        }
    }

    /// Create a scheduler bound to the runtime of the calling task
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| StreamError::Runtime(format!("no tokio runtime: {}", e)))?;
        Ok(Self::new(handle))
    }

    /// Replace the failure hook
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Spawn a continuation on the runtime
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Route an error that cannot be delivered to the failure hook
    pub fn report_failure(&self, error: StreamError) {
        self.reporter.report(error);
    }

    /// The underlying runtime handle
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_outside_runtime() {
        let err = Scheduler::current().unwrap_err();
        assert!(matches!(err, StreamError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_spawn_runs_continuation() {
        let scheduler = Scheduler::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.spawn(async move {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_report_failure_reaches_reporter() {
        let reporter = Arc::new(MemoryFailureReporter::default());
        let scheduler = Scheduler::current().unwrap().with_reporter(reporter.clone());

        scheduler.report_failure(StreamError::upstream("late error"));

        assert_eq!(reporter.count(), 1);
        assert!(reporter.list(1)[0].message.contains("late error"));
        assert!(reporter.list(1)[0].reported_at > 0);
    }

    #[test]
    fn test_memory_reporter_max_capacity() {
        let reporter = MemoryFailureReporter::new(3);
        for i in 0..5 {
            reporter.report(StreamError::upstream(format!("failure {}", i)));
        }

        assert_eq!(reporter.count(), 3);
        let list = reporter.list(10);
        // Oldest failures drained, most recent first
        assert!(list[0].message.contains("failure 4"));
        assert!(list[2].message.contains("failure 2"));
    }
}
