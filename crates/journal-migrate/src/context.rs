//! Shared run context for the three engines.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, RunStatus};
use crate::retry::{with_retry, RetryConfig};
use crate::stores::{SourceStore, TargetStore};

/// Default limit for a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Stores, tracker and call policy shared by the engines of one pipeline.
#[derive(Clone)]
pub struct RunContext {
    /// Source (document) store.
    pub source: Arc<dyn SourceStore>,
    /// Target (REST) store.
    pub target: Arc<dyn TargetStore>,
    /// Status and progress of the current run.
    pub tracker: Arc<ProgressTracker>,
    store_timeout: Duration,
    retry: RetryConfig,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("source", &self.source.store_type())
            .field("target", &self.target.store_type())
            .field("store_timeout", &self.store_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl RunContext {
    /// Creates a context with default timeout and retry policy.
    pub fn new(
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            source,
            target,
            tracker,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the limit for a single store call.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Sets the retry policy for store reads.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Awaits a store call, failing with [`Error::Timeout`] if it hangs.
    pub async fn timed<T, Fut>(&self, operation: &str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
                secs: self.store_timeout.as_secs(),
            })?
    }

    /// Runs a read with timeout and retry.
    pub async fn read<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_retry(&self.retry, operation, || self.timed(operation, call())).await
    }

    /// Marks the run finished: `Completed` without failures, else `Failed`.
    pub fn finish_run(&self, failed: usize, detail: impl Into<String>) {
        let status = if failed == 0 {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.tracker.set_status(status, detail);
    }

    /// Records a run-level error on the tracker and hands it back.
    pub fn abort_run(&self, err: Error) -> Error {
        if err.is_store_error() {
            error!("Run aborted by store failure: {}", err);
        } else {
            error!("Run aborted: {}", err);
        }
        self.tracker.set_error(err.to_string());
        err
    }
}
