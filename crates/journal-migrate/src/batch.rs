//! Sequential batches, concurrent within each batch.
//!
//! Items are split into chunks of `batch_size`. Chunks run strictly one after
//! another; every item of a chunk is started at once and the chunk is awaited
//! as a whole, so at most `batch_size` store calls are in flight.

use futures::future::join_all;
use std::future::Future;
use tracing::debug;

use crate::error::{Error, Result};

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Position reached after a batch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStep {
    /// Zero-based batch index.
    pub index: usize,
    /// Items in the batch just completed.
    pub size: usize,
    /// Items completed so far, this batch included.
    pub processed: usize,
    /// Items overall.
    pub total: usize,
}

/// Batch runner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    batch_size: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `batch_size` is zero.
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".to_string()));
        }
        Ok(Self { batch_size })
    }

    /// Maximum items per batch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches needed for `total` items.
    #[must_use]
    pub const fn batch_count(&self, total: usize) -> usize {
        total.div_ceil(self.batch_size)
    }

    /// Runs `per_item` over every item and returns the outputs in input order.
    ///
    /// `after_batch` is called once per completed batch with the step and all
    /// outputs collected so far.
    pub async fn run<T, R, F, Fut, P>(&self, items: Vec<T>, mut per_item: F, mut after_batch: P) -> Vec<R>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
        P: FnMut(BatchStep, &[R]),
    {
        let total = items.len();
        let mut outputs = Vec::with_capacity(total);
        let mut items = items.into_iter().peekable();
        let mut index = 0;

        while items.peek().is_some() {
            let chunk: Vec<T> = items.by_ref().take(self.batch_size).collect();
            let size = chunk.len();
            debug!("Batch {}: {} items", index + 1, size);

            outputs.extend(join_all(chunk.into_iter().map(&mut per_item)).await);

            after_batch(
                BatchStep {
                    index,
                    size,
                    processed: outputs.len(),
                    total,
                },
                &outputs,
            );
            index += 1;
        }

        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_batch_policy_rejects_zero() {
        assert!(BatchPolicy::new(0).is_err());
        assert_eq!(BatchPolicy::default().batch_size(), 50);
    }

    #[test]
    fn test_batch_count() {
        let policy = BatchPolicy::new(50).unwrap();
        assert_eq!(policy.batch_count(0), 0);
        assert_eq!(policy.batch_count(50), 1);
        assert_eq!(policy.batch_count(51), 2);
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_reports_steps() {
        let policy = BatchPolicy::new(2).unwrap();
        let mut steps = Vec::new();

        let out = policy
            .run(
                vec![1, 2, 3, 4, 5],
                |n| async move {
                    // Later items finish first inside a batch.
                    tokio::time::sleep(Duration::from_millis(10 - n as u64)).await;
                    n * 10
                },
                |step, so_far| steps.push((step.index, step.size, step.processed, so_far.len())),
            )
            .await;

        assert_eq!(out, vec![10, 20, 30, 40, 50]);
        assert_eq!(steps, vec![(0, 2, 2, 2), (1, 2, 4, 4), (2, 1, 5, 5)]);
    }

    #[tokio::test]
    async fn test_run_bounds_in_flight_items() {
        let policy = BatchPolicy::new(3).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        policy
            .run(
                (0..10).collect(),
                |_: i32| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_empty_input() {
        let policy = BatchPolicy::default();
        let mut calls = 0;
        let out: Vec<i32> = policy
            .run(Vec::<i32>::new(), |n| async move { n }, |_, _| calls += 1)
            .await;
        assert!(out.is_empty());
        assert_eq!(calls, 0);
    }
}
