//! Batched, rate-limited execution of independent remote calls.
//!
//! Items are split into consecutive groups of `batch_size`. Every item in a
//! group runs concurrently on the calling task; the group is done once every
//! item has settled, and the scheduler then pauses for `inter_batch_delay`
//! before starting the next group. The achieved request rate is therefore
//! roughly `batch_size / inter_batch_delay`.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use ic_error::{IcError, Result};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for batched execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items run concurrently within one batch.
    pub batch_size: usize,
    /// Cooldown between consecutive batches, in milliseconds.
    pub inter_batch_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay_ms: 500,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the cooldown between batches in milliseconds.
    pub fn with_inter_batch_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_batch_delay_ms = delay_ms;
        self
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Approximate upper bound on requests per second.
    pub fn max_request_rate(&self) -> Option<f64> {
        if self.inter_batch_delay_ms == 0 {
            None
        } else {
            Some(self.batch_size as f64 * 1000.0 / self.inter_batch_delay_ms as f64)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IcError::Config("batch size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a batched run.
///
/// `results` holds one entry per input item, in input order.
#[derive(Debug)]
pub struct BatchRun<I, T> {
    pub results: Vec<(I, Result<T>)>,
    /// Number of batches actually started
    pub batches_run: usize,
    /// Whether the run stopped early because of cancellation
    pub cancelled: bool,
}

impl<I, T> BatchRun<I, T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Whether any item was cut short by cancellation.
    ///
    /// True when batches were skipped, or when an in-flight item gave up on
    /// cancellation. A run that settled every item before the signal fired
    /// is not interrupted.
    pub fn interrupted(&self) -> bool {
        self.cancelled
            || self
                .results
                .iter()
                .any(|(_, r)| matches!(r, Err(e) if e.is_cancelled()))
    }

    /// Split into successes and failures, each preserving input order.
    pub fn partition(self) -> (Vec<(I, T)>, Vec<(I, IcError)>) {
        let mut ok = Vec::new();
        let mut failed = Vec::new();
        for (item, result) in self.results {
            match result {
                Ok(value) => ok.push((item, value)),
                Err(e) => failed.push((item, e)),
            }
        }
        (ok, failed)
    }
}

/// Runs work items in fixed-size concurrent batches with a cooldown between them.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    config: BatchConfig,
}

impl BatchScheduler {
    /// Create a scheduler, rejecting a zero batch size.
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run `worker` over every item.
    ///
    /// One item's failure never affects its siblings. Once `cancel` fires no
    /// further batch is started; items already running finish normally and
    /// items never started settle as [`IcError::Cancelled`].
    pub async fn run<I, T, F, Fut>(
        &self,
        label: &str,
        items: Vec<I>,
        cancel: &CancellationToken,
        worker: F,
    ) -> BatchRun<I, T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total = items.len();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);
        let delay = self.config.inter_batch_delay();

        let mut results: Vec<(I, Result<T>)> = Vec::with_capacity(total);
        let mut remaining = items.into_iter();
        let mut batches_run = 0usize;
        let mut cancelled = false;

        debug!(label, total, batch_size, total_batches, "Starting batched run");

        loop {
            let batch: Vec<I> = remaining.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }

            if batches_run > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                cancelled = true;
                results.extend(batch.into_iter().map(|item| (item, Err(IcError::Cancelled))));
                break;
            }

            let settled = join_all(batch.iter().cloned().map(&worker)).await;
            batches_run += 1;

            let failed = settled.iter().filter(|r| r.is_err()).count();
            debug!(
                label,
                batch = batches_run,
                total_batches,
                size = batch.len(),
                failed,
                "Batch settled"
            );

            results.extend(batch.into_iter().zip(settled));
        }

        if cancelled {
            results.extend(remaining.map(|item| (item, Err(IcError::Cancelled))));
            debug!(label, batches_run, "Batched run cancelled");
        }

        BatchRun {
            results,
            batches_run,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    fn scheduler(batch_size: usize, delay_ms: u64) -> BatchScheduler {
        BatchScheduler::new(
            BatchConfig::new()
                .with_batch_size(batch_size)
                .with_inter_batch_delay_ms(delay_ms),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.inter_batch_delay_ms, 500);
        assert_eq!(config.max_request_rate(), Some(20.0));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = BatchScheduler::new(BatchConfig::new().with_batch_size(0));
        assert!(matches!(result, Err(IcError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let cancel = CancellationToken::new();
        let run = scheduler(3, 0)
            .run("empty", Vec::<u32>::new(), &cancel, |n| async move { Ok(n) })
            .await;

        assert!(run.is_empty());
        assert_eq!(run.batches_run, 0);
        assert!(!run.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_despite_completion_order() {
        let cancel = CancellationToken::new();
        let items: Vec<u64> = (0..7).collect();

        // Later items in each batch finish first.
        let run = scheduler(4, 10)
            .run("ordering", items.clone(), &cancel, |n| async move {
                sleep(Duration::from_millis(100 - n * 10)).await;
                Ok(n * 2)
            })
            .await;

        let returned: Vec<u64> = run.results.iter().map(|(i, _)| *i).collect();
        assert_eq!(returned, items);
        for (item, result) in &run.results {
            assert_eq!(*result.as_ref().unwrap(), item * 2);
        }
        assert_eq!(run.batches_run, 2);
    }

    #[tokio::test]
    async fn test_failure_isolated_within_batch() {
        let cancel = CancellationToken::new();
        let run = scheduler(5, 0)
            .run("isolation", (0..5).collect(), &cancel, |n: u32| async move {
                if n == 2 {
                    Err(IcError::NotFound(format!("/item/{n}")))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(run.succeeded(), 4);
        assert_eq!(run.failed(), 1);
        assert!(matches!(run.results[2].1, Err(IcError::NotFound(_))));

        let (ok, failed) = run.partition();
        assert_eq!(ok.len(), 4);
        assert_eq!(failed[0].0, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_batch_size() {
        let cancel = CancellationToken::new();
        let in_flight = Cell::new(0usize);
        let peak = Cell::new(0usize);

        let run = scheduler(3, 50)
            .run("bounded", (0..10).collect::<Vec<u32>>(), &cancel, |n| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    in_flight.set(in_flight.get() + 1);
                    peak.set(peak.get().max(in_flight.get()));
                    sleep(Duration::from_millis(20)).await;
                    in_flight.set(in_flight.get() - 1);
                    Ok(n)
                }
            })
            .await;

        assert_eq!(run.len(), 10);
        assert_eq!(peak.get(), 3);
        assert_eq!(run.batches_run, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_batch_delay_applied_between_batches_only() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let run = scheduler(2, 100)
            .run("delay", (0..6).collect::<Vec<u32>>(), &cancel, |n| async move { Ok(n) })
            .await;

        // Three batches, two cooldowns.
        assert_eq!(run.batches_run, 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_further_batches() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let run = scheduler(2, 1_000)
            .run("cancel", (0..6).collect::<Vec<u32>>(), &cancel, |n| {
                let trigger = trigger.clone();
                async move {
                    if n == 1 {
                        trigger.cancel();
                    }
                    // In-flight items still complete.
                    sleep(Duration::from_millis(10)).await;
                    Ok(n)
                }
            })
            .await;

        assert!(run.cancelled);
        assert!(run.interrupted());
        assert_eq!(run.batches_run, 1);
        assert_eq!(run.len(), 6);
        assert!(run.results[0].1.is_ok());
        assert!(run.results[1].1.is_ok());
        assert!(
            run.results[2..]
                .iter()
                .all(|(_, r)| matches!(r, Err(IcError::Cancelled)))
        );
    }

    #[tokio::test]
    async fn test_cancel_after_last_batch_is_not_interrupted() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        // The final item fires the token, but nothing is left to skip.
        let run = scheduler(4, 0)
            .run("late", vec![1u32, 2, 3], &cancel, |n| {
                let trigger = trigger.clone();
                async move {
                    if n == 3 {
                        trigger.cancel();
                    }
                    Ok(n)
                }
            })
            .await;

        assert!(cancel.is_cancelled());
        assert!(!run.cancelled);
        assert!(!run.interrupted());
        assert_eq!(run.succeeded(), 3);
    }

    #[test]
    fn test_cancelled_item_marks_run_interrupted() {
        let run: BatchRun<u32, u32> = BatchRun {
            results: vec![(1, Ok(1)), (2, Err(IcError::Cancelled))],
            batches_run: 1,
            cancelled: false,
        };
        assert!(run.interrupted());

        let failed: BatchRun<u32, u32> = BatchRun {
            results: vec![(1, Err(IcError::Transport("reset".into())))],
            batches_run: 1,
            cancelled: false,
        };
        assert!(!failed.interrupted());
    }

    proptest! {
        #[test]
        fn prop_returns_every_item_in_order(
            batch_size in 1usize..12,
            items in proptest::collection::vec(0u32..1000, 0..60),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let run = rt.block_on(async {
                let cancel = CancellationToken::new();
                scheduler(batch_size, 5)
                    .run("prop", items.clone(), &cancel, |n| async move {
                        if n % 3 == 0 {
                            Err(IcError::Transport(format!("item {n}")))
                        } else {
                            Ok(n)
                        }
                    })
                    .await
            });

            prop_assert_eq!(run.len(), items.len());
            let returned: Vec<u32> = run.results.iter().map(|(i, _)| *i).collect();
            prop_assert_eq!(&returned, &items);
            prop_assert_eq!(run.batches_run, items.len().div_ceil(batch_size));
            for (item, result) in &run.results {
                prop_assert_eq!(result.is_ok(), item % 3 != 0);
            }
        }
    }
}
