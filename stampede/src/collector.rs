use metrics_util::AtomicBucket;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::time::Instant;

/// Metric name under which every iteration's wall-clock duration is recorded.
pub const ITERATION_DURATION: &str = "iteration_duration";

/// A single measurement emitted by a virtual-user iteration.
///
/// Samples are append-only: a worker pushes them into the shared bucket and
/// never sees them again; the run loop drains the bucket into the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub metric: &'static str,
    /// Measured value in milliseconds.
    pub value_ms: f64,
    pub at: Instant,
}

/// Lock-free sample transport shared between all workers and the run loop.
///
/// Workers only push; the run loop is the single drainer. Success/error
/// counters are cumulative over the whole run.
#[derive(Clone)]
pub(crate) struct Collector {
    success: Arc<AtomicU64>,
    error: Arc<AtomicU64>,
    samples: Arc<AtomicBucket<Sample>>,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            success: Arc::new(AtomicU64::new(0)),
            error: Arc::new(AtomicU64::new(0)),
            samples: Arc::new(AtomicBucket::new()),
        }
    }

    pub fn record(&self, success: bool, elapsed: Duration) {
        let value_ms = elapsed.as_secs_f64() * 1e3;
        self.samples.push(Sample {
            metric: ITERATION_DURATION,
            value_ms,
            at: Instant::now(),
        });

        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!("stampede.iteration_duration_ms").record(value_ms);
            if success {
                metrics::counter!("stampede.iteration_success").increment(1);
            } else {
                metrics::counter!("stampede.iteration_error").increment(1);
            }
        }
    }

    pub fn drain(&self) -> Vec<Sample> {
        let mut out = vec![];
        self.samples.clear_with(|samples| {
            out.extend_from_slice(samples);
        });
        out
    }

    pub fn totals(&self) -> (u64, u64) {
        (
            self.success.load(Ordering::Relaxed),
            self.error.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_moves_samples_out() {
        let collector = Collector::new();
        collector.record(true, Duration::from_millis(200));
        collector.record(false, Duration::from_millis(500));

        let samples = collector.drain();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.metric == ITERATION_DURATION));
        assert!(collector.drain().is_empty());
        assert_eq!(collector.totals(), (1, 1));
    }

    #[tokio::test]
    async fn concurrent_pushes_are_not_lost() {
        let collector = Collector::new();
        let mut handles = vec![];
        for _ in 0..8 {
            let collector = collector.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..1_000 {
                    collector.record(true, Duration::from_millis(1));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(collector.drain().len(), 8_000);
        assert_eq!(collector.totals(), (8_000, 0));
    }
}
