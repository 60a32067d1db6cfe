//! Streaming per-metric aggregation.
//!
//! Each metric keeps a t-digest for quantile estimates plus exact
//! min/max/sum/count, so `max<...` and `avg<...` thresholds are not subject
//! to sketch error. Durations of failed iterations are recorded like any
//! other: a timing threshold should not pass because the target collapsed.
use crate::collector::Sample;
use pdatastructs::tdigest::{TDigest, K1};
use std::collections::HashMap;
use std::fmt;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub(crate) struct Aggregator {
    metrics: HashMap<String, MetricAggregate>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            metrics: HashMap::new(),
        }
    }

    pub fn ingest(&mut self, sample: Sample) {
        if let Some(aggregate) = self.metrics.get_mut(sample.metric) {
            aggregate.insert(sample.value_ms);
        } else {
            let mut aggregate = MetricAggregate::new();
            aggregate.insert(sample.value_ms);
            self.metrics.insert(sample.metric.to_string(), aggregate);
        }
    }

    /// Point-in-time view of every metric's distribution. Cheap enough to
    /// call from the run loop for live reporting.
    pub fn snapshot(&self, success: u64, error: u64) -> Snapshot {
        Snapshot {
            metrics: self
                .metrics
                .iter()
                .map(|(name, aggregate)| (name.clone(), aggregate.to_snapshot()))
                .collect(),
            success,
            error,
        }
    }
}

#[derive(Debug, Clone)]
struct MetricAggregate {
    digest: TDigest<K1>,
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl MetricAggregate {
    fn new() -> Self {
        Self {
            digest: default_tdigest(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.,
            count: 0,
        }
    }

    fn insert(&mut self, value: f64) {
        self.digest.insert(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    fn to_snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            digest: self.digest.clone(),
            min: self.min,
            max: self.max,
            avg: self.sum / self.count as f64,
            count: self.count,
        }
    }
}

/// Frozen view of one metric's distribution.
#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    digest: TDigest<K1>,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: u64,
}

impl MetricSnapshot {
    /// Approximate quantile in `[0, 1]`, in the metric's native unit
    /// (milliseconds for iteration durations).
    pub fn quantile(&self, q: f64) -> f64 {
        let value = self.digest.quantile(q);
        // The t-digest occasionally returns NaN on sparse data; clamp it
        // rather than poisoning the threshold comparison.
        if value.is_finite() {
            value
        } else {
            error!("Non-finite quantile estimate; reporting 0.");
            0.
        }
    }

    pub fn p50(&self) -> f64 {
        self.quantile(0.50)
    }

    pub fn p90(&self) -> f64 {
        self.quantile(0.90)
    }

    pub fn p95(&self) -> f64 {
        self.quantile(0.95)
    }

    pub fn p99(&self) -> f64 {
        self.quantile(0.99)
    }
}

impl fmt::Display for MetricSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={} avg={:.2}ms p50={:.2}ms p90={:.2}ms p95={:.2}ms p99={:.2}ms max={:.2}ms",
            self.count,
            self.avg,
            self.p50(),
            self.p90(),
            self.p95(),
            self.p99(),
            self.max,
        )
    }
}

/// Final (or periodic) view of all metric distributions plus the cumulative
/// success/error counts.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub metrics: HashMap<String, MetricSnapshot>,
    pub success: u64,
    pub error: u64,
}

impl Snapshot {
    pub fn get(&self, metric: &str) -> Option<&MetricSnapshot> {
        self.metrics.get(metric)
    }

    pub fn error_rate(&self) -> f64 {
        let total = self.success + self.error;
        if total == 0 {
            0.
        } else {
            self.error as f64 / total as f64
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations={} error_rate={:.2}%",
            self.success + self.error,
            self.error_rate() * 100.,
        )?;
        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            write!(f, "\n  {name}: {}", self.metrics[name])?;
        }
        Ok(())
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
