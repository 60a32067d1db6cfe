//! Harness entry point and run loop.
use crate::aggregate::Aggregator;
use crate::collector::Collector;
use crate::config::RunConfig;
use crate::error::Error;
use crate::pool::WorkerPool;
use crate::scheduler::{Stage, StageSchedule};
use crate::threshold::{evaluate, RunResult, Threshold};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{interval, Instant, MissedTickBehavior};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Granularity of the scheduler: how often sizing commands are issued and
/// samples are drained.
const TICK_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_EVERY: u32 = 10;

/// A configured load-test run.
///
/// Build one with [`Harness::new`], chain the [`ConfigurableHarness`]
/// builder methods, and `.await` it to execute the run:
///
/// ```no_run
/// use stampede::prelude::*;
/// use std::time::Duration;
///
/// # #[tokio::main] async fn main() -> Result<(), stampede::Error> {
/// let result = Harness::new("smoke", || async {
///     tokio::time::sleep(Duration::from_millis(5)).await;
///     Ok::<(), ()>(())
/// })
/// .stage(Duration::from_secs(10), 50)
/// .stage(Duration::from_secs(110), 50)
/// .threshold(ITERATION_DURATION, "p(95)<1000")
/// .await?;
///
/// std::process::exit(result.exit_code());
/// # }
/// ```
#[pin_project::pin_project]
pub struct Harness<T> {
    iteration: T,
    runner_fut: Option<Pin<Box<dyn Future<Output = Result<RunResult, Error>> + Send>>>,
    config: RunConfig,
}

impl<T> Harness<T> {
    pub fn new(name: &str, iteration: T) -> Self {
        Self {
            iteration,
            runner_fut: None,
            config: RunConfig::new(name),
        }
    }
}

impl<T, F, E> Future for Harness<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = Result<(), E>> + Send,
    E: Send + 'static,
{
    type Output = Result<RunResult, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let iteration = self.iteration.clone();
            let config = self.config.clone();
            self.runner_fut = Some(Box::pin(async move { run_harness(iteration, config).await }));
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

/// Builder methods for a [`Harness`].
pub trait ConfigurableHarness<T: Send>: Future<Output = T> + Sized + Send {
    /// Append one ramp stage: move toward `target` virtual users over
    /// `duration`, starting from wherever the previous stage left off.
    fn stage(self, duration: Duration, target: u32) -> Self;

    /// Append a whole stage sequence.
    fn stages<I>(self, stages: I) -> Self
    where
        I: IntoIterator<Item = Stage>;

    /// Attach a threshold expression (`"p(95)<1000"`, `"max<1500"`, ...) to
    /// `metric`. Parsed when the run starts; a malformed expression refuses
    /// to start the run.
    fn threshold(self, metric: &str, expr: &str) -> Self;

    /// Hard cap on total run time. Workers are still stopped cooperatively:
    /// in-flight iterations finish and their samples are recorded.
    fn timeout(self, duration: Duration) -> Self;
}

impl<T, F, E> ConfigurableHarness<Result<RunResult, Error>> for Harness<T>
where
    T: Fn() -> F + Send + 'static + Clone + Sync,
    F: Future<Output = Result<(), E>> + Send,
    E: Send + 'static,
{
    fn stage(mut self, duration: Duration, target: u32) -> Self {
        self.config.stages.push(Stage::new(duration, target));
        self
    }

    fn stages<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = Stage>,
    {
        self.config.stages.extend(stages);
        self
    }

    fn threshold(mut self, metric: &str, expr: &str) -> Self {
        self.config
            .thresholds
            .push((metric.to_string(), expr.to_string()));
        self
    }

    fn timeout(mut self, duration: Duration) -> Self {
        self.config.timeout = Some(duration);
        self
    }
}

#[instrument(name = "harness", skip_all, fields(name = config.name))]
pub(crate) async fn run_harness<T, F, E>(
    iteration: T,
    config: RunConfig,
) -> Result<RunResult, Error>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = Result<(), E>> + Send,
    E: Send + 'static,
{
    // Validate everything up front; no run starts on a malformed config.
    let schedule = StageSchedule::new(&config.stages)?;
    let thresholds: Vec<Threshold> = config
        .thresholds
        .iter()
        .map(|(metric, expr)| Threshold::parse(metric, expr))
        .collect::<Result<_, _>>()?;

    info!("Running {} with config {:?}", config.name, &config);

    let collector = Collector::new();
    let mut pool = WorkerPool::new(iteration, collector.clone());
    let mut aggregator = Aggregator::new();

    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let start = Instant::now();
    let mut ticks: u32 = 0;

    // NOTE: This loop is time-sensitive. Nothing in it blocks beyond the
    // tick await; worker retirement is signaled, never awaited, here.
    loop {
        ticker.tick().await;
        let elapsed = start.elapsed();

        for sample in collector.drain() {
            aggregator.ingest(sample);
        }
        pool.reap_retired();

        if config.timeout.map_or(false, |timeout| elapsed >= timeout) {
            warn!("Run timeout reached; stopping early");
            break;
        }

        match schedule.target_at(elapsed) {
            Some(target) => pool.resize(target as usize),
            None => break,
        }

        ticks += 1;
        if ticks % PROGRESS_EVERY == 0 {
            let (success, error) = collector.totals();
            let snapshot = aggregator.snapshot(success, error);
            let p95 = snapshot
                .get(crate::collector::ITERATION_DURATION)
                .map(|metric| metric.p95())
                .unwrap_or(0.);
            debug!(
                "t={} live={} iterations={} p95={p95:.2}ms",
                humantime::format_duration(Duration::from_secs(elapsed.as_secs())),
                pool.concurrency(),
                success + error,
            );
        }
    }

    // Cooperative drain: every in-flight iteration finishes and its sample
    // lands before the final snapshot is taken.
    pool.shutdown().await;
    for sample in collector.drain() {
        aggregator.ingest(sample);
    }

    let (success, error) = collector.totals();
    let snapshot = aggregator.snapshot(success, error);
    info!("Run complete: {snapshot}");

    Ok(evaluate(&thresholds, snapshot))
}
