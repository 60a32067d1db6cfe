//! The virtual-user pool.
use crate::collector::Collector;
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A set of independently scheduled workers, each looping the user-supplied
/// iteration function.
///
/// The iteration is opaque: the pool only times it, maps `Ok`/`Err` to
/// success/failure, and records exactly one sample per completed pass.
/// Ramp-down is cooperative. A retired worker observes its stop flag between
/// iterations, so an in-flight iteration always completes and its sample is
/// always emitted; the worker leaves the live count immediately and is
/// reaped once its task actually finishes.
pub(crate) struct WorkerPool<T> {
    iteration: T,
    collector: Collector,
    workers: Vec<Worker>,
    retiring: Vec<Worker>,
    next_id: u64,
}

struct Worker {
    id: u64,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl<T, F, E> WorkerPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = Result<(), E>> + Send,
    E: Send + 'static,
{
    pub fn new(iteration: T, collector: Collector) -> Self {
        Self {
            iteration,
            collector,
            workers: vec![],
            retiring: vec![],
            next_id: 0,
        }
    }

    pub fn resize(&mut self, concurrency: usize) {
        if self.workers.len() == concurrency {
            return;
        }

        if self.workers.len() > concurrency {
            for worker in self.workers.drain(concurrency..) {
                trace!("Retiring virtual user {}", worker.id);
                worker.stop.store(true, Ordering::Relaxed);
                self.retiring.push(worker);
            }
        } else {
            while self.workers.len() < concurrency {
                self.spawn_worker();
            }
        }

        #[cfg(feature = "metrics")]
        metrics::gauge!("stampede.concurrency").set(self.workers.len() as f64);
    }

    fn spawn_worker(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let iteration = self.iteration.clone();
        let collector = self.collector.clone();

        let handle = tokio::spawn(async move {
            let mut iteration_count: u64 = 0;
            while !flag.load(Ordering::Relaxed) {
                let start = Instant::now();
                let result = iteration().await;
                collector.record(result.is_ok(), start.elapsed());
                iteration_count += 1;

                // Explicit suspension point so a worker never starves its
                // siblings even when the iteration completes synchronously.
                tokio::task::yield_now().await;
            }
            trace!("Virtual user {id} retired after {iteration_count} iterations");
        });

        self.workers.push(Worker { id, stop, handle });
    }

    /// Number of live (non-retiring) virtual users.
    pub fn concurrency(&self) -> usize {
        self.workers.len()
    }

    /// Drop handles of retired workers whose final iteration has finished.
    pub fn reap_retired(&mut self) {
        self.retiring.retain(|worker| !worker.handle.is_finished());
    }

    /// Stop every worker and wait for their in-flight iterations to finish.
    pub async fn shutdown(mut self) {
        for worker in &self.workers {
            worker.stop.store(true, Ordering::Relaxed);
        }

        for worker in self.workers.drain(..).chain(self.retiring.drain(..)) {
            if let Err(err) = worker.handle.await {
                error!("Virtual user {} panicked: {err}", worker.id);
            }
        }
    }
}
