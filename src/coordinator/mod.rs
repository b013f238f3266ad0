//! Execution coordinator
//!
//! Runs a reduction on a background worker when the input is large, falls
//! back to the calling thread when the worker cannot be used, and makes sure
//! only the newest request's result is ever delivered.
//!
//! Use one coordinator per consumer (e.g. per chart). Every call to
//! [`Coordinator::submit`] takes the next generation number; a result whose
//! generation is no longer the newest is discarded when it arrives. Stale work
//! is never cancelled: reducers are pure, so letting it finish is harmless.

mod worker;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::SamplingConfig;
use crate::constants::offload::{DEFAULT_OFFLOAD_THRESHOLD, WORKER_THREAD_NAME};
use crate::error::{Result, SamplerError};
use crate::pipeline::{self, Job, Plan, ReductionRequest, ReductionResult};
use crate::reconcile::Reconciler;
use crate::series::Columns;

use worker::BackgroundWorker;

/// When the coordinator moves work off the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Samples to reduce above which the worker is used
    pub offload_threshold: usize,
    pub offload_enabled: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
            offload_enabled: true,
        }
    }
}

impl From<&SamplingConfig> for CoordinatorConfig {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            offload_threshold: config.offload_threshold,
            offload_enabled: config.offload_enabled,
        }
    }
}

/// What a submitted request resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The request was still the newest when its result arrived
    Delivered(ReductionResult),
    /// A newer request was submitted; the result was dropped
    Superseded { generation: u64, latest: u64 },
}

impl Outcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered(_))
    }

    pub fn into_result(self) -> Option<ReductionResult> {
        match self {
            Outcome::Delivered(result) => Some(result),
            Outcome::Superseded { .. } => None,
        }
    }
}

/// Lifecycle of the newest request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Requested,
    OffloadRunning,
    SyncRunning,
    Completed,
    Failed,
}

impl RequestState {
    /// Terminal states count as idle for the next request
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            RequestState::Idle | RequestState::Completed | RequestState::Failed
        )
    }
}

/// Counters for how requests were executed and resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub offloaded: u64,
    pub synchronous: u64,
    pub fallbacks: u64,
    pub delivered: u64,
    pub superseded: u64,
}

#[derive(Default)]
struct Counters {
    offloaded: AtomicU64,
    synchronous: AtomicU64,
    fallbacks: AtomicU64,
    delivered: AtomicU64,
    superseded: AtomicU64,
}

/// Per-consumer execution coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    reconciler: Reconciler,
    generation: AtomicU64,
    worker: Mutex<Option<BackgroundWorker>>,
    state: Mutex<(u64, RequestState)>,
    counters: Counters,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, reconciler: Reconciler) -> Self {
        Self {
            config,
            reconciler,
            generation: AtomicU64::new(0),
            worker: Mutex::new(None),
            state: Mutex::new((0, RequestState::Idle)),
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(
            CoordinatorConfig::from(config),
            Reconciler::new(config.label_format.clone()),
        )
    }

    /// Submit a request. The generation is taken immediately, so a request
    /// submitted later supersedes this one even if this future is polled
    /// first. Superseded requests resolve to [`Outcome::Superseded`], never
    /// to an error.
    pub fn submit(&self, request: ReductionRequest) -> impl Future<Output = Result<Outcome>> + '_ {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(generation, RequestState::Requested);
        async move { self.resolve(generation, request).await }
    }

    /// Generation of the newest submitted request
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// State of the newest submitted request
    pub fn state(&self) -> RequestState {
        self.state.lock().1
    }

    pub fn stats(&self) -> CoordinatorStats {
        let c = &self.counters;
        CoordinatorStats {
            offloaded: c.offloaded.load(Ordering::Relaxed),
            synchronous: c.synchronous.load(Ordering::Relaxed),
            fallbacks: c.fallbacks.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Only the newest generation may move the observable state
    fn set_state(&self, generation: u64, state: RequestState) {
        let mut current = self.state.lock();
        if generation >= current.0 {
            *current = (generation, state);
        }
    }

    async fn resolve(&self, generation: u64, request: ReductionRequest) -> Result<Outcome> {
        let result = self.execute(generation, request).await;

        if !self.is_current(generation) {
            let latest = self.generation();
            self.counters.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(
                generation,
                latest,
                failed = result.is_err(),
                "discarding superseded reduction"
            );
            return Ok(Outcome::Superseded { generation, latest });
        }

        match result {
            Ok(result) => {
                self.set_state(generation, RequestState::Completed);
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Outcome::Delivered(result))
            }
            Err(e) => {
                self.set_state(generation, RequestState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&self, generation: u64, request: ReductionRequest) -> Result<ReductionResult> {
        let plan = Plan::new(request)?;
        let Some(job) = plan.job() else {
            debug!(generation, "all series pass through");
            return Ok(plan.finish(Vec::new(), &self.reconciler));
        };

        let job = Arc::new(job);
        let outputs = if self.should_offload(&job) {
            match self.offload(generation, Arc::clone(&job)).await {
                Ok(outputs) => outputs?,
                Err(e) => {
                    self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                    warn!(generation, error = %e, "offload failed, reducing on calling thread");
                    self.run_sync(generation, &job)?
                }
            }
        } else {
            self.run_sync(generation, &job)?
        };

        Ok(plan.finish(outputs, &self.reconciler))
    }

    fn should_offload(&self, job: &Job) -> bool {
        self.config.offload_enabled && job.sample_count() > self.config.offload_threshold
    }

    /// Hand the job to the worker. The outer error means the worker could not
    /// be used; the inner result is the reducer's own.
    async fn offload(&self, generation: u64, job: Arc<Job>) -> Result<Result<Vec<Columns>>> {
        let (worker_id, receiver) = {
            let mut slot = self.worker.lock();
            let worker = match slot.take() {
                Some(worker) => worker,
                None => BackgroundWorker::spawn(WORKER_THREAD_NAME)?,
            };
            // a dead worker is dropped here; the next offload spawns a fresh one
            let receiver = worker.request(generation, job)?;
            let worker_id = worker.id();
            *slot = Some(worker);
            (worker_id, receiver)
        };

        self.set_state(generation, RequestState::OffloadRunning);
        self.counters.offloaded.fetch_add(1, Ordering::Relaxed);
        debug!(generation, "reduction offloaded");

        match receiver.await {
            Ok(reply) => {
                debug_assert_eq!(reply.generation, generation);
                Ok(reply.outputs)
            }
            Err(_) => {
                self.discard_worker(worker_id);
                Err(SamplerError::OffloadUnavailable(
                    "worker dropped the request".to_string(),
                ))
            }
        }
    }

    /// Drop the worker that failed, unless it was already replaced. The
    /// thread is joined after the slot lock is released.
    fn discard_worker(&self, worker_id: u64) {
        let failed = {
            let mut slot = self.worker.lock();
            match slot.as_ref() {
                Some(worker) if worker.id() == worker_id => slot.take(),
                _ => None,
            }
        };
        drop(failed);
    }

    fn run_sync(&self, generation: u64, job: &Job) -> Result<Vec<Columns>> {
        self.set_state(generation, RequestState::SyncRunning);
        self.counters.synchronous.fetch_add(1, Ordering::Relaxed);
        debug!(generation, samples = job.sample_count(), "reducing on calling thread");
        pipeline::run_guarded(|| pipeline::execute(job))
    }

    /// Stop the worker thread but leave it in place, as if it had died
    #[cfg(test)]
    fn stop_worker(&self) {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.as_mut() {
            worker.shutdown();
        }
    }

    /// Make the current worker panic on its next job, dropping the reply
    #[cfg(test)]
    fn fail_next_offload(&self) {
        if let Some(worker) = self.worker.lock().as_ref() {
            worker.fail_next();
        }
    }

    #[cfg(test)]
    fn worker_id(&self) -> Option<u64> {
        self.worker.lock().as_ref().map(BackgroundWorker::id)
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default(), Reconciler::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::Strategy;
    use crate::series::{Sample, Series, SeriesSet};

    fn offloading() -> Coordinator {
        Coordinator::new(
            CoordinatorConfig {
                offload_threshold: 0,
                offload_enabled: true,
            },
            Reconciler::default(),
        )
    }

    fn inline_only() -> Coordinator {
        Coordinator::new(
            CoordinatorConfig {
                offload_threshold: 0,
                offload_enabled: false,
            },
            Reconciler::default(),
        )
    }

    fn series(n: usize, phase: f64) -> Series {
        Series::new(
            (0..n)
                .map(|i| {
                    let x = i as f64;
                    Sample::new(1_600_000_000.0 + x * 15.0, (x * 0.02 + phase).sin() * 100.0)
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_offload_and_inline_paths_agree() {
        for strategy in [Strategy::Lttb, Strategy::Average, Strategy::MinMax] {
            let request = ReductionRequest::new(
                vec![series(12_000, 0.0), series(300, 1.0), series(9_001, 2.0)],
                strategy,
                777,
            );

            let offloaded = offloading();
            let inline = inline_only();
            let a = offloaded.submit(request.clone()).await.unwrap();
            let b = inline.submit(request).await.unwrap();

            assert!(a.is_delivered());
            assert_eq!(a, b, "{} differs between paths", strategy);
            assert_eq!(offloaded.stats().offloaded, 1);
            assert_eq!(offloaded.stats().synchronous, 0);
            assert_eq!(inline.stats().synchronous, 1);
        }
    }

    #[tokio::test]
    async fn test_worker_is_reused() {
        let coordinator = offloading();
        for _ in 0..3 {
            let request = ReductionRequest::new(series(2_000, 0.0), Strategy::Lttb, 100);
            assert!(coordinator.submit(request).await.unwrap().is_delivered());
        }
        assert_eq!(coordinator.stats().offloaded, 3);
        assert_eq!(coordinator.stats().fallbacks, 0);
        assert_eq!(coordinator.state(), RequestState::Completed);
    }

    #[tokio::test]
    async fn test_dead_worker_falls_back_once() {
        let coordinator = offloading();
        let request = ReductionRequest::new(series(2_000, 0.0), Strategy::Lttb, 100);
        let expected = coordinator.submit(request.clone()).await.unwrap();

        coordinator.stop_worker();
        let recovered = coordinator.submit(request.clone()).await.unwrap();
        assert_eq!(recovered, expected);

        let stats = coordinator.stats();
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.synchronous, 1);
        assert_eq!(stats.offloaded, 1);

        // a fresh worker is spawned for the next request
        let again = coordinator.submit(request).await.unwrap();
        assert_eq!(again, expected);
        assert_eq!(coordinator.stats().offloaded, 2);
    }

    #[tokio::test]
    async fn test_panicking_worker_falls_back_once() {
        let coordinator = offloading();
        let request = ReductionRequest::new(series(2_000, 0.0), Strategy::Average, 100);
        let expected = inline_only().submit(request.clone()).await.unwrap();

        assert!(coordinator.submit(request.clone()).await.unwrap().is_delivered());
        let first_worker = coordinator.worker_id();
        assert!(first_worker.is_some());

        coordinator.fail_next_offload();
        let recovered = coordinator.submit(request.clone()).await.unwrap();
        assert_eq!(recovered, expected);
        assert_eq!(coordinator.worker_id(), None, "failed worker should be discarded");

        let stats = coordinator.stats();
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.synchronous, 1);
        assert_eq!(stats.offloaded, 2);

        let again = coordinator.submit(request).await.unwrap();
        assert_eq!(again, expected);
        assert_eq!(coordinator.stats().offloaded, 3);
        assert!(coordinator.worker_id().is_some());
        assert_ne!(coordinator.worker_id(), first_worker);
    }

    #[tokio::test]
    async fn test_discard_keeps_replacement_worker() {
        let coordinator = offloading();
        let request = ReductionRequest::new(series(2_000, 0.0), Strategy::Lttb, 100);
        coordinator.submit(request).await.unwrap();
        let current = coordinator.worker_id().unwrap();

        // a stale failure report for some earlier worker
        coordinator.discard_worker(current.wrapping_add(1_000));
        assert_eq!(coordinator.worker_id(), Some(current));

        coordinator.discard_worker(current);
        assert_eq!(coordinator.worker_id(), None);
    }

    #[tokio::test]
    async fn test_small_work_stays_inline() {
        let coordinator = Coordinator::default();
        let request = ReductionRequest::new(series(5_000, 0.0), Strategy::Lttb, 500);
        let outcome = coordinator.submit(request).await.unwrap();

        assert!(outcome.is_delivered());
        assert_eq!(coordinator.stats().offloaded, 0);
        assert_eq!(coordinator.stats().synchronous, 1);
    }

    #[tokio::test]
    async fn test_pass_through_runs_no_reducer() {
        let coordinator = offloading();
        let input = series(10, 0.0);
        let request = ReductionRequest::new(input.clone(), Strategy::Lttb, 1000);
        let result = coordinator.submit(request).await.unwrap().into_result().unwrap();

        assert_eq!(result.series, SeriesSet::Single(input));
        let stats = coordinator.stats();
        assert_eq!(stats.offloaded + stats.synchronous, 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let coordinator = offloading();
        let request = ReductionRequest::new(Series::default(), Strategy::Lttb, 100);
        let result = coordinator.submit(request).await.unwrap().into_result().unwrap();

        assert_eq!(result.series, SeriesSet::Single(Series::default()));
        assert_eq!(result.original_count, 0);
        assert_eq!(result.reduced_count, 0);
    }

    #[tokio::test]
    async fn test_only_latest_generation_is_delivered() {
        for coordinator in [offloading(), inline_only()] {
            let f1 = coordinator.submit(ReductionRequest::new(series(20_000, 0.1), Strategy::Lttb, 300));
            let f2 = coordinator.submit(ReductionRequest::new(series(20_000, 0.2), Strategy::Lttb, 300));
            let f3 = coordinator.submit(ReductionRequest::new(series(20_000, 0.3), Strategy::Lttb, 300));
            let f4 = coordinator.submit(ReductionRequest::new(series(20_000, 0.4), Strategy::Lttb, 300));
            let f5 = coordinator.submit(ReductionRequest::new(series(20_000, 0.5), Strategy::Lttb, 300));
            let (r1, r2, r3, r4, r5) = tokio::join!(f1, f2, f3, f4, f5);

            for (generation, outcome) in [(1, r1), (2, r2), (3, r3), (4, r4)] {
                assert_eq!(
                    outcome.unwrap(),
                    Outcome::Superseded { generation, latest: 5 }
                );
            }
            let result = r5.unwrap().into_result().unwrap();
            assert_eq!(result.reduced_count, 300);

            let stats = coordinator.stats();
            assert_eq!(stats.delivered, 1);
            assert_eq!(stats.superseded, 4);
            assert_eq!(coordinator.generation(), 5);
        }
    }

    #[tokio::test]
    async fn test_superseded_failure_is_not_an_error() {
        let coordinator = inline_only();
        let bad = coordinator.submit(ReductionRequest::new(series(100, 0.0), Strategy::Lttb, 2));
        let good = coordinator.submit(ReductionRequest::new(series(100, 0.0), Strategy::Lttb, 10));
        let (bad, good) = tokio::join!(bad, good);

        assert!(matches!(bad, Ok(Outcome::Superseded { generation: 1, latest: 2 })));
        assert!(good.unwrap().is_delivered());
    }

    #[tokio::test]
    async fn test_current_failure_is_surfaced() {
        let coordinator = offloading();
        let request = ReductionRequest::new(series(100, 0.0), Strategy::Lttb, 2);
        let err = coordinator.submit(request).await.unwrap_err();

        assert!(matches!(err, SamplerError::InvalidThreshold { .. }));
        assert_eq!(coordinator.state(), RequestState::Failed);
        assert!(coordinator.state().is_idle());
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = SamplingConfig {
            offload_threshold: 10,
            label_format: "%H:%M:%S".to_string(),
            ..Default::default()
        };
        let coordinator = Coordinator::from_config(&config);
        let mut input = series(3_000, 0.0);
        for sample in &mut input.samples {
            sample.label = Some("raw".to_string());
        }
        let request = config.request(input);
        let result = coordinator.submit(request).await.unwrap().into_result().unwrap();

        assert_eq!(result.reduced_count, 1_500);
        assert_eq!(coordinator.stats().offloaded, 1);
        let SeriesSet::Single(out) = result.series else {
            panic!("shape changed");
        };
        assert_eq!(out.samples[0].label.as_deref(), Some("12:26:40"));
    }
}
