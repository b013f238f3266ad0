//! Requests, results, and the synchronous reduction path
//!
//! A request is planned once (policy per series), the series that need work
//! are packed into a [`Job`], and the job's output is stitched back into the
//! input's shape. The coordinator runs the same [`Job`] through the same
//! [`execute`] function on its worker thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::config::SamplingConfig;
use crate::error::{Result, SamplerError};
use crate::policy::{self, Decision};
use crate::reconcile::Reconciler;
use crate::reduce::{self, Strategy};
use crate::series::{Columns, Series, SeriesSet, Shape};

/// One render cycle's reduction request. Built fresh whenever the input or
/// configuration changes.
///
/// Series that will be reduced must be sorted by timestamp; otherwise the
/// request fails with [`SamplerError::UnsortedSeries`]. Series that pass
/// through are returned as given.
#[derive(Debug, Clone)]
pub struct ReductionRequest {
    pub series: SeriesSet,
    pub strategy: Strategy,
    pub target_count: usize,
    pub sampling_enabled: bool,
}

impl ReductionRequest {
    pub fn new(series: impl Into<SeriesSet>, strategy: Strategy, target_count: usize) -> Self {
        Self {
            series: series.into(),
            strategy,
            target_count,
            sampling_enabled: true,
        }
    }

    /// Master on/off switch for reduction
    pub fn with_sampling(mut self, enabled: bool) -> Self {
        self.sampling_enabled = enabled;
        self
    }
}

/// Reduced (or passed-through) series, shaped like the request
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionResult {
    pub series: SeriesSet,
    pub original_count: usize,
    pub reduced_count: usize,
    pub strategy: Strategy,
}

impl ReductionResult {
    /// True when any points were dropped
    pub fn is_reduced(&self) -> bool {
        self.reduced_count < self.original_count
    }

    /// Text for a "showing M of N points" badge, if anything was dropped
    pub fn indicator(&self) -> Option<String> {
        self.is_reduced().then(|| {
            format!(
                "Showing {} of {} points",
                self.reduced_count, self.original_count
            )
        })
    }
}

/// Series that actually need reducing, in compact form
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub strategy: Strategy,
    pub target: usize,
    pub inputs: Vec<Columns>,
}

impl Job {
    pub fn sample_count(&self) -> usize {
        self.inputs.iter().map(Columns::len).sum()
    }
}

/// Run every input of a job through the reducer
pub(crate) fn execute(job: &Job) -> Result<Vec<Columns>> {
    profiling::scope!("execute_job");

    job.inputs
        .iter()
        .map(|input| reduce::run(job.strategy, input, job.target))
        .collect()
}

/// Run `f` in-process, turning a panic into [`SamplerError::SyncExecution`]
pub(crate) fn run_guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(SamplerError::SyncExecution(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "reducer panicked".to_string()
    }
}

/// Policy decisions for a request, holding the series until the job returns
#[derive(Debug)]
pub(crate) struct Plan {
    shape: Shape,
    parts: Vec<(Series, Decision)>,
    strategy: Strategy,
    target: usize,
    original_count: usize,
}

impl Plan {
    pub fn new(request: ReductionRequest) -> Result<Self> {
        let ReductionRequest {
            series,
            strategy,
            target_count,
            sampling_enabled,
        } = request;

        let original_count = series.sample_count();
        let (shape, all) = series.into_parts();
        let mut parts = Vec::with_capacity(all.len());
        for s in all {
            let decision = policy::decide(s.len(), target_count, sampling_enabled, strategy)?;
            if !decision.is_pass_through() && !s.is_sorted() {
                return Err(SamplerError::UnsortedSeries {
                    series: s.label.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                });
            }
            parts.push((s, decision));
        }

        Ok(Self {
            shape,
            parts,
            strategy,
            target: target_count,
            original_count,
        })
    }

    /// The work left to do, or `None` when every series passes through
    pub fn job(&self) -> Option<Job> {
        let inputs: Vec<Columns> = self
            .parts
            .iter()
            .filter(|(_, decision)| !decision.is_pass_through())
            .map(|(s, _)| s.to_columns())
            .collect();

        (!inputs.is_empty()).then(|| Job {
            strategy: self.strategy,
            target: self.target,
            inputs,
        })
    }

    /// Stitch reducer output back into the request's shape. Labels are
    /// re-derived only for reduced series whose input carried them; series
    /// that passed through come back exactly as they went in.
    pub fn finish(self, outputs: Vec<Columns>, reconciler: &Reconciler) -> ReductionResult {
        let mut outputs = outputs.into_iter();
        let parts = self
            .parts
            .into_iter()
            .map(|(series, decision)| match decision {
                Decision::PassThrough => series,
                Decision::Reduce(_) => match outputs.next() {
                    Some(columns) => {
                        let carried_labels = series.has_sample_labels();
                        let mut reduced = Series::from_columns(series.label, columns);
                        if carried_labels {
                            reconciler.reconcile(&mut reduced);
                        }
                        reduced
                    }
                    None => series,
                },
            })
            .collect();

        let set = SeriesSet::from_parts(self.shape, parts);

        ReductionResult {
            reduced_count: set.sample_count(),
            original_count: self.original_count,
            strategy: self.strategy,
            series: set,
        }
    }
}

/// Inline downsampling for call sites that can afford to block
#[derive(Debug, Clone, Default)]
pub struct Downsampler {
    reconciler: Reconciler,
}

impl Downsampler {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(Reconciler::new(config.label_format.clone()))
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Policy, reducer and reconciler, all on the calling thread
    pub fn downsample(&self, request: ReductionRequest) -> Result<ReductionResult> {
        let plan = Plan::new(request)?;
        let outputs = match plan.job() {
            Some(job) => run_guarded(|| execute(&job))?,
            None => Vec::new(),
        };
        Ok(plan.finish(outputs, &self.reconciler))
    }
}
