//! Adaptive time-series downsampling for dashboard charts
//!
//! Large ordered series are reduced to a bounded number of points while
//! keeping their visual shape:
//!
//! - [`reduce`]: LTTB, Average and Min-Max reducers behind one dispatch point
//! - [`policy`]: pass-through or reduce, per series
//! - [`pipeline`]: requests, results and the inline [`Downsampler`]
//! - [`coordinator`]: background execution with inline fallback and
//!   supersession of stale requests
//! - [`reconcile`]: re-derives presentation labels after reduction
//! - [`ingest`]: parsing of loosely typed input from the fetching layer
//! - [`cache`]: an owned, fingerprint-keyed result cache

pub mod cache;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod policy;
pub mod reconcile;
pub mod reduce;
pub mod series;

pub use cache::{Fingerprint, ReductionCache};
pub use config::SamplingConfig;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorStats, Outcome, RequestState};
pub use error::{Result, SamplerError};
pub use ingest::{IngestReport, RawField, RawPoint, parse_timestamp, parse_value};
pub use pipeline::{Downsampler, ReductionRequest, ReductionResult};
pub use policy::{Decision, decide};
pub use reconcile::Reconciler;
pub use reduce::Strategy;
pub use series::{Columns, Sample, Series, SeriesSet};

// Re-export profiling macros for convenience
// When no profiling feature is enabled, these become no-ops
pub use profiling;
