//! Crate-wide constants and default values
//!
//! Centralizes the thresholds and defaults used by the policy, the coordinator
//! and the reconciler so they can be tuned in one place.

/// Downsampling defaults
pub mod sampling {
    /// Default maximum number of points handed to the renderer per series
    pub const DEFAULT_TARGET_COUNT: usize = 1500;

    /// LTTB needs the first point, the last point and at least one interior point
    pub const MIN_LTTB_TARGET: usize = 3;

    /// Bucketed reducers other than LTTB only need one output point
    pub const MIN_BUCKET_TARGET: usize = 1;
}

/// Execution coordinator defaults
pub mod offload {
    /// Total samples (across series that will be reduced) above which work
    /// is sent to the background worker
    pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 20_000;

    /// Name given to each background worker thread
    pub const WORKER_THREAD_NAME: &str = "oxide-sampler-worker";
}

/// Presentation defaults
pub mod labels {
    /// Label format applied to reconstructed sample labels (chrono syntax)
    pub const DEFAULT_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Digits kept when a timestamp cannot be represented as a date
    pub const NUMERIC_LABEL_PRECISION: usize = 3;
}

/// Result cache defaults
pub mod cache {
    /// Default number of cached reduction results
    pub const DEFAULT_CACHE_ENTRIES: usize = 64;
}

/// Date/time parsing constants
pub mod datetime {
    /// Minimum string length for compact `YYYYMMDD HHMMSS` parsing
    pub const MIN_COMPACT_LENGTH: usize = 15;

    /// YYYYMMDD format length
    pub const DATE_FORMAT_LENGTH: usize = 8;

    /// HHMMSS format length
    pub const TIME_FORMAT_LENGTH: usize = 6;

    /// Smallest epoch value treated as milliseconds (2000-01-01 in ms)
    pub const MILLIS_EPOCH_MIN: f64 = 946_684_800_000.0;

    /// Largest epoch value treated as milliseconds (2038-01-19 in ms)
    pub const MILLIS_EPOCH_MAX: f64 = 2_147_483_647_000.0;
}
