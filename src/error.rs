//! Error types for the sampler
//!
//! Anything about invalid input is surfaced to the caller. Problems with where
//! a computation runs are recovered inside the coordinator and never leave it.

use thiserror::Error;

use crate::reduce::Strategy;

/// Main error type for downsampling operations
#[derive(Error, Debug)]
pub enum SamplerError {
    /// Target point count below what the strategy can produce
    #[error("Invalid target count {requested} for {strategy}: at least {minimum} points required")]
    InvalidThreshold {
        strategy: Strategy,
        requested: usize,
        minimum: usize,
    },

    /// A series to be reduced is not in ascending timestamp order
    #[error("Series '{series}' is not sorted by timestamp")]
    UnsortedSeries { series: String },

    /// Background execution could not be started or reached
    #[error("Background execution unavailable: {0}")]
    OffloadUnavailable(String),

    /// In-process execution failed
    #[error("Reduction failed: {0}")]
    SyncExecution(String),

    /// Configuration file or value error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Column not found in an input frame
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// File I/O error
    #[error("Failed to access file: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Polars data processing error
    #[error("Data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Result type alias for sampler operations
pub type Result<T> = std::result::Result<T, SamplerError>;

impl SamplerError {
    /// Get a user-friendly error message suitable for a chart placeholder
    pub fn user_message(&self) -> String {
        match self {
            SamplerError::InvalidThreshold {
                strategy,
                requested,
                minimum,
            } => format!(
                "{} needs at least {} points, but {} were requested",
                strategy, minimum, requested
            ),
            SamplerError::UnsortedSeries { series } => {
                format!("Series '{}' must be sorted by time before reduction", series)
            }
            SamplerError::OffloadUnavailable(_) => "Background processing unavailable".to_string(),
            SamplerError::SyncExecution(msg) => format!("Could not reduce data: {}", msg),
            SamplerError::Config(msg) => format!("Config error: {}", msg),
            SamplerError::ColumnNotFound { column } => format!("Column '{}' not found", column),
            SamplerError::Io(e) => format!("File error: {}", e),
            SamplerError::Json(e) => format!("JSON error: {}", e),
            SamplerError::Polars(e) => format!("Data error: {}", e),
        }
    }

    /// Get a short title for the error (for toast notifications)
    pub fn title(&self) -> &'static str {
        match self {
            SamplerError::InvalidThreshold { .. } => "Invalid Point Limit",
            SamplerError::UnsortedSeries { .. } => "Unsorted Data",
            SamplerError::OffloadUnavailable(_) => "Background Error",
            SamplerError::SyncExecution(_) => "Reduction Failed",
            SamplerError::Config(_) => "Configuration Error",
            SamplerError::ColumnNotFound { .. } => "Column Not Found",
            SamplerError::Io(_) => "File Error",
            SamplerError::Json(_) => "JSON Error",
            SamplerError::Polars(_) => "Data Error",
        }
    }

    /// True for errors caused by the caller's input rather than the runtime
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SamplerError::InvalidThreshold { .. }
                | SamplerError::UnsortedSeries { .. }
                | SamplerError::ColumnNotFound { .. }
        )
    }
}
