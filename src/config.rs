//! Downsampling configuration
//!
//! Persisted as pretty-printed JSON. Missing fields take their defaults, so a
//! config written by an older build still loads.

use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::constants::labels::DEFAULT_LABEL_FORMAT;
use crate::constants::offload::DEFAULT_OFFLOAD_THRESHOLD;
use crate::constants::sampling::{DEFAULT_TARGET_COUNT, MIN_LTTB_TARGET};
use crate::error::{Result, SamplerError};
use crate::pipeline::ReductionRequest;
use crate::reduce::Strategy;
use crate::series::SeriesSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Maximum points per series handed to the renderer
    pub target_count: usize,
    /// Master on/off switch
    pub sampling_enabled: bool,
    pub strategy: Strategy,
    /// Samples to reduce before work is moved off the calling thread
    pub offload_threshold: usize,
    /// Whether a background worker may be used at all
    pub offload_enabled: bool,
    /// chrono format for reconstructed sample labels
    pub label_format: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target_count: DEFAULT_TARGET_COUNT,
            sampling_enabled: true,
            strategy: Strategy::Lttb,
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
            offload_enabled: true,
            label_format: DEFAULT_LABEL_FORMAT.to_string(),
        }
    }
}

impl SamplingConfig {
    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_count < MIN_LTTB_TARGET {
            return Err(SamplerError::Config(format!(
                "target_count must be at least {}, got {}",
                MIN_LTTB_TARGET, self.target_count
            )));
        }
        if self.label_format.trim().is_empty() {
            return Err(SamplerError::Config("label_format must not be empty".to_string()));
        }
        if StrftimeItems::new(&self.label_format).any(|item| matches!(item, Item::Error)) {
            return Err(SamplerError::Config(format!(
                "label_format '{}' is not a valid time format",
                self.label_format
            )));
        }
        Ok(())
    }

    /// Build a request for `series` using the configured strategy and limits
    pub fn request(&self, series: impl Into<SeriesSet>) -> ReductionRequest {
        ReductionRequest::new(series, self.strategy, self.target_count)
            .with_sampling(self.sampling_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let config = SamplingConfig::default();
        assert_eq!(config.target_count, 1500);
        assert!(config.sampling_enabled);
        assert_eq!(config.strategy, Strategy::Lttb);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SamplingConfig = serde_json::from_str(r#"{"strategy":"minmax","target_count":800}"#).unwrap();
        assert_eq!(config.strategy, Strategy::MinMax);
        assert_eq!(config.target_count, 800);
        assert_eq!(config.label_format, DEFAULT_LABEL_FORMAT);
        assert!(config.offload_enabled);
    }

    #[test]
    fn test_save_and_load() {
        let file = Builder::new().suffix(".json").tempfile().unwrap();
        let config = SamplingConfig {
            target_count: 1200,
            strategy: Strategy::Average,
            label_format: "%H:%M".to_string(),
            ..Default::default()
        };

        config.save(file.path()).unwrap();
        let loaded = SamplingConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation_errors() {
        let config = SamplingConfig {
            target_count: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SamplerError::Config(_))));

        let config = SamplingConfig {
            label_format: "%Y-%!".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let file = Builder::new().suffix(".json").tempfile().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(SamplingConfig::load(file.path()), Err(SamplerError::Json(_))));
    }

    #[test]
    fn test_request_uses_config() {
        let config = SamplingConfig {
            sampling_enabled: false,
            strategy: Strategy::MinMax,
            ..Default::default()
        };
        let request = config.request(Series::from(vec![(0.0, 1.0)]));
        assert_eq!(request.strategy, Strategy::MinMax);
        assert_eq!(request.target_count, 1500);
        assert!(!request.sampling_enabled);
    }
}
