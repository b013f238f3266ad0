//! Backfill of presentation-only sample fields
//!
//! Reducers work on a numeric projection, so labels do not survive the trip.
//! The reconciler recomputes them from the timestamp each output sample kept.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::constants::labels::{DEFAULT_LABEL_FORMAT, NUMERIC_LABEL_PRECISION};
use crate::series::{Series, SeriesSet};

/// Fills missing sample labels from timestamps
#[derive(Debug, Clone)]
pub struct Reconciler {
    label_format: String,
}

impl Reconciler {
    pub fn new(label_format: impl Into<String>) -> Self {
        Self {
            label_format: label_format.into(),
        }
    }

    pub fn label_format(&self) -> &str {
        &self.label_format
    }

    /// Format an epoch-seconds timestamp
    pub fn label_for(&self, timestamp: f64) -> String {
        let secs = timestamp.floor();
        let nanos = ((timestamp - secs) * 1e9) as u32;
        if let Some(dt) = DateTime::<Utc>::from_timestamp(secs as i64, nanos).filter(|_| timestamp.is_finite()) {
            let mut label = String::new();
            // an invalid format string reports fmt::Error instead of panicking here
            if write!(label, "{}", dt.format(&self.label_format)).is_ok() {
                return label;
            }
        }
        format!("{:.*}", NUMERIC_LABEL_PRECISION, timestamp)
    }

    /// Fill every missing label in `series`. Existing labels, timestamps and
    /// values are left untouched, so running it twice changes nothing.
    pub fn reconcile(&self, series: &mut Series) {
        profiling::scope!("reconcile");

        for sample in series.samples.iter_mut().filter(|s| s.label.is_none()) {
            sample.label = Some(self.label_for(sample.timestamp));
        }
    }

    pub fn reconcile_set(&self, set: &mut SeriesSet) {
        for series in set.iter_mut() {
            self.reconcile(series);
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_FORMAT)
    }
}
