//! Sample and series value types
//!
//! Timestamps are epoch seconds stored as `f64`, the same representation the
//! renderer uses for its x axis.

use serde::{Deserialize, Serialize};

/// A single timestamped measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch seconds
    pub timestamp: f64,
    /// Measured value, finite
    pub value: f64,
    /// Presentation-only label derived from the timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self {
            timestamp,
            value,
            label: None,
        }
    }

    /// True when timestamp and value are both finite
    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite() && self.value.is_finite()
    }
}

impl From<(f64, f64)> for Sample {
    fn from((timestamp, value): (f64, f64)) -> Self {
        Self::new(timestamp, value)
    }
}

/// Ordered samples, optionally tagged (e.g. one line per site)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            label: None,
            samples,
        }
    }

    pub fn labeled(label: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self {
            label: Some(label.into()),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when any sample carries a presentation label
    pub fn has_sample_labels(&self) -> bool {
        self.samples.iter().any(|s| s.label.is_some())
    }

    /// Stable sort by timestamp; equal timestamps keep their input order
    pub fn sort_by_timestamp(&mut self) {
        self.samples
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }

    /// Check the ascending-timestamp invariant reducers rely on
    pub fn is_sorted(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    }

    /// Project to the compact numeric layout sent across the execution boundary
    pub fn to_columns(&self) -> Columns {
        let mut columns = Columns::with_capacity(self.samples.len());
        for sample in &self.samples {
            columns.push(sample.timestamp, sample.value);
        }
        columns
    }

    /// Rebuild a series from reducer output. Labels are left empty for the
    /// reconciler to fill in.
    pub fn from_columns(label: Option<String>, columns: Columns) -> Self {
        let samples = columns
            .timestamps
            .into_iter()
            .zip(columns.values)
            .map(|(ts, v)| Sample::new(ts, v))
            .collect();
        Self { label, samples }
    }
}

impl From<Vec<(f64, f64)>> for Series {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Self::new(points.into_iter().map(Sample::from).collect())
    }
}

/// One series or several, preserved end to end so results have the input's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesSet {
    Single(Series),
    Multi(Vec<Series>),
}

impl SeriesSet {
    /// Total number of samples across all series
    pub fn sample_count(&self) -> usize {
        self.iter().map(Series::len).sum()
    }

    pub fn series_count(&self) -> usize {
        match self {
            SeriesSet::Single(_) => 1,
            SeriesSet::Multi(all) => all.len(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        let slice = match self {
            SeriesSet::Single(series) => std::slice::from_ref(series),
            SeriesSet::Multi(all) => all.as_slice(),
        };
        slice.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Series> {
        let slice = match self {
            SeriesSet::Single(series) => std::slice::from_mut(series),
            SeriesSet::Multi(all) => all.as_mut_slice(),
        };
        slice.iter_mut()
    }

    /// Split into the individual series, remembering the shape
    pub(crate) fn into_parts(self) -> (Shape, Vec<Series>) {
        match self {
            SeriesSet::Single(series) => (Shape::Single, vec![series]),
            SeriesSet::Multi(all) => (Shape::Multi, all),
        }
    }

    pub(crate) fn from_parts(shape: Shape, mut parts: Vec<Series>) -> Self {
        match shape {
            Shape::Single => SeriesSet::Single(parts.pop().unwrap_or_default()),
            Shape::Multi => SeriesSet::Multi(parts),
        }
    }
}

impl From<Series> for SeriesSet {
    fn from(series: Series) -> Self {
        SeriesSet::Single(series)
    }
}

impl From<Vec<Series>> for SeriesSet {
    fn from(all: Vec<Series>) -> Self {
        SeriesSet::Multi(all)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Single,
    Multi,
}

/// Structure-of-arrays projection of a series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl Columns {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut columns = Self::with_capacity(points.len());
        for &(ts, v) in points {
            columns.push(ts, v);
        }
        columns
    }

    #[inline]
    pub fn push(&mut self, timestamp: f64, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    /// Copy the point at `idx` from another projection
    #[inline]
    pub(crate) fn push_from(&mut self, other: &Columns, idx: usize) {
        self.push(other.timestamps[idx], other.values[idx]);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.timestamps.truncate(len);
        self.values.truncate(len);
    }
}
