//! Input adapters for the data-fetching side
//!
//! Timestamps arrive as epoch numbers or date strings and values as numbers or
//! numeric strings. Everything is normalized to epoch seconds and finite
//! `f64` values here, so reducers never see a NaN.

use chrono::NaiveDateTime;
use polars::prelude::{DataFrame, DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::datetime::{
    DATE_FORMAT_LENGTH, MILLIS_EPOCH_MAX, MILLIS_EPOCH_MIN, MIN_COMPACT_LENGTH, TIME_FORMAT_LENGTH,
};
use crate::error::{Result, SamplerError};
use crate::series::{Sample, Series};

/// ISO 8601 formats with 'T' separator (most common for logs/APIs)
const ISO_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.fZ", // 2024-01-15T14:30:00.123Z
    "%Y-%m-%dT%H:%M:%SZ",    // 2024-01-15T14:30:00Z
    "%Y-%m-%dT%H:%M:%S%.f",  // 2024-01-15T14:30:00.123
    "%Y-%m-%dT%H:%M:%S",     // 2024-01-15T14:30:00
    "%Y-%m-%dT%H:%M",        // 2024-01-15T14:30
];

const COMMON_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S%.f", // 2024-01-15 14:30:00.123
    "%Y-%m-%d %H:%M:%S",    // 2024-01-15 14:30:00
    "%Y-%m-%d %H:%M",       // 2024-01-15 14:30
    "%Y/%m/%d %H:%M:%S",    // 2024/01/15 14:30:00
    "%d/%m/%Y %H:%M:%S",    // 15/01/2024 14:30:00
    "%m/%d/%Y %H:%M:%S",    // 01/15/2024 14:30:00
    "%d-%m-%Y %H:%M:%S",    // 15-01-2024 14:30:00
    "%b %d, %Y %H:%M:%S",   // Jan 15, 2024 14:30:00
    "%d %b %Y %H:%M:%S",    // 15 Jan 2024 14:30:00
];

const DATE_ONLY_FORMATS: [&str; 4] = [
    "%Y-%m-%d", // 2024-01-15
    "%Y/%m/%d", // 2024/01/15
    "%b %d, %Y", // Jan 15, 2024
    "%d %b %Y", // 15 Jan 2024
];

/// Parse a timestamp into epoch seconds.
///
/// Numbers in the millisecond epoch range are scaled down to seconds; other
/// numbers are taken as seconds. Date strings are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let trimmed = s.trim();

    if let Ok(num) = trimmed.parse::<f64>() {
        return num.is_finite().then(|| normalize_epoch(num));
    }

    // Compact format: YYYYMMDD HHMMSS
    if trimmed.len() >= MIN_COMPACT_LENGTH
        && trimmed.chars().all(|c| c.is_ascii_digit() || c.is_ascii_whitespace())
    {
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() == 2
            && parts[0].len() == DATE_FORMAT_LENGTH
            && parts[1].len() == TIME_FORMAT_LENGTH
        {
            let joined = format!("{}{}", parts[0], parts[1]);
            if let Ok(dt) = NaiveDateTime::parse_from_str(&joined, "%Y%m%d%H%M%S") {
                return Some(dt.and_utc().timestamp() as f64);
            }
        }
    }

    for format in ISO_FORMATS.iter().chain(&COMMON_FORMATS) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            // keep millisecond precision
            return Some(dt.and_utc().timestamp_millis() as f64 / 1000.0);
        }
    }

    for format in &DATE_ONLY_FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp() as f64);
        }
    }

    None
}

/// Parse a numeric string; non-finite results are rejected
pub fn parse_value(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_epoch(num: f64) -> f64 {
    if (MILLIS_EPOCH_MIN..=MILLIS_EPOCH_MAX).contains(&num) {
        num / 1000.0
    } else {
        num
    }
}

/// A field that may arrive as a JSON number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
}

impl RawField {
    fn as_timestamp(&self) -> Option<f64> {
        match self {
            RawField::Number(n) => n.is_finite().then(|| normalize_epoch(*n)),
            RawField::Text(s) => parse_timestamp(s),
        }
    }

    fn as_value(&self) -> Option<f64> {
        match self {
            RawField::Number(n) => n.is_finite().then_some(*n),
            RawField::Text(s) => parse_value(s),
        }
    }
}

/// Unparsed point as delivered by the fetching layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub timestamp: RawField,
    pub value: RawField,
}

/// What ingestion had to drop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub bad_timestamps: usize,
    pub bad_values: usize,
}

impl IngestReport {
    pub fn dropped(&self) -> usize {
        self.bad_timestamps + self.bad_values
    }
}

/// Parse raw points into a sorted series, dropping anything unusable
pub fn series_from_raw(label: Option<String>, points: &[RawPoint]) -> (Series, IngestReport) {
    let pairs = points
        .iter()
        .map(|p| (p.timestamp.as_timestamp(), p.value.as_value()));
    build_series(label, pairs)
}

/// Extract one series from two columns of a polars frame.
///
/// Datetime and Date columns become epoch seconds, string columns are parsed,
/// and anything else is cast to `Float64`.
pub fn series_from_dataframe(
    df: &DataFrame,
    ts_column: &str,
    value_column: &str,
    label: Option<String>,
) -> Result<(Series, IngestReport)> {
    profiling::scope!("series_from_dataframe");

    let timestamps = column_as_f64(df, ts_column, parse_timestamp)?;
    let values = column_as_f64(df, value_column, parse_value)?;

    let pairs = timestamps
        .into_iter()
        .zip(values)
        .map(|(ts, v)| (ts.filter(|t| t.is_finite()), v.filter(|v| v.is_finite())));
    Ok(build_series(label, pairs))
}

fn column_as_f64(
    df: &DataFrame,
    name: &str,
    parse_text: fn(&str) -> Option<f64>,
) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| SamplerError::ColumnNotFound {
            column: name.to_string(),
        })?
        .as_materialized_series()
        .clone();

    let values = match series.dtype() {
        DataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1e9,
                TimeUnit::Microseconds => 1e6,
                TimeUnit::Milliseconds => 1e3,
            };
            series
                .datetime()?
                .into_iter()
                .map(|opt| opt.map(|ts| ts as f64 / per_second))
                .collect()
        }
        DataType::Date => series
            .date()?
            .into_iter()
            .map(|opt| opt.map(|days| days as f64 * 86_400.0))
            .collect(),
        DataType::String => series
            .str()?
            .into_iter()
            .map(|opt| opt.and_then(parse_text))
            .collect(),
        _ => series.cast(&DataType::Float64)?.f64()?.into_iter().collect(),
    };
    Ok(values)
}

fn build_series(
    label: Option<String>,
    pairs: impl Iterator<Item = (Option<f64>, Option<f64>)>,
) -> (Series, IngestReport) {
    let mut report = IngestReport::default();
    let mut samples = Vec::new();

    for pair in pairs {
        match pair {
            (Some(ts), Some(v)) => samples.push(Sample::new(ts, v)),
            (None, _) => report.bad_timestamps += 1,
            (Some(_), None) => report.bad_values += 1,
        }
    }
    report.accepted = samples.len();

    if report.dropped() > 0 {
        warn!(
            series = label.as_deref().unwrap_or("<unnamed>"),
            bad_timestamps = report.bad_timestamps,
            bad_values = report.bad_values,
            "dropped unusable samples"
        );
    }

    let mut series = Series { label, samples };
    if !series.is_sorted() {
        series.sort_by_timestamp();
    }
    (series, report)
}
