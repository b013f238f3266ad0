//! Bucketed reducers
//!
//! Every reducer is a pure function of `(input, target)`. [`run`] is the only
//! place that maps a [`Strategy`] to an implementation, so the inline call
//! sites and the background worker share exactly the same code.

mod average;
mod lttb;
mod minmax;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::sampling::{MIN_BUCKET_TARGET, MIN_LTTB_TARGET};
use crate::error::{Result, SamplerError};
use crate::series::Columns;

pub use average::average;
pub use lttb::lttb;
pub use minmax::minmax;

/// Reduction algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Largest-Triangle-Three-Buckets
    #[default]
    Lttb,
    /// Per-bucket arithmetic mean
    Average,
    /// Per-bucket minimum and maximum
    MinMax,
}

impl Strategy {
    /// Smallest target count the strategy accepts
    pub fn min_target(self) -> usize {
        match self {
            Strategy::Lttb => MIN_LTTB_TARGET,
            Strategy::Average | Strategy::MinMax => MIN_BUCKET_TARGET,
        }
    }

    /// Reject targets the strategy cannot honour. Never clamps.
    pub fn validate_target(self, target: usize) -> Result<()> {
        let minimum = self.min_target();
        if target < minimum {
            return Err(SamplerError::InvalidThreshold {
                strategy: self,
                requested: target,
                minimum,
            });
        }
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Lttb => "lttb",
            Strategy::Average => "average",
            Strategy::MinMax => "minmax",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Lttb => "LTTB",
            Strategy::Average => "Average",
            Strategy::MinMax => "Min-Max",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lttb" => Ok(Strategy::Lttb),
            "average" | "avg" => Ok(Strategy::Average),
            "minmax" | "min-max" => Ok(Strategy::MinMax),
            other => Err(SamplerError::Config(format!(
                "unknown downsampling strategy '{}'",
                other
            ))),
        }
    }
}

/// Run `strategy` over `input`, producing at most `target` points
pub fn run(strategy: Strategy, input: &Columns, target: usize) -> Result<Columns> {
    strategy.validate_target(target)?;

    let output = match strategy {
        Strategy::Lttb => lttb(input, target),
        Strategy::Average => average(input, target),
        Strategy::MinMax => minmax(input, target),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize) -> Columns {
        let points: Vec<(f64, f64)> = (0..n)
            .map(|i| (i as f64, (i as f64 * 0.05).sin() * 10.0 + (i % 7) as f64))
            .collect();
        Columns::from_points(&points)
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("lttb".parse::<Strategy>().unwrap(), Strategy::Lttb);
        assert_eq!(" Average ".parse::<Strategy>().unwrap(), Strategy::Average);
        assert_eq!("min-max".parse::<Strategy>().unwrap(), Strategy::MinMax);
        assert!("median".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_names() {
        assert_eq!(serde_json::to_string(&Strategy::MinMax).unwrap(), "\"minmax\"");
        let parsed: Strategy = serde_json::from_str("\"average\"").unwrap();
        assert_eq!(parsed, Strategy::Average);
        assert_eq!(Strategy::default(), Strategy::Lttb);
    }

    #[test]
    fn test_lttb_rejects_small_target() {
        let input = wave(100);
        let err = run(Strategy::Lttb, &input, 2).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::InvalidThreshold { requested: 2, minimum: 3, .. }
        ));
        assert!(run(Strategy::Average, &input, 0).is_err());
        assert!(run(Strategy::MinMax, &input, 2).is_ok());
    }

    #[test]
    fn test_every_strategy_is_deterministic() {
        let input = wave(5_000);
        for strategy in [Strategy::Lttb, Strategy::Average, Strategy::MinMax] {
            let first = run(strategy, &input, 321).unwrap();
            let second = run(strategy, &input, 321).unwrap();
            let bits = |c: &Columns| -> Vec<(u64, u64)> {
                c.timestamps
                    .iter()
                    .zip(&c.values)
                    .map(|(t, v)| (t.to_bits(), v.to_bits()))
                    .collect()
            };
            assert_eq!(bits(&first), bits(&second), "{} not deterministic", strategy);
        }
    }

    #[test]
    fn test_never_upsamples() {
        let input = wave(1_000);
        for strategy in [Strategy::Lttb, Strategy::Average, Strategy::MinMax] {
            for target in [3, 10, 333, 999, 1_000, 5_000] {
                let out = run(strategy, &input, target).unwrap();
                assert!(out.len() <= target.min(input.len()));
                assert!(out.timestamps.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
