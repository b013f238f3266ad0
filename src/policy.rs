//! Sampling policy: whether to reduce at all, and with what

use crate::error::Result;
use crate::reduce::Strategy;

/// Outcome of the policy for one series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the series back untouched
    PassThrough,
    /// Reduce with the given strategy
    Reduce(Strategy),
}

impl Decision {
    pub fn is_pass_through(self) -> bool {
        matches!(self, Decision::PassThrough)
    }
}

/// Decide how a series of `n` samples is handled.
///
/// The target is checked first, even for empty input, so an invalid
/// configuration is reported consistently regardless of data size.
pub fn decide(n: usize, target: usize, sampling_enabled: bool, strategy: Strategy) -> Result<Decision> {
    strategy.validate_target(target)?;

    if !sampling_enabled || n <= target {
        return Ok(Decision::PassThrough);
    }
    Ok(Decision::Reduce(strategy))
}
