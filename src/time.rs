/// Simulated clock values.
///
/// A `SimTime` is a point on the logical clock. It has no relation to
/// wall-clock time: the clock advances only when the kernel dequeues an
/// event scheduled further in the future.
use std::cmp::Ordering;

use crate::error::{SimError, SimResult};

/// A non-negative, finite simulated timestamp.
///
/// Backed by an `f64` so that delays such as `0.5` are representable, but
/// construction rejects NaN, infinities and negative values, which makes a
/// total order sound.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(f64);

impl SimTime {
    /// The start of every simulation.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Create a timestamp, rejecting non-finite and negative values.
    pub fn new(value: f64) -> SimResult<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(SimError::InvalidTime(value));
        }
        // Fold -0.0 into 0.0 so `==` agrees with `total_cmp`.
        Ok(SimTime(value + 0.0))
    }

    /// Return the raw clock value.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// The time `delay` after `self`.
    ///
    /// A negative or non-finite delay is a construction error.
    pub fn plus(self, delay: f64) -> SimResult<SimTime> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(SimError::NegativeDelay(delay));
        }
        SimTime::new(self.0 + delay)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self < other
    }

    /// Elapsed simulated time between `earlier` and `self`.
    /// Returns `None` if `earlier` is after `self`.
    pub fn duration_since(self, earlier: SimTime) -> Option<f64> {
        if earlier > self {
            None
        } else {
            Some(self.0 - earlier.0)
        }
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::ZERO
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}
