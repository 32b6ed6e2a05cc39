//! Simulated time model.
//!
//! # Design
//!
//! Time is an integer count of simulated **milliseconds**.  Using an integer
//! as the canonical unit keeps all schedule arithmetic exact (no
//! floating-point drift), makes `SimTime` totally ordered, and lets two runs
//! with the same seed produce identical event timestamps on every platform.
//!
//! Configuration and reports speak in (fractional) seconds; conversions from
//! `f64` seconds round **up** to the next millisecond so a transfer or a TTL
//! never completes earlier than its real-valued duration.

use std::fmt;

// ── SimTime ───────────────────────────────────────────────────────────────────

/// An absolute point in simulated time, in milliseconds since run start.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const MAX: SimTime = SimTime(u64::MAX);

    /// Construct from whole milliseconds.
    #[inline]
    pub const fn from_millis(ms: u64) -> SimTime {
        SimTime(ms)
    }

    /// Construct from whole seconds.
    #[inline]
    pub const fn from_secs(secs: u64) -> SimTime {
        SimTime(secs * 1_000)
    }

    /// Construct from fractional seconds, rounding up to the next millisecond.
    /// Negative and NaN inputs clamp to zero.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> SimTime {
        SimTime(secs_to_millis(secs))
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Time elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: SimTime) -> SimDuration {
        SimDuration(self.0.saturating_sub(earlier.0))
    }
}

impl std::ops::Add<SimDuration> for SimTime {
    type Output = SimTime;
    #[inline]
    fn add(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign<SimDuration> for SimTime {
    #[inline]
    fn add_assign(&mut self, rhs: SimDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimDuration;
    /// Saturating difference; see [`SimTime::since`].
    #[inline]
    fn sub(self, rhs: SimTime) -> SimDuration {
        self.since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1_000, self.0 % 1_000)
    }
}

// ── SimDuration ───────────────────────────────────────────────────────────────

/// A span of simulated time, in milliseconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SimDuration(pub u64);

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0);

    #[inline]
    pub const fn from_millis(ms: u64) -> SimDuration {
        SimDuration(ms)
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> SimDuration {
        SimDuration(secs * 1_000)
    }

    /// Construct from fractional seconds, rounding up to the next millisecond.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> SimDuration {
        SimDuration(secs_to_millis(secs))
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::Add for SimDuration {
    type Output = SimDuration;
    #[inline]
    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1_000, self.0 % 1_000)
    }
}

fn secs_to_millis(secs: f64) -> u64 {
    if secs.is_nan() || secs <= 0.0 {
        return 0;
    }
    // Round away sub-nanosecond float noise before taking the ceiling so that
    // e.g. 0.1 + 0.2 seconds does not become 301 ms.
    let ms = (secs * 1_000.0 * 1e6).round() / 1e6;
    ms.ceil().min(u64::MAX as f64) as u64
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level run parameters.
///
/// Typically produced by the TOML scenario loader in `dtn-sim` and passed to
/// the simulation builder.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,

    /// The run stops once the next event would be at or after this time.
    pub end_time: SimTime,

    /// Period of world updates (mobility advance + contact detection).
    pub update_interval: SimDuration,
}

impl SimConfig {
    /// Number of world updates that fit in `[0, end_time)`.
    pub fn update_count(&self) -> u64 {
        if self.update_interval.is_zero() {
            return 0;
        }
        self.end_time.0.div_ceil(self.update_interval.0)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:            0,
            end_time:        SimTime::from_secs(43_200),
            update_interval: SimDuration::from_secs(1),
        }
    }
}
