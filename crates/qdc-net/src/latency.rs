//! Latency between resource acquisition and channel usage.
//!
//! A [`LatencyAccount`] is a small state machine:
//!
//! ```text
//! Idle --finalize_acquisition--> ResourcesReserved --begin_usage--> Measured
//! ```
//!
//! Any other transition is rejected with
//! [`NetError::InvalidPhaseTransition`]. Timestamps come from a [`Clock`],
//! which is [`MonotonicClock`] unless a test injects a [`ManualClock`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// The system monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle and advance the
/// clock an account is reading from.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Start at the current instant.
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Phase of a [`LatencyAccount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing recorded yet.
    Idle,
    /// Acquisition end recorded; waiting for usage.
    ResourcesReserved,
    /// Both timestamps recorded.
    Measured,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::ResourcesReserved => f.write_str("resources reserved"),
            Phase::Measured => f.write_str("measured"),
        }
    }
}

/// Measures the gap between the end of acquisition and the start of usage.
#[derive(Debug, Clone)]
pub struct LatencyAccount<C: Clock = MonotonicClock> {
    clock: C,
    armed_at: Instant,
    acquired_at: Option<Instant>,
    usage_at: Option<Instant>,
}

impl LatencyAccount<MonotonicClock> {
    /// Create an idle account on the system clock.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock)
    }
}

impl Default for LatencyAccount<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LatencyAccount<C> {
    /// Create an idle account reading from `clock`.
    pub fn with_clock(clock: C) -> Self {
        let armed_at = clock.now();
        Self {
            clock,
            armed_at,
            acquired_at: None,
            usage_at: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match (self.acquired_at, self.usage_at) {
            (None, _) => Phase::Idle,
            (Some(_), None) => Phase::ResourcesReserved,
            (Some(_), Some(_)) => Phase::Measured,
        }
    }

    /// Record the end of acquisition. Only valid while idle.
    pub fn finalize_acquisition(&mut self) -> NetResult<()> {
        self.expect_phase(Phase::Idle, "finalize acquisition")?;
        self.acquired_at = Some(self.clock.now());
        Ok(())
    }

    /// Record the start of usage and return the measured latency.
    ///
    /// Only valid after [`finalize_acquisition`](Self::finalize_acquisition).
    pub fn begin_usage(&mut self) -> NetResult<Duration> {
        self.expect_phase(Phase::ResourcesReserved, "begin usage")?;
        let now = self.clock.now();
        self.usage_at = Some(now);
        Ok(self.duration().unwrap_or_default())
    }

    /// Latency, once measured.
    pub fn duration(&self) -> Option<Duration> {
        match (self.acquired_at, self.usage_at) {
            (Some(acquired), Some(usage)) => Some(usage.saturating_duration_since(acquired)),
            _ => None,
        }
    }

    /// Latency in nanoseconds, saturating at `u64::MAX`.
    pub fn duration_ns(&self) -> Option<u64> {
        self.duration()
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Time from arming (creation or last reset) to the end of acquisition.
    pub fn acquisition_time(&self) -> Option<Duration> {
        self.acquired_at
            .map(|acquired| acquired.saturating_duration_since(self.armed_at))
    }

    /// Clear both timestamps and re-arm.
    pub fn reset(&mut self) {
        self.armed_at = self.clock.now();
        self.acquired_at = None;
        self.usage_at = None;
    }

    fn expect_phase(&self, expected: Phase, operation: &'static str) -> NetResult<()> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(NetError::InvalidPhaseTransition { phase, operation })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let clock = ManualClock::new();
        let mut account = LatencyAccount::with_clock(clock.clone());
        assert_eq!(account.phase(), Phase::Idle);
        assert_eq!(account.duration(), None);

        clock.advance(Duration::from_millis(3));
        account.finalize_acquisition().unwrap();
        assert_eq!(account.phase(), Phase::ResourcesReserved);
        assert_eq!(account.acquisition_time(), Some(Duration::from_millis(3)));

        clock.advance(Duration::from_nanos(1_500));
        let latency = account.begin_usage().unwrap();
        assert_eq!(latency, Duration::from_nanos(1_500));
        assert_eq!(account.phase(), Phase::Measured);
        assert_eq!(account.duration_ns(), Some(1_500));
    }

    #[test]
    fn test_usage_before_acquisition() {
        let mut account = LatencyAccount::new();
        let err = account.begin_usage().unwrap_err();
        assert!(matches!(
            err,
            NetError::InvalidPhaseTransition {
                phase: Phase::Idle,
                operation: "begin usage"
            }
        ));
    }

    #[test]
    fn test_double_finalize() {
        let mut account = LatencyAccount::new();
        account.finalize_acquisition().unwrap();
        assert!(account.finalize_acquisition().is_err());
    }

    #[test]
    fn test_measured_is_terminal_until_reset() {
        let clock = ManualClock::new();
        let mut account = LatencyAccount::with_clock(clock.clone());
        account.finalize_acquisition().unwrap();
        account.begin_usage().unwrap();
        assert!(account.finalize_acquisition().is_err());
        assert!(account.begin_usage().is_err());

        account.reset();
        assert_eq!(account.phase(), Phase::Idle);
        assert_eq!(account.duration(), None);
        assert_eq!(account.acquisition_time(), None);

        clock.advance(Duration::from_micros(7));
        account.finalize_acquisition().unwrap();
        clock.advance(Duration::from_micros(2));
        assert_eq!(account.begin_usage().unwrap(), Duration::from_micros(2));
    }

    #[test]
    fn test_monotonic_clock_is_non_negative() {
        let mut account = LatencyAccount::new();
        account.finalize_acquisition().unwrap();
        let latency = account.begin_usage().unwrap();
        assert!(latency >= Duration::ZERO);
    }
}
