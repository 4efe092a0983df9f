//! Request-time source.
//!
//! Every mutating operation is stamped with one instant, resolved once per
//! request: wall-clock "now" unless the caller pins an explicit time, then
//! optionally shifted by a signed duration (for backdating).

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Supplies the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Per-request overrides applied on top of a [`Clock`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestTime {
    /// Replaces "now" entirely.
    pub at: Option<DateTime<Utc>>,
    /// Added to the base instant (negative values move it into the past).
    pub shift: Option<Duration>,
}

impl RequestTime {
    /// Uses the clock unchanged.
    #[must_use]
    pub const fn now() -> Self {
        Self {
            at: None,
            shift: None,
        }
    }

    /// Pins the request to an explicit instant.
    #[must_use]
    pub const fn at(at: DateTime<Utc>) -> Self {
        Self {
            at: Some(at),
            shift: None,
        }
    }

    #[must_use]
    pub const fn shifted(mut self, shift: Duration) -> Self {
        self.shift = Some(shift);
        self
    }

    /// Resolves the effective instant for this request, truncated to the
    /// millisecond precision timestamps are stored with.
    pub fn resolve(&self, clock: &impl Clock) -> DateTime<Utc> {
        let base = self.at.unwrap_or_else(|| clock.now());
        let at = match self.shift {
            Some(shift) => base + shift,
            None => base,
        };
        at.trunc_subsecs(3)
    }
}
