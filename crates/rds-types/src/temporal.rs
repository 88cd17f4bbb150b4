use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock milliseconds since the UNIX epoch.
///
/// Used for the `modified`, `saved`, and collection-level timestamps of a
/// store. Values handed out by a single [`MonotonicClock`] are strictly
/// increasing, so comparing two timestamps tells which event happened later
/// even when both fall in the same millisecond.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// The zero timestamp. Collections that never changed report this.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Milliseconds since the UNIX epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Current wall-clock time.
    pub fn wall_clock() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(ms)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clock that never hands out the same timestamp twice.
///
/// - **Tick**: `next = max(wall_clock, last + 1)`.
/// - **Guarantee**: every returned value is strictly greater than the
///   previous one, so timestamps within a registry never go backwards even if
///   the wall clock does.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<u64>,
}

impl MonotonicClock {
    /// Create a clock that has not ticked yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next timestamp.
    pub fn now(&self) -> Timestamp {
        let wall = Timestamp::wall_clock().as_millis();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = wall.max(*last + 1);
        *last = next;
        Timestamp(next)
    }

    /// The most recent timestamp handed out, or zero.
    pub fn last(&self) -> Timestamp {
        Timestamp(*self.last.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
