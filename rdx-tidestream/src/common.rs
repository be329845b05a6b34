//! Contains common, primitive types shared across the engine.
//!
//! This module defines the key types used to identify timers, subject observers
//! and groups, plus the `Timestamp` every scheduler reports. Using distinct
//! types keeps a timer key from ever being confused with an observer key.

use slotmap::new_key_type;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

new_key_type! {
    /// Uniquely and safely identifies a pending timer within a scheduler.
    ///
    /// Keys are generational, so a stale `CancelToken` can never cancel a
    /// newer timer that happens to reuse the same slot.
    pub struct TimerId;

    /// Identifies one observer attached to a `Subject`.
    pub struct ObserverId;

    /// Identifies a live group inside a `group_by` operator.
    pub struct GroupId;
}

/// A point on a scheduler's logical timeline, in milliseconds since the
/// scheduler was created.
///
/// Both the virtual and the real-time scheduler report time this way, so
/// window boundaries computed in tests line up with production runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The origin of every scheduler's timeline.
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_duration(elapsed: Duration) -> Self {
        Timestamp(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }

    /// Time elapsed since `earlier`, saturating at zero.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(Timestamp::from_duration(rhs).0))
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        self.saturating_since(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}
