//! A thin, serde-friendly wrapper over UTC timestamps.
//!
//! Entities in `dsm_state` record a handful of lifecycle timestamps
//! (created, started, concluded, finalized) that must be monotonic
//! non-decreasing once set. `Timestamp` exists so those fields all share
//! one small, comparable type instead of each module reaching for `chrono`
//! directly.

use std::fmt;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    #[inline]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    #[inline]
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    #[inline]
    pub fn as_utc(&self) -> DateTime<Utc> {
        self.0
    }

    /// True if `self` is not earlier than `other` — the property every
    /// lifecycle timestamp pair must satisfy once both are set.
    #[inline]
    pub fn is_not_before(&self, other: &Timestamp) -> bool {
        self.0 >= other.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    #[inline]
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.to_rfc3339(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn later_timestamp_is_not_before_earlier() {
        let a = Timestamp::now();
        let b = Timestamp::from_utc(a.as_utc() + Duration::seconds(1));
        assert!(b.is_not_before(&a));
        assert!(!a.is_not_before(&b));
    }

    #[test]
    fn equal_timestamps_satisfy_not_before() {
        let a = Timestamp::now();
        assert!(a.is_not_before(&a));
    }
}
