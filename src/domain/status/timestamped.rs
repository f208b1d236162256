//! Values stamped with the time they became valid

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value together with the point in time it became valid.
///
/// Ordering compares timestamps; different values stamped with the same
/// time are unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> Timestamped<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }

    /// Stamp with the current time.
    pub fn now(value: T) -> Self {
        Self::new(value, Utc::now())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timestamped<U> {
        Timestamped::new(f(self.value), self.timestamp)
    }
}

impl<T: Eq> PartialOrd for Timestamped<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.timestamp.cmp(&other.timestamp) {
            Ordering::Equal if self.value != other.value => None,
            ordering => Some(ordering),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Timestamped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} since {}", self.value, self.timestamp.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ordering_follows_timestamps() {
        let early = Timestamped::new("b", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let late = Timestamped::new("a", Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!(early < late);
    }

    #[test]
    fn display_includes_value_and_time() {
        let ts = Timestamped::new(42, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(ts.to_string(), "42 since 2024-01-01T12:00:00+00:00");
    }
}
