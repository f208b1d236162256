//! Bounded status history

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamped::Timestamped;

/// Default number of entries kept per schedule.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// History of timestamped status values, newest first.
///
/// Entries may lie in the future (planned changes); [`StatusSchedule::current_at`]
/// only looks at entries that are already valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSchedule<T> {
    entries: VecDeque<Timestamped<T>>,
    max_entries: usize,
}

impl<T: Copy + PartialEq + Default> StatusSchedule<T> {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Schedule starting with an initial value.
    pub fn starting_with(value: T, timestamp: DateTime<Utc>) -> Self {
        let mut schedule = Self::new();
        schedule.entries.push_front(Timestamped::new(value, timestamp));
        schedule
    }

    /// The value valid at `now`, or `T::default()` when nothing is valid yet.
    pub fn current_at(&self, now: DateTime<Utc>) -> Timestamped<T> {
        self.entries
            .iter()
            .find(|e| e.timestamp <= now)
            .copied()
            .unwrap_or_else(|| Timestamped::new(T::default(), DateTime::<Utc>::MIN_UTC))
    }

    pub fn current(&self) -> Timestamped<T> {
        self.current_at(Utc::now())
    }

    /// Record a value.
    ///
    /// Returns `(old, new)` when the recorded value changes what is valid now,
    /// or when it plans a change for the future. Inserting the value that is
    /// already valid at `timestamp` is a no-op, and an entry older than the
    /// whole bounded history is dropped without a transition.
    pub fn insert(
        &mut self,
        value: T,
        timestamp: DateTime<Utc>,
    ) -> Option<(Timestamped<T>, Timestamped<T>)> {
        self.insert_at(value, timestamp, Utc::now())
    }

    /// [`StatusSchedule::insert`] relative to an explicit `now`.
    pub fn insert_at(
        &mut self,
        value: T,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<(Timestamped<T>, Timestamped<T>)> {
        let valid_then = self.current_at(timestamp);
        if valid_then.value == value && !self.entries.is_empty() {
            return None;
        }
        let valid_now = self.current_at(now);

        let new = Timestamped::new(value, timestamp);
        let position = self
            .entries
            .iter()
            .position(|e| e.timestamp <= timestamp)
            .unwrap_or(self.entries.len());
        if position >= self.max_entries {
            return None;
        }
        self.entries.insert(position, new);
        self.entries.truncate(self.max_entries);

        if timestamp > now {
            return Some((valid_then, new));
        }
        let current = self.current_at(now);
        (current.value != valid_now.value).then_some((valid_now, current))
    }

    /// All entries, newest first.
    pub fn history(&self) -> impl Iterator<Item = &Timestamped<T>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Copy + PartialEq + Default> Default for StatusSchedule<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::EvseStatus;
    use chrono::Duration;

    #[test]
    fn empty_schedule_reports_default() {
        let schedule = StatusSchedule::<EvseStatus>::new();
        assert_eq!(schedule.current().value, EvseStatus::Unspecified);
    }

    #[test]
    fn insert_ignores_unchanged_values() {
        let now = Utc::now();
        let mut schedule = StatusSchedule::starting_with(EvseStatus::Available, now);
        assert!(schedule
            .insert(EvseStatus::Available, now + Duration::seconds(1))
            .is_none());

        let (old, new) = schedule
            .insert(EvseStatus::Charging, now + Duration::seconds(2))
            .unwrap();
        assert_eq!(old.value, EvseStatus::Available);
        assert_eq!(new.value, EvseStatus::Charging);
        assert_eq!(schedule.len(), 2);
    }

    #[test]
    fn future_entries_are_not_current_yet() {
        let now = Utc::now();
        let mut schedule = StatusSchedule::starting_with(EvseStatus::Available, now);
        schedule.insert(EvseStatus::OutOfService, now + Duration::hours(1));

        assert_eq!(schedule.current_at(now).value, EvseStatus::Available);
        assert_eq!(
            schedule.current_at(now + Duration::hours(2)).value,
            EvseStatus::OutOfService
        );
        assert_eq!(
            schedule.history().next().unwrap().value,
            EvseStatus::OutOfService
        );
    }

    #[test]
    fn entries_older_than_the_history_are_dropped() {
        let now = Utc::now();
        let mut schedule = StatusSchedule::with_max_entries(2);
        schedule.insert_at(EvseStatus::Available, now - Duration::seconds(2), now);
        schedule.insert_at(EvseStatus::Charging, now - Duration::seconds(1), now);

        let change = schedule.insert_at(EvseStatus::OutOfService, now - Duration::seconds(10), now);
        assert!(change.is_none());
        assert_eq!(schedule.len(), 2);
        assert!(schedule.history().all(|e| e.value != EvseStatus::OutOfService));
        assert_eq!(schedule.current_at(now).value, EvseStatus::Charging);
    }

    #[test]
    fn backdated_entries_report_only_changes_to_the_current_value() {
        let now = Utc::now();
        let mut schedule = StatusSchedule::new();
        schedule.insert_at(EvseStatus::Available, now - Duration::seconds(5), now);

        let hidden = schedule.insert_at(EvseStatus::Offline, now - Duration::seconds(10), now);
        assert!(hidden.is_none());
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.current_at(now).value, EvseStatus::Available);

        let (old, new) = schedule
            .insert_at(EvseStatus::Charging, now - Duration::seconds(1), now)
            .unwrap();
        assert_eq!(old.value, EvseStatus::Available);
        assert_eq!(new.value, EvseStatus::Charging);
    }

    #[test]
    fn history_is_bounded() {
        let now = Utc::now();
        let mut schedule = StatusSchedule::with_max_entries(3);
        for (i, status) in [
            EvseStatus::Available,
            EvseStatus::Charging,
            EvseStatus::Available,
            EvseStatus::Charging,
        ]
        .into_iter()
        .enumerate()
        {
            schedule.insert(status, now + Duration::seconds(i as i64));
        }
        assert_eq!(schedule.len(), 3);
    }
}
