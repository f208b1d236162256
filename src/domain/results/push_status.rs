//! Outcome of pushing status updates to a roaming partner

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ids::EventTrackingId;

/// What happened to a status push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PushStatusResultType {
    #[default]
    Unspecified,
    /// Nothing had to be sent.
    NoOperation,
    /// Accepted for later delivery.
    Enqueued,
    Success,
    /// The receiver is out of service.
    OutOfService,
    /// The sender is administratively disabled.
    AdminDown,
    LockTimeout,
    Error,
}

impl PushStatusResultType {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Enqueued | Self::NoOperation)
    }
}

impl fmt::Display for PushStatusResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of pushing status updates, as reported by one sender
/// (a roaming partner or the roaming network itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushStatusResult {
    pub event_tracking_id: EventTrackingId,
    pub sender_id: String,
    pub result: PushStatusResultType,
    pub description: Option<String>,
    pub warnings: Vec<String>,
    /// Ids whose updates the receiver refused.
    pub rejected_ids: Vec<String>,
    pub runtime: Option<Duration>,
}

impl PushStatusResult {
    fn new(
        event_tracking_id: EventTrackingId,
        sender_id: impl Into<String>,
        result: PushStatusResultType,
        description: Option<String>,
    ) -> Self {
        Self {
            event_tracking_id,
            sender_id: sender_id.into(),
            result,
            description,
            warnings: Vec::new(),
            rejected_ids: Vec::new(),
            runtime: None,
        }
    }

    pub fn no_operation(event_tracking_id: EventTrackingId, sender_id: impl Into<String>) -> Self {
        Self::new(event_tracking_id, sender_id, PushStatusResultType::NoOperation, None)
    }

    pub fn enqueued(event_tracking_id: EventTrackingId, sender_id: impl Into<String>) -> Self {
        Self::new(event_tracking_id, sender_id, PushStatusResultType::Enqueued, None)
    }

    pub fn success(event_tracking_id: EventTrackingId, sender_id: impl Into<String>) -> Self {
        Self::new(event_tracking_id, sender_id, PushStatusResultType::Success, None)
    }

    pub fn out_of_service(
        event_tracking_id: EventTrackingId,
        sender_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            sender_id,
            PushStatusResultType::OutOfService,
            Some(description.into()),
        )
    }

    pub fn admin_down(event_tracking_id: EventTrackingId, sender_id: impl Into<String>) -> Self {
        Self::new(event_tracking_id, sender_id, PushStatusResultType::AdminDown, None)
    }

    pub fn lock_timeout(event_tracking_id: EventTrackingId, sender_id: impl Into<String>) -> Self {
        Self::new(event_tracking_id, sender_id, PushStatusResultType::LockTimeout, None)
    }

    pub fn error(
        event_tracking_id: EventTrackingId,
        sender_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            sender_id,
            PushStatusResultType::Error,
            Some(description.into()),
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_rejected(mut self, ids: impl IntoIterator<Item = impl ToString>) -> Self {
        self.rejected_ids
            .extend(ids.into_iter().map(|id| id.to_string()));
        self
    }

    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Merge the results of several receivers into one.
    ///
    /// Errors dominate, then unavailability (`OutOfService`, `AdminDown`),
    /// then `Enqueued`. An empty list or a list of no-ops is a `NoOperation`.
    pub fn flatten(
        event_tracking_id: EventTrackingId,
        sender_id: impl Into<String>,
        results: &[PushStatusResult],
    ) -> Self {
        use PushStatusResultType as T;

        let any = |t: T| results.iter().any(|r| r.result == t);
        let result = if results.iter().all(|r| r.result == T::NoOperation) {
            T::NoOperation
        } else if any(T::Error) || any(T::LockTimeout) || any(T::Unspecified) {
            T::Error
        } else if any(T::OutOfService) {
            T::OutOfService
        } else if any(T::AdminDown) {
            T::AdminDown
        } else if any(T::Enqueued) {
            T::Enqueued
        } else {
            T::Success
        };

        let mut flat = Self::new(event_tracking_id, sender_id, result, None);
        for r in results {
            flat.warnings.extend(r.warnings.iter().cloned());
            if !r.result.is_success() {
                flat.warnings.push(match &r.description {
                    Some(d) => format!("{}: {} ({})", r.sender_id, r.result, d),
                    None => format!("{}: {}", r.sender_id, r.result),
                });
            }
            flat.rejected_ids.extend(r.rejected_ids.iter().cloned());
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid() -> EventTrackingId {
        EventTrackingId::new()
    }

    #[test]
    fn factories_stamp_their_type() {
        assert_eq!(PushStatusResult::success(tid(), "a").result, PushStatusResultType::Success);
        assert_eq!(
            PushStatusResult::enqueued(tid(), "a").result,
            PushStatusResultType::Enqueued
        );
        let err = PushStatusResult::error(tid(), "a", "boom");
        assert_eq!(err.result, PushStatusResultType::Error);
        assert_eq!(err.description.as_deref(), Some("boom"));
    }

    #[test]
    fn flatten_empty_is_no_operation() {
        let flat = PushStatusResult::flatten(tid(), "net", &[]);
        assert_eq!(flat.result, PushStatusResultType::NoOperation);
    }

    #[test]
    fn flatten_all_success() {
        let results = [
            PushStatusResult::success(tid(), "a"),
            PushStatusResult::no_operation(tid(), "b"),
        ];
        let flat = PushStatusResult::flatten(tid(), "net", &results);
        assert_eq!(flat.result, PushStatusResultType::Success);
        assert!(flat.warnings.is_empty());
    }

    #[test]
    fn flatten_error_dominates_and_collects_warnings() {
        let results = [
            PushStatusResult::enqueued(tid(), "a"),
            PushStatusResult::out_of_service(tid(), "b", "maintenance"),
            PushStatusResult::error(tid(), "c", "timeout").with_rejected(["DE*GEF*E1"]),
        ];
        let flat = PushStatusResult::flatten(tid(), "net", &results);
        assert_eq!(flat.result, PushStatusResultType::Error);
        assert_eq!(flat.warnings.len(), 2);
        assert_eq!(flat.warnings[0], "b: OutOfService (maintenance)");
        assert_eq!(flat.rejected_ids, vec!["DE*GEF*E1".to_string()]);
    }
}
