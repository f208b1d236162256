//! Outcomes of tariff updates and deletions

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChargingTariffId, EventTrackingId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateTariffResultType {
    /// The tariff did not exist before.
    Added,
    /// An existing tariff was replaced.
    Updated,
    /// The stored tariff was identical.
    NoOperation,
    Rejected,
    Error,
}

impl fmt::Display for UpdateTariffResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of adding or updating a charging tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTariffResult {
    pub event_tracking_id: EventTrackingId,
    pub tariff_id: ChargingTariffId,
    pub sender_id: String,
    pub result: UpdateTariffResultType,
    pub description: Option<String>,
    pub warnings: Vec<String>,
    pub runtime: Option<Duration>,
}

impl UpdateTariffResult {
    fn new(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
        result: UpdateTariffResultType,
        description: Option<String>,
    ) -> Self {
        Self {
            event_tracking_id,
            tariff_id,
            sender_id: sender_id.into(),
            result,
            description,
            warnings: Vec::new(),
            runtime: None,
        }
    }

    pub fn added(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
    ) -> Self {
        Self::new(event_tracking_id, tariff_id, sender_id, UpdateTariffResultType::Added, None)
    }

    pub fn updated(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
    ) -> Self {
        Self::new(event_tracking_id, tariff_id, sender_id, UpdateTariffResultType::Updated, None)
    }

    pub fn no_operation(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            tariff_id,
            sender_id,
            UpdateTariffResultType::NoOperation,
            None,
        )
    }

    pub fn rejected(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            tariff_id,
            sender_id,
            UpdateTariffResultType::Rejected,
            Some(description.into()),
        )
    }

    pub fn error(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            tariff_id,
            sender_id,
            UpdateTariffResultType::Error,
            Some(description.into()),
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.result,
            UpdateTariffResultType::Added
                | UpdateTariffResultType::Updated
                | UpdateTariffResultType::NoOperation
        )
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeleteTariffResultType {
    Success,
    NotFound,
    NoOperation,
    Rejected,
    Error,
}

impl fmt::Display for DeleteTariffResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of deleting a charging tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteTariffResult {
    pub event_tracking_id: EventTrackingId,
    pub tariff_id: ChargingTariffId,
    pub sender_id: String,
    pub result: DeleteTariffResultType,
    pub description: Option<String>,
    pub warnings: Vec<String>,
    pub runtime: Option<Duration>,
}

impl DeleteTariffResult {
    fn new(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
        result: DeleteTariffResultType,
        description: Option<String>,
    ) -> Self {
        Self {
            event_tracking_id,
            tariff_id,
            sender_id: sender_id.into(),
            result,
            description,
            warnings: Vec::new(),
            runtime: None,
        }
    }

    pub fn success(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
    ) -> Self {
        Self::new(event_tracking_id, tariff_id, sender_id, DeleteTariffResultType::Success, None)
    }

    pub fn not_found(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
    ) -> Self {
        Self::new(event_tracking_id, tariff_id, sender_id, DeleteTariffResultType::NotFound, None)
    }

    pub fn no_operation(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            tariff_id,
            sender_id,
            DeleteTariffResultType::NoOperation,
            None,
        )
    }

    pub fn rejected(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            tariff_id,
            sender_id,
            DeleteTariffResultType::Rejected,
            Some(description.into()),
        )
    }

    pub fn error(
        event_tracking_id: EventTrackingId,
        tariff_id: ChargingTariffId,
        sender_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            event_tracking_id,
            tariff_id,
            sender_id,
            DeleteTariffResultType::Error,
            Some(description.into()),
        )
    }

    pub fn is_success(&self) -> bool {
        self.result == DeleteTariffResultType::Success
    }

    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_factories() {
        let id = ChargingTariffId::parse("AC1").unwrap();
        let added = UpdateTariffResult::added(EventTrackingId::new(), id.clone(), "DE*GEF");
        assert_eq!(added.result, UpdateTariffResultType::Added);
        assert!(added.is_success());

        let rejected =
            UpdateTariffResult::rejected(EventTrackingId::new(), id, "DE*GEF", "currency mismatch");
        assert!(!rejected.is_success());
        assert_eq!(rejected.description.as_deref(), Some("currency mismatch"));
    }

    #[test]
    fn delete_factories() {
        let id = ChargingTariffId::parse("AC1").unwrap();
        let missing = DeleteTariffResult::not_found(EventTrackingId::new(), id.clone(), "DE*GEF");
        assert_eq!(missing.result, DeleteTariffResultType::NotFound);
        assert!(!missing.is_success());
        assert!(DeleteTariffResult::success(EventTrackingId::new(), id, "DE*GEF").is_success());
    }
}
