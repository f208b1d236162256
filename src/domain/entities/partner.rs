//! Roaming partners receiving status pushes

use async_trait::async_trait;

use crate::domain::ids::EventTrackingId;
use crate::domain::results::PushStatusResult;
use crate::domain::status::{EvseAdminStatusUpdate, EvseStatusUpdate};

/// A party the roaming network forwards EVSE data to, e.g. a roaming
/// protocol adapter or a remote overlay node.
#[async_trait]
pub trait RoamingPartner: Send + Sync {
    /// Unique id, used as sender id in push results.
    fn id(&self) -> &str;

    async fn push_evse_status(
        &self,
        event_tracking_id: EventTrackingId,
        updates: &[EvseStatusUpdate],
    ) -> PushStatusResult;

    async fn push_evse_admin_status(
        &self,
        event_tracking_id: EventTrackingId,
        _updates: &[EvseAdminStatusUpdate],
    ) -> PushStatusResult {
        PushStatusResult::no_operation(event_tracking_id, self.id())
    }
}
