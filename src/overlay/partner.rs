//! Roaming partner reached through the overlay network

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::messages::{self, EvseStatusRecord, PushEvseStatusRequest, PushEvseStatusResponse};
use super::node_id::NetworkingNodeId;
use super::router::{OverlayRouter, RequestError};
use crate::domain::entities::RoamingPartner;
use crate::domain::ids::EventTrackingId;
use crate::domain::results::{PushStatusResult, PushStatusResultType};
use crate::domain::status::EvseStatusUpdate;

/// Forwards EVSE status updates to a remote node as `PushEVSEStatus` requests.
pub struct OverlayRoamingPartner {
    id: String,
    router: Arc<OverlayRouter>,
    destination: NetworkingNodeId,
}

impl OverlayRoamingPartner {
    pub fn new(id: impl Into<String>, router: Arc<OverlayRouter>, destination: NetworkingNodeId) -> Self {
        Self {
            id: id.into(),
            router,
            destination,
        }
    }

    pub fn destination(&self) -> &NetworkingNodeId {
        &self.destination
    }

    fn to_result(
        &self,
        event_tracking_id: EventTrackingId,
        response: Result<Value, RequestError>,
    ) -> PushStatusResult {
        let payload = match response {
            Ok(payload) => payload,
            Err(e @ (RequestError::NoRoute(_) | RequestError::SendFailed(_))) => {
                return PushStatusResult::out_of_service(event_tracking_id, &self.id, e.to_string())
            }
            Err(e) => return PushStatusResult::error(event_tracking_id, &self.id, e.to_string()),
        };

        let response: PushEvseStatusResponse = match serde_json::from_value(payload) {
            Ok(response) => response,
            Err(e) => {
                warn!(partner = self.id.as_str(), error = %e, "Unreadable PushEVSEStatus response");
                return PushStatusResult::error(event_tracking_id, &self.id, e.to_string());
            }
        };

        let result_type: PushStatusResultType =
            serde_json::from_value(Value::String(response.result.clone())).unwrap_or_else(|_| {
                warn!(partner = self.id.as_str(), result = response.result.as_str(), "Unknown push result");
                PushStatusResultType::Error
            });

        let mut result = match result_type {
            PushStatusResultType::Success => PushStatusResult::success(event_tracking_id, &self.id),
            PushStatusResultType::NoOperation => {
                PushStatusResult::no_operation(event_tracking_id, &self.id)
            }
            PushStatusResultType::Enqueued => PushStatusResult::enqueued(event_tracking_id, &self.id),
            PushStatusResultType::OutOfService => {
                PushStatusResult::out_of_service(event_tracking_id, &self.id, "Remote out of service")
            }
            PushStatusResultType::AdminDown => PushStatusResult::admin_down(event_tracking_id, &self.id),
            PushStatusResultType::LockTimeout => {
                PushStatusResult::lock_timeout(event_tracking_id, &self.id)
            }
            PushStatusResultType::Error | PushStatusResultType::Unspecified => {
                PushStatusResult::error(event_tracking_id, &self.id, "Remote error")
            }
        };
        if let Some(description) = response.description {
            result = result.with_description(description);
        }
        result.with_rejected(response.rejected_ids)
    }
}

#[async_trait]
impl RoamingPartner for OverlayRoamingPartner {
    fn id(&self) -> &str {
        &self.id
    }

    async fn push_evse_status(
        &self,
        event_tracking_id: EventTrackingId,
        updates: &[EvseStatusUpdate],
    ) -> PushStatusResult {
        let request = PushEvseStatusRequest {
            event_tracking_id,
            updates: updates.iter().map(EvseStatusRecord::from).collect(),
        };
        let payload = match serde_json::to_value(&request) {
            Ok(payload) => payload,
            Err(e) => return PushStatusResult::error(event_tracking_id, &self.id, e.to_string()),
        };

        let response = self
            .router
            .send_request(&self.destination, messages::PUSH_EVSE_STATUS, payload)
            .await;
        self.to_result(event_tracking_id, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::handler::{HandlerError, RequestHandler};
    use crate::overlay::registry::LinkRegistry;
    use serde_json::json;

    struct Nobody;

    #[async_trait]
    impl RequestHandler for Nobody {
        async fn handle_request(
            &self,
            _source: &NetworkingNodeId,
            action: &str,
            _payload: Value,
        ) -> Result<Value, HandlerError> {
            Err(HandlerError::not_implemented(action))
        }
    }

    fn partner() -> OverlayRoamingPartner {
        let router = Arc::new(OverlayRouter::new(
            NetworkingNodeId::parse("CSMS").unwrap(),
            LinkRegistry::shared(),
            Arc::new(Nobody),
        ));
        OverlayRoamingPartner::new("hub", router, NetworkingNodeId::parse("HUB").unwrap())
    }

    #[test]
    fn maps_responses_to_push_results() {
        let p = partner();
        let tracking = EventTrackingId::new();

        let ok = p.to_result(
            tracking,
            Ok(json!({"result": "Success", "rejectedIds": ["DE*GEF*E1*9"]})),
        );
        assert_eq!(ok.result, PushStatusResultType::Success);
        assert_eq!(ok.rejected_ids, vec!["DE*GEF*E1*9".to_string()]);
        assert_eq!(ok.sender_id, "hub");

        let unknown = p.to_result(tracking, Ok(json!({"result": "Maybe"})));
        assert_eq!(unknown.result, PushStatusResultType::Error);

        let garbage = p.to_result(tracking, Ok(json!([1, 2])));
        assert_eq!(garbage.result, PushStatusResultType::Error);

        let timeout = p.to_result(tracking, Err(RequestError::Timeout));
        assert_eq!(timeout.result, PushStatusResultType::Error);
    }

    #[tokio::test]
    async fn unreachable_partner_is_out_of_service() {
        let p = partner();
        let result = p.push_evse_status(EventTrackingId::new(), &[]).await;
        assert_eq!(result.result, PushStatusResultType::OutOfService);
    }
}
