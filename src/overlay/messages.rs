//! Payloads of the actions a node understands

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::EventTrackingId;
use crate::domain::status::EvseStatusUpdate;

pub const ECHO: &str = "Echo";
pub const GET_OPERATORS: &str = "GetOperators";
pub const GET_EVSE_STATUS: &str = "GetEVSEStatus";
pub const SET_EVSE_STATUS: &str = "SetEVSEStatus";
pub const PUSH_EVSE_STATUS: &str = "PushEVSEStatus";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEvseStatusRequest {
    pub evse_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvseStatusInfo {
    pub evse_id: String,
    pub status: String,
    pub status_since: DateTime<Utc>,
    pub admin_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEvseStatusRequest {
    pub evse_id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetStatusOutcome {
    Accepted,
    NoOperation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEvseStatusResponse {
    pub status: SetStatusOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    pub admin_status: String,
    pub evse_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOperatorsResponse {
    pub roaming_network_id: String,
    pub operators: Vec<OperatorInfo>,
}

/// One EVSE status change on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvseStatusRecord {
    pub evse_id: String,
    pub old_status: String,
    pub new_status: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&EvseStatusUpdate> for EvseStatusRecord {
    fn from(update: &EvseStatusUpdate) -> Self {
        Self {
            evse_id: update.id.to_string(),
            old_status: update.old_status.value.to_string(),
            new_status: update.new_status.value.to_string(),
            timestamp: update.new_status.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvseStatusRequest {
    pub event_tracking_id: EventTrackingId,
    pub updates: Vec<EvseStatusRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvseStatusResponse {
    /// Name of a `PushStatusResultType` variant.
    pub result: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uses_camel_case_on_the_wire() {
        let request: SetEvseStatusRequest =
            serde_json::from_value(json!({"evseId": "DE*GEF*E1*1", "status": "Available"}))
                .unwrap();
        assert_eq!(request.evse_id, "DE*GEF*E1*1");
        assert!(request.timestamp.is_none());

        let response = PushEvseStatusResponse {
            result: "Success".into(),
            rejected_ids: vec![],
            description: None,
        };
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({"result": "Success"}));
    }
}
