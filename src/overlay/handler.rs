//! Handling of requests addressed to the local node

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::error_code::ErrorCode;
use super::messages::{
    self, EvseStatusInfo, GetEvseStatusRequest, GetOperatorsResponse, OperatorInfo,
    PushEvseStatusRequest, PushEvseStatusResponse, SetEvseStatusRequest, SetEvseStatusResponse,
    SetStatusOutcome,
};
use super::node_id::NetworkingNodeId;
use crate::domain::entities::RoamingNetwork;
use crate::domain::error::DomainError;
use crate::domain::ids::EvseId;
use crate::domain::results::{PushStatusResult, PushStatusResultType};
use crate::domain::status::{EvseStatus, EvseStatusUpdate};

/// A request could not be answered; sent back as a JSON error message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {description}")]
pub struct HandlerError {
    pub code: ErrorCode,
    pub description: String,
}

impl HandlerError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(ErrorCode::NotImplemented, format!("Unknown action '{}'", action))
    }
}

impl From<DomainError> for HandlerError {
    fn from(e: DomainError) -> Self {
        let code = match &e {
            DomainError::NotFound { .. } => ErrorCode::PropertyConstraintViolation,
            DomainError::Validation(_) | DomainError::Id(_) => ErrorCode::FormationViolation,
            DomainError::Conflict { .. } | DomainError::Vetoed { .. } => ErrorCode::GenericError,
        };
        Self::new(code, e.to_string())
    }
}

/// Answers requests whose destination is the local node.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(
        &self,
        source: &NetworkingNodeId,
        action: &str,
        payload: Value,
    ) -> Result<Value, HandlerError>;

    async fn handle_binary_request(
        &self,
        _source: &NetworkingNodeId,
        action: &str,
        _payload: &[u8],
    ) -> Result<Vec<u8>, HandlerError> {
        Err(HandlerError::not_implemented(action))
    }
}

/// Exposes a roaming network to overlay peers.
pub struct RoamingNetworkHandler {
    roaming_network: Arc<RoamingNetwork>,
}

impl RoamingNetworkHandler {
    pub fn new(roaming_network: Arc<RoamingNetwork>) -> Self {
        Self { roaming_network }
    }

    fn get_operators(&self) -> GetOperatorsResponse {
        GetOperatorsResponse {
            roaming_network_id: self.roaming_network.id().to_string(),
            operators: self
                .roaming_network
                .charging_station_operators()
                .iter()
                .map(|op| OperatorInfo {
                    id: op.id().to_string(),
                    name: op.name().to_string(),
                    status: op.status().value.to_string(),
                    admin_status: op.admin_status().value.to_string(),
                    evse_count: op.evse_count(),
                })
                .collect(),
        }
    }

    fn get_evse_status(&self, request: GetEvseStatusRequest) -> Result<EvseStatusInfo, HandlerError> {
        let id = parse_evse_id(&request.evse_id)?;
        let evse = self
            .roaming_network
            .get_evse(&id)
            .ok_or_else(|| DomainError::not_found("EVSE", &id))?;
        let status = evse.status();
        Ok(EvseStatusInfo {
            evse_id: id.to_string(),
            status: status.value.to_string(),
            status_since: status.timestamp,
            admin_status: evse.admin_status().value.to_string(),
        })
    }

    fn set_evse_status(
        &self,
        request: SetEvseStatusRequest,
    ) -> Result<SetEvseStatusResponse, HandlerError> {
        let id = parse_evse_id(&request.evse_id)?;
        let status = parse_evse_status(&request.status)?;
        let update = self.roaming_network.set_evse_status(
            &id,
            status,
            request.timestamp.unwrap_or_else(Utc::now),
        )?;
        let status = match update {
            Some(update) => {
                // Local changes go on to the roaming partners; pushed ones do not.
                tokio::spawn(forward_to_partners(self.roaming_network.clone(), update));
                SetStatusOutcome::Accepted
            }
            None => SetStatusOutcome::NoOperation,
        };
        Ok(SetEvseStatusResponse { status })
    }

    fn push_evse_status(&self, request: PushEvseStatusRequest) -> PushEvseStatusResponse {
        let mut rejected_ids = Vec::new();
        let mut applied = 0usize;

        for record in &request.updates {
            let outcome = parse_evse_id(&record.evse_id).and_then(|id| {
                let status = parse_evse_status(&record.new_status)?;
                Ok(self
                    .roaming_network
                    .set_evse_status(&id, status, record.timestamp)?)
            });
            match outcome {
                Ok(Some(_)) => applied += 1,
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        event_tracking_id = %request.event_tracking_id,
                        evse_id = record.evse_id.as_str(),
                        error = %e,
                        "Rejected pushed status"
                    );
                    rejected_ids.push(record.evse_id.clone());
                }
            }
        }

        let result = if request.updates.is_empty() || (applied == 0 && rejected_ids.is_empty()) {
            PushStatusResultType::NoOperation
        } else if rejected_ids.len() == request.updates.len() {
            PushStatusResultType::Error
        } else {
            PushStatusResultType::Success
        };

        PushEvseStatusResponse {
            result: result.to_string(),
            description: (!rejected_ids.is_empty())
                .then(|| format!("{} of {} updates rejected", rejected_ids.len(), request.updates.len())),
            rejected_ids,
        }
    }
}

/// Push a locally set EVSE status to the roaming partners.
async fn forward_to_partners(
    roaming_network: Arc<RoamingNetwork>,
    update: EvseStatusUpdate,
) -> PushStatusResult {
    let evse_id = update.id.clone();
    let result = roaming_network.push_evse_status(&[update], None).await;
    if !result.result.is_success() {
        warn!(
            event_tracking_id = %result.event_tracking_id,
            evse_id = %evse_id,
            result = %result.result,
            warnings = ?result.warnings,
            rejected = result.rejected_ids.len(),
            "Forwarding EVSE status to roaming partners failed"
        );
    }
    result
}

#[async_trait]
impl RequestHandler for RoamingNetworkHandler {
    async fn handle_request(
        &self,
        source: &NetworkingNodeId,
        action: &str,
        payload: Value,
    ) -> Result<Value, HandlerError> {
        debug!(source = %source, action, "Handling overlay request");
        match action {
            messages::ECHO => Ok(payload),
            messages::GET_OPERATORS => to_payload(&self.get_operators()),
            messages::GET_EVSE_STATUS => to_payload(&self.get_evse_status(from_payload(payload)?)?),
            messages::SET_EVSE_STATUS => to_payload(&self.set_evse_status(from_payload(payload)?)?),
            messages::PUSH_EVSE_STATUS => to_payload(&self.push_evse_status(from_payload(payload)?)),
            other => {
                warn!(source = %source, action = other, "Unknown action");
                Err(HandlerError::not_implemented(other))
            }
        }
    }

    async fn handle_binary_request(
        &self,
        _source: &NetworkingNodeId,
        action: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, HandlerError> {
        match action {
            messages::ECHO => Ok(payload.to_vec()),
            other => Err(HandlerError::not_implemented(other)),
        }
    }
}

fn from_payload<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload)
        .map_err(|e| HandlerError::new(ErrorCode::FormationViolation, e.to_string()))
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value)
        .map_err(|e| HandlerError::new(ErrorCode::InternalError, e.to_string()))
}

fn parse_evse_id(text: &str) -> Result<EvseId, HandlerError> {
    EvseId::parse(text).map_err(|e| HandlerError::new(ErrorCode::FormationViolation, e.to_string()))
}

fn parse_evse_status(text: &str) -> Result<EvseStatus, HandlerError> {
    let status = EvseStatus::from(text);
    if !status.as_str().eq_ignore_ascii_case(text.trim()) {
        return Err(HandlerError::new(
            ErrorCode::TypeConstraintViolation,
            format!("Unknown EVSE status '{}'", text),
        ));
    }
    Ok(status)
}
