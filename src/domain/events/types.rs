//! Roaming network events
//!
//! Facts published on the event bus after they happened: entity additions
//! and removals, status changes, tariff changes, status pushes and overlay
//! link changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{EventTrackingId, RoamingNetworkId};
use crate::domain::status::StatusUpdate;

/// Event types published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    OperatorAdded(EntityEvent),
    OperatorRemoved(EntityEvent),
    ProviderAdded(EntityEvent),
    ProviderRemoved(EntityEvent),
    ChargingPoolAdded(EntityEvent),
    ChargingPoolRemoved(EntityEvent),
    ChargingStationAdded(EntityEvent),
    EvseAdded(EntityEvent),
    AccountAdded(EntityEvent),
    RoamingNetworkStatusChanged(StatusChangedEvent),
    RoamingNetworkAdminStatusChanged(StatusChangedEvent),
    OperatorStatusChanged(StatusChangedEvent),
    OperatorAdminStatusChanged(StatusChangedEvent),
    ProviderStatusChanged(StatusChangedEvent),
    ProviderAdminStatusChanged(StatusChangedEvent),
    EvseStatusChanged(StatusChangedEvent),
    EvseAdminStatusChanged(StatusChangedEvent),
    TariffUpdated(TariffEvent),
    TariffDeleted(TariffEvent),
    StatusPushed(StatusPushedEvent),
    NodeConnected(NodeEvent),
    NodeDisconnected(NodeEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::OperatorAdded(_) => "operator_added",
            Event::OperatorRemoved(_) => "operator_removed",
            Event::ProviderAdded(_) => "provider_added",
            Event::ProviderRemoved(_) => "provider_removed",
            Event::ChargingPoolAdded(_) => "charging_pool_added",
            Event::ChargingPoolRemoved(_) => "charging_pool_removed",
            Event::ChargingStationAdded(_) => "charging_station_added",
            Event::EvseAdded(_) => "evse_added",
            Event::AccountAdded(_) => "account_added",
            Event::RoamingNetworkStatusChanged(_) => "roaming_network_status_changed",
            Event::RoamingNetworkAdminStatusChanged(_) => "roaming_network_admin_status_changed",
            Event::OperatorStatusChanged(_) => "operator_status_changed",
            Event::OperatorAdminStatusChanged(_) => "operator_admin_status_changed",
            Event::ProviderStatusChanged(_) => "provider_status_changed",
            Event::ProviderAdminStatusChanged(_) => "provider_admin_status_changed",
            Event::EvseStatusChanged(_) => "evse_status_changed",
            Event::EvseAdminStatusChanged(_) => "evse_admin_status_changed",
            Event::TariffUpdated(_) => "tariff_updated",
            Event::TariffDeleted(_) => "tariff_deleted",
            Event::StatusPushed(_) => "status_pushed",
            Event::NodeConnected(_) => "node_connected",
            Event::NodeDisconnected(_) => "node_disconnected",
        }
    }

    /// Id of the entity the event is about
    pub fn subject_id(&self) -> &str {
        match self {
            Event::OperatorAdded(e)
            | Event::OperatorRemoved(e)
            | Event::ProviderAdded(e)
            | Event::ProviderRemoved(e)
            | Event::ChargingPoolAdded(e)
            | Event::ChargingPoolRemoved(e)
            | Event::ChargingStationAdded(e)
            | Event::EvseAdded(e)
            | Event::AccountAdded(e) => &e.entity_id,
            Event::RoamingNetworkStatusChanged(e)
            | Event::RoamingNetworkAdminStatusChanged(e)
            | Event::OperatorStatusChanged(e)
            | Event::OperatorAdminStatusChanged(e)
            | Event::ProviderStatusChanged(e)
            | Event::ProviderAdminStatusChanged(e)
            | Event::EvseStatusChanged(e)
            | Event::EvseAdminStatusChanged(e) => &e.entity_id,
            Event::TariffUpdated(e) | Event::TariffDeleted(e) => &e.tariff_id,
            Event::StatusPushed(e) => e.roaming_network_id.as_str(),
            Event::NodeConnected(e) | Event::NodeDisconnected(e) => &e.node_id,
        }
    }

    /// Roaming network the event belongs to; `None` for node-wide events.
    pub fn roaming_network_id(&self) -> Option<&RoamingNetworkId> {
        match self {
            Event::OperatorAdded(e)
            | Event::OperatorRemoved(e)
            | Event::ProviderAdded(e)
            | Event::ProviderRemoved(e)
            | Event::ChargingPoolAdded(e)
            | Event::ChargingPoolRemoved(e)
            | Event::ChargingStationAdded(e)
            | Event::EvseAdded(e)
            | Event::AccountAdded(e) => Some(&e.roaming_network_id),
            Event::RoamingNetworkStatusChanged(e)
            | Event::RoamingNetworkAdminStatusChanged(e)
            | Event::OperatorStatusChanged(e)
            | Event::OperatorAdminStatusChanged(e)
            | Event::ProviderStatusChanged(e)
            | Event::ProviderAdminStatusChanged(e)
            | Event::EvseStatusChanged(e)
            | Event::EvseAdminStatusChanged(e) => Some(&e.roaming_network_id),
            Event::TariffUpdated(e) | Event::TariffDeleted(e) => Some(&e.roaming_network_id),
            Event::StatusPushed(e) => Some(&e.roaming_network_id),
            Event::NodeConnected(_) | Event::NodeDisconnected(_) => None,
        }
    }
}

/// An entity was added to or removed from its parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEvent {
    pub roaming_network_id: RoamingNetworkId,
    pub parent_id: String,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
}

impl EntityEvent {
    pub fn now(
        roaming_network_id: &RoamingNetworkId,
        parent_id: impl ToString,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            roaming_network_id: roaming_network_id.clone(),
            parent_id: parent_id.to_string(),
            entity_id: entity_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Status of an entity changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedEvent {
    pub roaming_network_id: RoamingNetworkId,
    pub entity_id: String,
    pub old_status: String,
    pub new_status: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusChangedEvent {
    pub fn from_update<Id: ToString, T: ToString>(
        roaming_network_id: &RoamingNetworkId,
        update: &StatusUpdate<Id, T>,
    ) -> Self {
        Self {
            roaming_network_id: roaming_network_id.clone(),
            entity_id: update.id.to_string(),
            old_status: update.old_status.value.to_string(),
            new_status: update.new_status.value.to_string(),
            timestamp: update.new_status.timestamp,
        }
    }
}

/// A tariff of an operator was updated or deleted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffEvent {
    pub roaming_network_id: RoamingNetworkId,
    pub operator_id: String,
    pub tariff_id: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// Status updates were pushed to the roaming partners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPushedEvent {
    pub roaming_network_id: RoamingNetworkId,
    pub event_tracking_id: EventTrackingId,
    pub updates: usize,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// An overlay peer connected or disconnected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEvent {
    pub node_id: String,
    pub remote_addr: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Event wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let network = RoamingNetworkId::parse("Prod").unwrap();
        let event = Event::OperatorAdded(EntityEvent::now(&network, "Prod", "DE*GEF"));
        assert_eq!(event.event_type(), "operator_added");
        assert_eq!(event.subject_id(), "DE*GEF");

        let json = serde_json::to_value(EventMessage::new(event)).unwrap();
        assert_eq!(json["type"], "OperatorAdded");
        assert_eq!(json["data"]["entity_id"], "DE*GEF");
    }
}
