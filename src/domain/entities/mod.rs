//! Roaming network aggregates

pub mod infrastructure;
pub mod operator;
pub mod partner;
pub mod provider;
pub mod roaming_network;
pub mod tariff;
pub mod voting;

pub use infrastructure::{ChargingPool, ChargingStation, Evse};
pub use operator::ChargingStationOperator;
pub use partner::RoamingPartner;
pub use provider::{EMobilityAccount, EMobilityProvider};
pub use roaming_network::RoamingNetwork;
pub use tariff::ChargingTariff;
pub use voting::{Vote, VotingNotificator};

use crate::application::events::SharedEventBus;
use crate::domain::events::Event;
use crate::domain::ids::RoamingNetworkId;

/// What every aggregate below a roaming network needs to publish events.
#[derive(Clone)]
pub(crate) struct EntityContext {
    pub(crate) roaming_network_id: RoamingNetworkId,
    pub(crate) event_bus: SharedEventBus,
}

impl EntityContext {
    pub(crate) fn new(roaming_network_id: RoamingNetworkId, event_bus: SharedEventBus) -> Self {
        Self {
            roaming_network_id,
            event_bus,
        }
    }

    pub(crate) fn publish(&self, event: Event) {
        self.event_bus.publish(event);
    }
}
