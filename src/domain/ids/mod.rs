//! Identifiers of the roaming network model

pub mod account_id;
pub mod country;
pub mod infrastructure_id;
pub mod operator_id;
pub mod provider_id;
pub mod simple;

pub use account_id::EMobilityAccountId;
pub use country::Country;
pub use infrastructure_id::{ChargingPoolId, ChargingStationId, EvseId};
pub use operator_id::{ChargingStationOperatorId, OperatorIdFormat};
pub use provider_id::{EMobilityProviderId, ProviderIdFormat};
pub use simple::{ChargingTariffId, EventTrackingId, RoamingNetworkId};
