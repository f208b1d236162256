//! Status types and status value objects

pub mod schedule;
pub mod timestamped;
pub mod types;
pub mod update;

pub use schedule::StatusSchedule;
pub use timestamped::Timestamped;
pub use types::*;
pub use update::StatusUpdate;

use crate::domain::ids::{
    ChargingStationOperatorId, EMobilityProviderId, EvseId, RoamingNetworkId,
};

pub type EvseStatusUpdate = StatusUpdate<EvseId, EvseStatus>;
pub type EvseAdminStatusUpdate = StatusUpdate<EvseId, EvseAdminStatus>;
pub type OperatorStatusUpdate = StatusUpdate<ChargingStationOperatorId, OperatorStatus>;
pub type OperatorAdminStatusUpdate = StatusUpdate<ChargingStationOperatorId, OperatorAdminStatus>;
pub type ProviderStatusUpdate = StatusUpdate<EMobilityProviderId, ProviderStatus>;
pub type RoamingNetworkStatusUpdate = StatusUpdate<RoamingNetworkId, RoamingNetworkStatus>;
pub type RoamingNetworkAdminStatusUpdate =
    StatusUpdate<RoamingNetworkId, RoamingNetworkAdminStatus>;
