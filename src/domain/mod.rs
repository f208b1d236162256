//! Roaming network domain model

pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod results;
pub mod status;

pub use entities::{
    ChargingPool, ChargingStation, ChargingStationOperator, ChargingTariff, EMobilityAccount,
    EMobilityProvider, Evse, RoamingNetwork, RoamingPartner, Vote, VotingNotificator,
};
pub use error::{DomainError, DomainResult, IdError};
