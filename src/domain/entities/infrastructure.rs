//! Charging pools, charging stations and EVSEs
//!
//! These are plain containers; additions go through the owning
//! [`ChargingStationOperator`](super::operator::ChargingStationOperator),
//! which enforces id uniqueness and runs the addition votes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::ids::{ChargingPoolId, ChargingStationId, EvseId};
use crate::domain::status::{
    ChargingPoolAdminStatus, ChargingPoolStatus, ChargingStationAdminStatus,
    ChargingStationStatus, EvseAdminStatus, EvseStatus, StatusSchedule, StatusUpdate,
    Timestamped,
};

/// A single charge point / connector group.
#[derive(Debug)]
pub struct Evse {
    id: EvseId,
    station_id: ChargingStationId,
    admin_status: RwLock<StatusSchedule<EvseAdminStatus>>,
    status: RwLock<StatusSchedule<EvseStatus>>,
}

impl Evse {
    pub fn new(id: EvseId, station_id: ChargingStationId) -> Self {
        Self {
            id,
            station_id,
            admin_status: RwLock::new(StatusSchedule::new()),
            status: RwLock::new(StatusSchedule::new()),
        }
    }

    pub fn id(&self) -> &EvseId {
        &self.id
    }

    pub fn station_id(&self) -> &ChargingStationId {
        &self.station_id
    }

    pub fn status(&self) -> Timestamped<EvseStatus> {
        self.status.read().current()
    }

    pub fn admin_status(&self) -> Timestamped<EvseAdminStatus> {
        self.admin_status.read().current()
    }

    pub fn status_history(&self) -> Vec<Timestamped<EvseStatus>> {
        self.status.read().history().copied().collect()
    }

    pub fn set_status(
        &self,
        status: EvseStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<EvseId, EvseStatus>> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }

    pub fn set_admin_status(
        &self,
        status: EvseAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<EvseId, EvseAdminStatus>> {
        let (old, new) = self.admin_status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }
}

/// A charging station holding EVSEs.
#[derive(Debug)]
pub struct ChargingStation {
    id: ChargingStationId,
    pool_id: ChargingPoolId,
    admin_status: RwLock<StatusSchedule<ChargingStationAdminStatus>>,
    status: RwLock<StatusSchedule<ChargingStationStatus>>,
    pub(crate) evses: DashMap<EvseId, Arc<Evse>>,
}

impl ChargingStation {
    pub fn new(id: ChargingStationId, pool_id: ChargingPoolId) -> Self {
        Self {
            id,
            pool_id,
            admin_status: RwLock::new(StatusSchedule::new()),
            status: RwLock::new(StatusSchedule::new()),
            evses: DashMap::new(),
        }
    }

    pub fn id(&self) -> &ChargingStationId {
        &self.id
    }

    pub fn pool_id(&self) -> &ChargingPoolId {
        &self.pool_id
    }

    pub fn status(&self) -> Timestamped<ChargingStationStatus> {
        self.status.read().current()
    }

    pub fn admin_status(&self) -> Timestamped<ChargingStationAdminStatus> {
        self.admin_status.read().current()
    }

    pub fn set_status(
        &self,
        status: ChargingStationStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<ChargingStationId, ChargingStationStatus>> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }

    pub fn set_admin_status(
        &self,
        status: ChargingStationAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<ChargingStationId, ChargingStationAdminStatus>> {
        let (old, new) = self.admin_status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }

    pub fn get_evse(&self, id: &EvseId) -> Option<Arc<Evse>> {
        self.evses.get(id).map(|e| e.value().clone())
    }

    pub fn evses(&self) -> Vec<Arc<Evse>> {
        let mut evses: Vec<_> = self.evses.iter().map(|e| e.value().clone()).collect();
        evses.sort_by(|a, b| a.id().cmp(b.id()));
        evses
    }

    pub fn evse_count(&self) -> usize {
        self.evses.len()
    }
}

/// A charging site holding charging stations.
#[derive(Debug)]
pub struct ChargingPool {
    id: ChargingPoolId,
    name: Option<String>,
    admin_status: RwLock<StatusSchedule<ChargingPoolAdminStatus>>,
    status: RwLock<StatusSchedule<ChargingPoolStatus>>,
    pub(crate) stations: DashMap<ChargingStationId, Arc<ChargingStation>>,
}

impl ChargingPool {
    pub fn new(id: ChargingPoolId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            admin_status: RwLock::new(StatusSchedule::new()),
            status: RwLock::new(StatusSchedule::new()),
            stations: DashMap::new(),
        }
    }

    pub fn id(&self) -> &ChargingPoolId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn status(&self) -> Timestamped<ChargingPoolStatus> {
        self.status.read().current()
    }

    pub fn admin_status(&self) -> Timestamped<ChargingPoolAdminStatus> {
        self.admin_status.read().current()
    }

    pub fn set_status(
        &self,
        status: ChargingPoolStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<ChargingPoolId, ChargingPoolStatus>> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }

    pub fn set_admin_status(
        &self,
        status: ChargingPoolAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<ChargingPoolId, ChargingPoolAdminStatus>> {
        let (old, new) = self.admin_status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }

    pub fn get_charging_station(&self, id: &ChargingStationId) -> Option<Arc<ChargingStation>> {
        self.stations.get(id).map(|s| s.value().clone())
    }

    pub fn charging_stations(&self) -> Vec<Arc<ChargingStation>> {
        let mut stations: Vec<_> = self.stations.iter().map(|s| s.value().clone()).collect();
        stations.sort_by(|a, b| a.id().cmp(b.id()));
        stations
    }

    pub fn evses(&self) -> Vec<Arc<Evse>> {
        self.charging_stations()
            .iter()
            .flat_map(|s| s.evses())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn evse_status_changes_produce_updates() {
        let evse = Evse::new(
            EvseId::parse("DE*GEF*E1*1").unwrap(),
            ChargingStationId::parse("DE*GEF*S1").unwrap(),
        );
        assert_eq!(evse.status().value, EvseStatus::Unspecified);

        let now = Utc::now();
        let update = evse.set_status(EvseStatus::Available, now).unwrap();
        assert_eq!(update.old_status.value, EvseStatus::Unspecified);
        assert_eq!(update.new_status.value, EvseStatus::Available);

        assert!(evse.set_status(EvseStatus::Available, now + Duration::seconds(1)).is_none());
        assert_eq!(evse.status_history().len(), 1);
    }
}
