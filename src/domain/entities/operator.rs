//! Charging station operator aggregate

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::infrastructure::{ChargingPool, ChargingStation, Evse};
use super::tariff::ChargingTariff;
use super::voting::{Vote, VotingNotificator};
use super::EntityContext;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::events::{EntityEvent, Event, StatusChangedEvent, TariffEvent};
use crate::domain::ids::{
    ChargingPoolId, ChargingStationId, ChargingStationOperatorId, ChargingTariffId,
    EventTrackingId, EvseId, RoamingNetworkId,
};
use crate::domain::results::{DeleteTariffResult, UpdateTariffResult};
use crate::domain::status::{
    EvseAdminStatus, EvseAdminStatusUpdate, EvseStatus, EvseStatusUpdate, OperatorAdminStatus,
    OperatorAdminStatusUpdate, OperatorStatus, OperatorStatusUpdate, StatusSchedule,
    StatusUpdate, Timestamped,
};

/// A charging station operator (CSO) and its infrastructure.
///
/// Pools, stations and EVSEs are added through the operator so their ids
/// can be checked against the operator id and kept unique operator-wide.
pub struct ChargingStationOperator {
    id: ChargingStationOperatorId,
    name: String,
    ctx: EntityContext,
    admin_status: RwLock<StatusSchedule<OperatorAdminStatus>>,
    status: RwLock<StatusSchedule<OperatorStatus>>,
    pools: DashMap<ChargingPoolId, Arc<ChargingPool>>,
    station_index: DashMap<ChargingStationId, ChargingPoolId>,
    evse_index: DashMap<EvseId, ChargingStationId>,
    /// Held while the indexes and the pool/station maps change together.
    structure: Mutex<()>,
    tariffs: DashMap<ChargingTariffId, ChargingTariff>,
    pub pool_addition: VotingNotificator<ChargingPool>,
    pub station_addition: VotingNotificator<ChargingStation>,
    pub evse_addition: VotingNotificator<Evse>,
}

impl ChargingStationOperator {
    pub(crate) fn new(id: ChargingStationOperatorId, name: String, ctx: EntityContext) -> Self {
        Self {
            id,
            name,
            ctx,
            admin_status: RwLock::new(StatusSchedule::new()),
            status: RwLock::new(StatusSchedule::new()),
            pools: DashMap::new(),
            station_index: DashMap::new(),
            evse_index: DashMap::new(),
            structure: Mutex::new(()),
            tariffs: DashMap::new(),
            pool_addition: VotingNotificator::new(),
            station_addition: VotingNotificator::new(),
            evse_addition: VotingNotificator::new(),
        }
    }

    pub fn id(&self) -> &ChargingStationOperatorId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roaming_network_id(&self) -> &RoamingNetworkId {
        &self.ctx.roaming_network_id
    }

    pub fn admin_status(&self) -> Timestamped<OperatorAdminStatus> {
        self.admin_status.read().current()
    }

    pub fn status(&self) -> Timestamped<OperatorStatus> {
        self.status.read().current()
    }

    pub fn set_admin_status(
        &self,
        status: OperatorAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<OperatorAdminStatusUpdate> {
        let (old, new) = self.admin_status.write().insert(status, timestamp)?;
        let update = StatusUpdate::new(self.id.clone(), old, new);
        self.ctx.publish(Event::OperatorAdminStatusChanged(
            StatusChangedEvent::from_update(&self.ctx.roaming_network_id, &update),
        ));
        Some(update)
    }

    pub fn set_status(
        &self,
        status: OperatorStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<OperatorStatusUpdate> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        let update = StatusUpdate::new(self.id.clone(), old, new);
        self.ctx.publish(Event::OperatorStatusChanged(StatusChangedEvent::from_update(
            &self.ctx.roaming_network_id,
            &update,
        )));
        Some(update)
    }

    // ---- charging pools -------------------------------------------------

    pub fn create_charging_pool(
        &self,
        id: ChargingPoolId,
        name: Option<String>,
    ) -> DomainResult<Arc<ChargingPool>> {
        id.ensure_operator(&self.id)?;
        if self.pools.contains_key(&id) {
            return Err(DomainError::conflict("ChargingPool", &id));
        }

        let pool = ChargingPool::new(id.clone(), name);
        if let Vote::Veto(reason) = self.pool_addition.vote(&pool) {
            return Err(DomainError::Vetoed {
                entity: "ChargingPool",
                id: id.to_string(),
                reason,
            });
        }

        let pool = Arc::new(pool);
        match self.pools.entry(id.clone()) {
            Entry::Occupied(_) => return Err(DomainError::conflict("ChargingPool", &id)),
            Entry::Vacant(slot) => {
                slot.insert(pool.clone());
            }
        }

        info!(operator_id = %self.id, pool_id = %id, "Charging pool added");
        self.ctx.publish(Event::ChargingPoolAdded(EntityEvent::now(
            &self.ctx.roaming_network_id,
            &self.id,
            &id,
        )));
        Ok(pool)
    }

    pub fn get_charging_pool(&self, id: &ChargingPoolId) -> Option<Arc<ChargingPool>> {
        self.pools.get(id).map(|p| p.value().clone())
    }

    pub fn contains_charging_pool(&self, id: &ChargingPoolId) -> bool {
        self.pools.contains_key(id)
    }

    pub fn charging_pools(&self) -> Vec<Arc<ChargingPool>> {
        let mut pools: Vec<_> = self.pools.iter().map(|p| p.value().clone()).collect();
        pools.sort_by(|a, b| a.id().cmp(b.id()));
        pools
    }

    /// Remove a pool together with its stations and EVSEs.
    pub fn remove_charging_pool(&self, id: &ChargingPoolId) -> Option<Arc<ChargingPool>> {
        let pool = {
            let _structure = self.structure.lock();
            let (_, pool) = self.pools.remove(id)?;
            for station in pool.charging_stations() {
                self.station_index.remove(station.id());
                for evse in station.evses() {
                    self.evse_index.remove(evse.id());
                }
            }
            pool
        };

        info!(operator_id = %self.id, pool_id = %id, "Charging pool removed");
        self.ctx.publish(Event::ChargingPoolRemoved(EntityEvent::now(
            &self.ctx.roaming_network_id,
            &self.id,
            id,
        )));
        Some(pool)
    }

    // ---- charging stations ----------------------------------------------

    pub fn create_charging_station(
        &self,
        pool_id: &ChargingPoolId,
        id: ChargingStationId,
    ) -> DomainResult<Arc<ChargingStation>> {
        id.ensure_operator(&self.id)?;
        let pool = self
            .get_charging_pool(pool_id)
            .ok_or_else(|| DomainError::not_found("ChargingPool", pool_id))?;
        if self.station_index.contains_key(&id) {
            return Err(DomainError::conflict("ChargingStation", &id));
        }

        let station = ChargingStation::new(id.clone(), pool_id.clone());
        if let Vote::Veto(reason) = self.station_addition.vote(&station) {
            return Err(DomainError::Vetoed {
                entity: "ChargingStation",
                id: id.to_string(),
                reason,
            });
        }

        let station = Arc::new(station);
        {
            let _structure = self.structure.lock();
            if !self.pools.contains_key(pool_id) {
                return Err(DomainError::not_found("ChargingPool", pool_id));
            }
            match self.station_index.entry(id.clone()) {
                Entry::Occupied(_) => return Err(DomainError::conflict("ChargingStation", &id)),
                Entry::Vacant(slot) => {
                    slot.insert(pool_id.clone());
                }
            }
            pool.stations.insert(id.clone(), station.clone());
        }

        debug!(operator_id = %self.id, station_id = %id, "Charging station added");
        self.ctx.publish(Event::ChargingStationAdded(EntityEvent::now(
            &self.ctx.roaming_network_id,
            pool_id,
            &id,
        )));
        Ok(station)
    }

    pub fn get_charging_station(&self, id: &ChargingStationId) -> Option<Arc<ChargingStation>> {
        let pool_id = self.station_index.get(id)?.value().clone();
        self.get_charging_pool(&pool_id)?.get_charging_station(id)
    }

    pub fn charging_stations(&self) -> Vec<Arc<ChargingStation>> {
        self.charging_pools()
            .iter()
            .flat_map(|p| p.charging_stations())
            .collect()
    }

    // ---- EVSEs ----------------------------------------------------------

    pub fn create_evse(
        &self,
        station_id: &ChargingStationId,
        id: EvseId,
    ) -> DomainResult<Arc<Evse>> {
        id.ensure_operator(&self.id)?;
        let station = self
            .get_charging_station(station_id)
            .ok_or_else(|| DomainError::not_found("ChargingStation", station_id))?;
        if self.evse_index.contains_key(&id) {
            return Err(DomainError::conflict("EVSE", &id));
        }

        let evse = Evse::new(id.clone(), station_id.clone());
        if let Vote::Veto(reason) = self.evse_addition.vote(&evse) {
            return Err(DomainError::Vetoed {
                entity: "EVSE",
                id: id.to_string(),
                reason,
            });
        }

        let evse = Arc::new(evse);
        {
            let _structure = self.structure.lock();
            if !self.station_index.contains_key(station_id) {
                return Err(DomainError::not_found("ChargingStation", station_id));
            }
            match self.evse_index.entry(id.clone()) {
                Entry::Occupied(_) => return Err(DomainError::conflict("EVSE", &id)),
                Entry::Vacant(slot) => {
                    slot.insert(station_id.clone());
                }
            }
            station.evses.insert(id.clone(), evse.clone());
        }

        debug!(operator_id = %self.id, evse_id = %id, "EVSE added");
        self.ctx.publish(Event::EvseAdded(EntityEvent::now(
            &self.ctx.roaming_network_id,
            station_id,
            &id,
        )));
        Ok(evse)
    }

    pub fn get_evse(&self, id: &EvseId) -> Option<Arc<Evse>> {
        let station_id = self.evse_index.get(id)?.value().clone();
        self.get_charging_station(&station_id)?.get_evse(id)
    }

    pub fn contains_evse(&self, id: &EvseId) -> bool {
        self.evse_index.contains_key(id)
    }

    pub fn evses(&self) -> Vec<Arc<Evse>> {
        let mut evses: Vec<_> = self
            .charging_pools()
            .iter()
            .flat_map(|p| p.evses())
            .collect();
        evses.sort_by(|a, b| a.id().cmp(b.id()));
        evses
    }

    pub fn evse_count(&self) -> usize {
        self.evse_index.len()
    }

    /// Record a new EVSE status. `Ok(None)` when the status did not change.
    pub fn set_evse_status(
        &self,
        id: &EvseId,
        status: EvseStatus,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<Option<EvseStatusUpdate>> {
        let evse = self
            .get_evse(id)
            .ok_or_else(|| DomainError::not_found("EVSE", id))?;
        let update = evse.set_status(status, timestamp);
        if let Some(update) = &update {
            self.ctx.publish(Event::EvseStatusChanged(StatusChangedEvent::from_update(
                &self.ctx.roaming_network_id,
                update,
            )));
        }
        Ok(update)
    }

    pub fn set_evse_admin_status(
        &self,
        id: &EvseId,
        status: EvseAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<Option<EvseAdminStatusUpdate>> {
        let evse = self
            .get_evse(id)
            .ok_or_else(|| DomainError::not_found("EVSE", id))?;
        let update = evse.set_admin_status(status, timestamp);
        if let Some(update) = &update {
            self.ctx.publish(Event::EvseAdminStatusChanged(
                StatusChangedEvent::from_update(&self.ctx.roaming_network_id, update),
            ));
        }
        Ok(update)
    }

    // ---- tariffs --------------------------------------------------------

    /// Add or replace a tariff.
    pub fn update_tariff(
        &self,
        tariff: ChargingTariff,
        event_tracking_id: EventTrackingId,
    ) -> UpdateTariffResult {
        let started = Instant::now();
        let sender = self.id.to_string();
        let tariff_id = tariff.id.clone();

        if tariff.operator_id != self.id {
            warn!(operator_id = %self.id, tariff_id = %tariff_id, "Tariff of a foreign operator rejected");
            return UpdateTariffResult::rejected(
                event_tracking_id,
                tariff_id,
                sender,
                format!("Tariff belongs to operator '{}'", tariff.operator_id),
            );
        }
        if let Err(e) = tariff.validate() {
            return UpdateTariffResult::rejected(event_tracking_id, tariff_id, sender, e.to_string());
        }

        let result = match self.tariffs.entry(tariff_id.clone()) {
            Entry::Occupied(mut existing) => {
                if *existing.get() == tariff {
                    UpdateTariffResult::no_operation(event_tracking_id, tariff_id.clone(), sender)
                } else {
                    existing.insert(tariff);
                    UpdateTariffResult::updated(event_tracking_id, tariff_id.clone(), sender)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(tariff);
                UpdateTariffResult::added(event_tracking_id, tariff_id.clone(), sender)
            }
        };

        info!(operator_id = %self.id, tariff_id = %tariff_id, result = %result.result, "Tariff updated");
        self.publish_tariff_event(true, &tariff_id, result.result.to_string());
        result.with_runtime(started.elapsed())
    }

    pub fn delete_tariff(
        &self,
        id: &ChargingTariffId,
        event_tracking_id: EventTrackingId,
    ) -> DeleteTariffResult {
        let started = Instant::now();
        let result = match self.tariffs.remove(id) {
            Some(_) => {
                DeleteTariffResult::success(event_tracking_id, id.clone(), self.id.to_string())
            }
            None => {
                DeleteTariffResult::not_found(event_tracking_id, id.clone(), self.id.to_string())
            }
        };

        info!(operator_id = %self.id, tariff_id = %id, result = %result.result, "Tariff deleted");
        self.publish_tariff_event(false, id, result.result.to_string());
        result.with_runtime(started.elapsed())
    }

    pub fn get_tariff(&self, id: &ChargingTariffId) -> Option<ChargingTariff> {
        self.tariffs.get(id).map(|t| t.value().clone())
    }

    pub fn tariffs(&self) -> Vec<ChargingTariff> {
        let mut tariffs: Vec<_> = self.tariffs.iter().map(|t| t.value().clone()).collect();
        tariffs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        tariffs
    }

    fn publish_tariff_event(&self, updated: bool, tariff_id: &ChargingTariffId, result: String) {
        let event = TariffEvent {
            roaming_network_id: self.ctx.roaming_network_id.clone(),
            operator_id: self.id.to_string(),
            tariff_id: tariff_id.to_string(),
            result,
            timestamp: Utc::now(),
        };
        self.ctx.publish(if updated {
            Event::TariffUpdated(event)
        } else {
            Event::TariffDeleted(event)
        });
    }
}

impl std::fmt::Debug for ChargingStationOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargingStationOperator")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pools", &self.pools.len())
            .field("evses", &self.evse_index.len())
            .field("tariffs", &self.tariffs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::domain::error::IdError;
    use crate::domain::results::{DeleteTariffResultType, UpdateTariffResultType};
    use rust_decimal::Decimal;

    fn operator() -> ChargingStationOperator {
        ChargingStationOperator::new(
            ChargingStationOperatorId::parse("DE*GEF").unwrap(),
            "GraphDefined".into(),
            EntityContext::new(RoamingNetworkId::parse("Test").unwrap(), create_event_bus()),
        )
    }

    fn build(op: &ChargingStationOperator) -> Arc<Evse> {
        let pool = op
            .create_charging_pool(ChargingPoolId::parse("DE*GEF*P1").unwrap(), None)
            .unwrap();
        let station = op
            .create_charging_station(pool.id(), ChargingStationId::parse("DE*GEF*S1").unwrap())
            .unwrap();
        op.create_evse(station.id(), EvseId::parse("DE*GEF*E1*1").unwrap())
            .unwrap()
    }

    #[test]
    fn builds_infrastructure_tree() {
        let op = operator();
        let evse = build(&op);

        assert_eq!(op.charging_pools().len(), 1);
        assert_eq!(op.charging_stations().len(), 1);
        assert_eq!(op.evse_count(), 1);
        assert!(op.contains_evse(evse.id()));
        assert_eq!(op.get_evse(evse.id()).unwrap().id(), evse.id());
    }

    #[test]
    fn rejects_foreign_and_duplicate_ids() {
        let op = operator();
        build(&op);

        let foreign = op.create_charging_pool(ChargingPoolId::parse("DE*XYZ*P1").unwrap(), None);
        assert!(matches!(
            foreign,
            Err(DomainError::Id(IdError::ForeignOperator { .. }))
        ));

        let duplicate = op.create_evse(
            &ChargingStationId::parse("DE*GEF*S1").unwrap(),
            EvseId::parse("DE*GEF*E1*1").unwrap(),
        );
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));

        let orphan = op.create_charging_station(
            &ChargingPoolId::parse("DE*GEF*P9").unwrap(),
            ChargingStationId::parse("DE*GEF*S9").unwrap(),
        );
        assert!(matches!(orphan, Err(DomainError::NotFound { .. })));
    }

    #[test]
    fn vetoed_pool_is_not_added() {
        let op = operator();
        op.pool_addition.on_vote(|pool: &ChargingPool| {
            if pool.id().suffix() == "BLOCKED" {
                Vote::veto("blocked site")
            } else {
                Vote::Accept
            }
        });

        let id = ChargingPoolId::parse("DE*GEF*PBLOCKED").unwrap();
        let err = op.create_charging_pool(id.clone(), None).unwrap_err();
        assert!(matches!(err, DomainError::Vetoed { reason, .. } if reason == "blocked site"));
        assert!(!op.contains_charging_pool(&id));
    }

    #[test]
    fn removing_a_pool_drops_its_evses() {
        let op = operator();
        let evse = build(&op);
        let mut events = op.ctx.event_bus.subscribe();

        op.remove_charging_pool(&ChargingPoolId::parse("DE*GEF*P1").unwrap())
            .unwrap();
        assert!(op.get_evse(evse.id()).is_none());
        assert_eq!(op.evse_count(), 0);

        let msg = events.try_recv().unwrap();
        assert_eq!(msg.event.event_type(), "charging_pool_removed");
        assert_eq!(msg.event.subject_id(), "DE*GEF*P1");
    }

    #[test]
    fn evse_added_while_its_pool_is_removed_leaves_no_index_entry() {
        let op = Arc::new(operator());
        build(&op);

        // The pool disappears between the station lookup and the insert.
        let remover = op.clone();
        op.evse_addition.on_vote(move |_: &Evse| {
            remover.remove_charging_pool(&ChargingPoolId::parse("DE*GEF*P1").unwrap());
            Vote::Accept
        });

        let late_id = EvseId::parse("DE*GEF*E1*2").unwrap();
        let late = op.create_evse(&ChargingStationId::parse("DE*GEF*S1").unwrap(), late_id.clone());
        assert!(matches!(late, Err(DomainError::NotFound { .. })));
        assert!(!op.contains_evse(&late_id));
        assert_eq!(op.evse_count(), 0);
        assert!(op.evses().is_empty());
    }

    #[tokio::test]
    async fn evse_status_change_is_published() {
        let op = operator();
        let evse = build(&op);
        let mut events = op.ctx.event_bus.subscribe();

        let update = op
            .set_evse_status(evse.id(), EvseStatus::Charging, Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(update.new_status.value, EvseStatus::Charging);

        let msg = events.try_recv().unwrap();
        assert_eq!(msg.event.event_type(), "evse_status_changed");
        assert_eq!(msg.event.subject_id(), "DE*GEF*E1*1");

        let missing = op.set_evse_status(
            &EvseId::parse("DE*GEF*E9*9").unwrap(),
            EvseStatus::Available,
            Utc::now(),
        );
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));
    }

    #[test]
    fn tariff_lifecycle() {
        let op = operator();
        let id = ChargingTariffId::parse("AC").unwrap();
        let tariff = ChargingTariff::new(id.clone(), op.id().clone(), "EUR")
            .with_energy_price(Decimal::new(39, 2));

        let added = op.update_tariff(tariff.clone(), EventTrackingId::new());
        assert_eq!(added.result, UpdateTariffResultType::Added);
        assert!(added.runtime.is_some());

        let same = op.update_tariff(tariff.clone(), EventTrackingId::new());
        assert_eq!(same.result, UpdateTariffResultType::NoOperation);

        let changed = op.update_tariff(
            tariff.with_energy_price(Decimal::new(49, 2)),
            EventTrackingId::new(),
        );
        assert_eq!(changed.result, UpdateTariffResultType::Updated);
        assert_eq!(op.get_tariff(&id).unwrap().price_per_kwh, Decimal::new(49, 2));

        let deleted = op.delete_tariff(&id, EventTrackingId::new());
        assert_eq!(deleted.result, DeleteTariffResultType::Success);
        let again = op.delete_tariff(&id, EventTrackingId::new());
        assert_eq!(again.result, DeleteTariffResultType::NotFound);
    }

    #[test]
    fn foreign_tariff_is_rejected() {
        let op = operator();
        let tariff = ChargingTariff::new(
            ChargingTariffId::parse("AC").unwrap(),
            ChargingStationOperatorId::parse("DE*XYZ").unwrap(),
            "EUR",
        );
        let result = op.update_tariff(tariff, EventTrackingId::new());
        assert_eq!(result.result, UpdateTariffResultType::Rejected);
        assert!(op.tariffs().is_empty());
    }
}
