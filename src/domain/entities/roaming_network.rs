//! Roaming network aggregate
//!
//! The root of the entity model: operators and providers live in concurrent
//! maps, EVSE status changes are recorded here and pushed to all registered
//! roaming partners.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::infrastructure::Evse;
use super::operator::ChargingStationOperator;
use super::partner::RoamingPartner;
use super::provider::EMobilityProvider;
use super::voting::{Vote, VotingNotificator};
use super::EntityContext;
use crate::application::events::SharedEventBus;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::events::{EntityEvent, Event, StatusChangedEvent, StatusPushedEvent};
use crate::domain::ids::{
    ChargingStationOperatorId, EMobilityProviderId, EventTrackingId, EvseId, RoamingNetworkId,
};
use crate::domain::results::PushStatusResult;
use crate::domain::status::{
    EvseAdminStatusUpdate, EvseStatus, EvseStatusUpdate, RoamingNetworkAdminStatus,
    RoamingNetworkAdminStatusUpdate, RoamingNetworkStatus, RoamingNetworkStatusUpdate,
    StatusSchedule, StatusUpdate, Timestamped,
};

pub struct RoamingNetwork {
    id: RoamingNetworkId,
    name: String,
    description: Option<String>,
    ctx: EntityContext,
    admin_status: RwLock<StatusSchedule<RoamingNetworkAdminStatus>>,
    status: RwLock<StatusSchedule<RoamingNetworkStatus>>,
    operators: DashMap<ChargingStationOperatorId, Arc<ChargingStationOperator>>,
    providers: DashMap<EMobilityProviderId, Arc<EMobilityProvider>>,
    partners: DashMap<String, Arc<dyn RoamingPartner>>,
    pub operator_addition: VotingNotificator<ChargingStationOperator>,
    pub provider_addition: VotingNotificator<EMobilityProvider>,
}

impl RoamingNetwork {
    pub fn new(id: RoamingNetworkId, name: impl Into<String>, event_bus: SharedEventBus) -> Self {
        Self {
            ctx: EntityContext::new(id.clone(), event_bus),
            id,
            name: name.into(),
            description: None,
            admin_status: RwLock::new(StatusSchedule::new()),
            status: RwLock::new(StatusSchedule::new()),
            operators: DashMap::new(),
            providers: DashMap::new(),
            partners: DashMap::new(),
            operator_addition: VotingNotificator::new(),
            provider_addition: VotingNotificator::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &RoamingNetworkId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.ctx.event_bus
    }

    // ---- status -----------------------------------------------------------

    pub fn admin_status(&self) -> Timestamped<RoamingNetworkAdminStatus> {
        self.admin_status.read().current()
    }

    pub fn status(&self) -> Timestamped<RoamingNetworkStatus> {
        self.status.read().current()
    }

    pub fn set_admin_status(
        &self,
        status: RoamingNetworkAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<RoamingNetworkAdminStatusUpdate> {
        let (old, new) = self.admin_status.write().insert(status, timestamp)?;
        let update = StatusUpdate::new(self.id.clone(), old, new);
        info!(roaming_network_id = %self.id, "Admin status: {}", update);
        self.ctx.publish(Event::RoamingNetworkAdminStatusChanged(
            StatusChangedEvent::from_update(&self.id, &update),
        ));
        Some(update)
    }

    pub fn set_status(
        &self,
        status: RoamingNetworkStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<RoamingNetworkStatusUpdate> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        let update = StatusUpdate::new(self.id.clone(), old, new);
        info!(roaming_network_id = %self.id, "Status: {}", update);
        self.ctx.publish(Event::RoamingNetworkStatusChanged(
            StatusChangedEvent::from_update(&self.id, &update),
        ));
        Some(update)
    }

    fn is_admin_down(&self) -> bool {
        matches!(
            self.admin_status().value,
            RoamingNetworkAdminStatus::OutOfService | RoamingNetworkAdminStatus::Deleted
        )
    }

    // ---- charging station operators -----------------------------------------

    pub fn create_charging_station_operator(
        &self,
        id: ChargingStationOperatorId,
        name: impl Into<String>,
    ) -> DomainResult<Arc<ChargingStationOperator>> {
        if self.operators.contains_key(&id) {
            return Err(DomainError::conflict("ChargingStationOperator", &id));
        }

        let operator = ChargingStationOperator::new(id.clone(), name.into(), self.ctx.clone());
        if let Vote::Veto(reason) = self.operator_addition.vote(&operator) {
            return Err(DomainError::Vetoed {
                entity: "ChargingStationOperator",
                id: id.to_string(),
                reason,
            });
        }

        let operator = Arc::new(operator);
        match self.operators.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(DomainError::conflict("ChargingStationOperator", &id))
            }
            Entry::Vacant(slot) => {
                slot.insert(operator.clone());
            }
        }

        info!(roaming_network_id = %self.id, operator_id = %id, "Charging station operator added");
        self.ctx.publish(Event::OperatorAdded(EntityEvent::now(&self.id, &self.id, &id)));
        Ok(operator)
    }

    pub fn get_charging_station_operator(
        &self,
        id: &ChargingStationOperatorId,
    ) -> Option<Arc<ChargingStationOperator>> {
        self.operators.get(id).map(|o| o.value().clone())
    }

    pub fn contains_charging_station_operator(&self, id: &ChargingStationOperatorId) -> bool {
        self.operators.contains_key(id)
    }

    pub fn remove_charging_station_operator(
        &self,
        id: &ChargingStationOperatorId,
    ) -> Option<Arc<ChargingStationOperator>> {
        let (_, operator) = self.operators.remove(id)?;
        info!(roaming_network_id = %self.id, operator_id = %id, "Charging station operator removed");
        self.ctx.publish(Event::OperatorRemoved(EntityEvent::now(&self.id, &self.id, id)));
        Some(operator)
    }

    pub fn charging_station_operators(&self) -> Vec<Arc<ChargingStationOperator>> {
        let mut operators: Vec<_> = self.operators.iter().map(|o| o.value().clone()).collect();
        operators.sort_by(|a, b| a.id().cmp(b.id()));
        operators
    }

    // ---- e-mobility providers -----------------------------------------------

    pub fn create_emobility_provider(
        &self,
        id: EMobilityProviderId,
        name: impl Into<String>,
    ) -> DomainResult<Arc<EMobilityProvider>> {
        if self.providers.contains_key(&id) {
            return Err(DomainError::conflict("EMobilityProvider", &id));
        }

        let provider = EMobilityProvider::new(id.clone(), name.into(), self.ctx.clone());
        if let Vote::Veto(reason) = self.provider_addition.vote(&provider) {
            return Err(DomainError::Vetoed {
                entity: "EMobilityProvider",
                id: id.to_string(),
                reason,
            });
        }

        let provider = Arc::new(provider);
        match self.providers.entry(id.clone()) {
            Entry::Occupied(_) => return Err(DomainError::conflict("EMobilityProvider", &id)),
            Entry::Vacant(slot) => {
                slot.insert(provider.clone());
            }
        }

        info!(roaming_network_id = %self.id, provider_id = %id, "E-mobility provider added");
        self.ctx.publish(Event::ProviderAdded(EntityEvent::now(&self.id, &self.id, &id)));
        Ok(provider)
    }

    pub fn get_emobility_provider(&self, id: &EMobilityProviderId) -> Option<Arc<EMobilityProvider>> {
        self.providers.get(id).map(|p| p.value().clone())
    }

    pub fn contains_emobility_provider(&self, id: &EMobilityProviderId) -> bool {
        self.providers.contains_key(id)
    }

    pub fn remove_emobility_provider(
        &self,
        id: &EMobilityProviderId,
    ) -> Option<Arc<EMobilityProvider>> {
        let (_, provider) = self.providers.remove(id)?;
        info!(roaming_network_id = %self.id, provider_id = %id, "E-mobility provider removed");
        self.ctx.publish(Event::ProviderRemoved(EntityEvent::now(&self.id, &self.id, id)));
        Some(provider)
    }

    pub fn emobility_providers(&self) -> Vec<Arc<EMobilityProvider>> {
        let mut providers: Vec<_> = self.providers.iter().map(|p| p.value().clone()).collect();
        providers.sort_by(|a, b| a.id().cmp(b.id()));
        providers
    }

    // ---- EVSEs --------------------------------------------------------------

    /// Find an EVSE through the operator encoded in its id.
    pub fn get_evse(&self, id: &EvseId) -> Option<Arc<Evse>> {
        self.get_charging_station_operator(id.operator_id())?
            .get_evse(id)
    }

    pub fn contains_evse(&self, id: &EvseId) -> bool {
        self.get_evse(id).is_some()
    }

    pub fn evses(&self) -> Vec<Arc<Evse>> {
        self.charging_station_operators()
            .iter()
            .flat_map(|o| o.evses())
            .collect()
    }

    pub fn set_evse_status(
        &self,
        id: &EvseId,
        status: EvseStatus,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<Option<EvseStatusUpdate>> {
        let operator = self
            .get_charging_station_operator(id.operator_id())
            .ok_or_else(|| DomainError::not_found("ChargingStationOperator", id.operator_id()))?;
        operator.set_evse_status(id, status, timestamp)
    }

    // ---- roaming partners ---------------------------------------------------

    pub fn register_roaming_partner(&self, partner: Arc<dyn RoamingPartner>) -> DomainResult<()> {
        let id = partner.id().to_string();
        match self.partners.entry(id.clone()) {
            Entry::Occupied(_) => Err(DomainError::conflict("RoamingPartner", id)),
            Entry::Vacant(slot) => {
                slot.insert(partner);
                info!(roaming_network_id = %self.id, partner_id = id.as_str(), "Roaming partner registered");
                Ok(())
            }
        }
    }

    pub fn unregister_roaming_partner(&self, id: &str) -> Option<Arc<dyn RoamingPartner>> {
        self.partners.remove(id).map(|(_, partner)| partner)
    }

    pub fn roaming_partners(&self) -> Vec<Arc<dyn RoamingPartner>> {
        let mut partners: Vec<_> = self.partners.iter().map(|p| p.value().clone()).collect();
        partners.sort_by(|a, b| a.id().cmp(b.id()));
        partners
    }

    /// Forward EVSE status updates to every roaming partner and aggregate
    /// their answers.
    pub async fn push_evse_status(
        &self,
        updates: &[EvseStatusUpdate],
        event_tracking_id: Option<EventTrackingId>,
    ) -> PushStatusResult {
        let tracking = event_tracking_id.unwrap_or_default();
        self.fan_out(tracking, updates.len(), move |partner| async move {
            partner.push_evse_status(tracking, updates).await
        })
        .await
    }

    pub async fn push_evse_admin_status(
        &self,
        updates: &[EvseAdminStatusUpdate],
        event_tracking_id: Option<EventTrackingId>,
    ) -> PushStatusResult {
        let tracking = event_tracking_id.unwrap_or_default();
        self.fan_out(tracking, updates.len(), move |partner| async move {
            partner.push_evse_admin_status(tracking, updates).await
        })
        .await
    }

    async fn fan_out<F, Fut>(
        &self,
        tracking: EventTrackingId,
        update_count: usize,
        push: F,
    ) -> PushStatusResult
    where
        F: Fn(Arc<dyn RoamingPartner>) -> Fut,
        Fut: Future<Output = PushStatusResult>,
    {
        let started = Instant::now();
        let sender = self.id.to_string();

        if self.is_admin_down() {
            warn!(roaming_network_id = %self.id, "Status push refused, roaming network is admin down");
            return PushStatusResult::admin_down(tracking, sender);
        }
        if update_count == 0 {
            return PushStatusResult::no_operation(tracking, sender);
        }

        let partners = self.roaming_partners();
        debug!(
            roaming_network_id = %self.id,
            updates = update_count,
            partners = partners.len(),
            "Pushing status updates"
        );

        let results = join_all(partners.into_iter().map(&push)).await;
        let flat = PushStatusResult::flatten(tracking, sender, &results)
            .with_runtime(started.elapsed());

        metrics::counter!("wwcp_status_pushes_total", "result" => flat.result.to_string())
            .increment(1);
        self.ctx.publish(Event::StatusPushed(StatusPushedEvent {
            roaming_network_id: self.id.clone(),
            event_tracking_id: tracking,
            updates: update_count,
            result: flat.result.to_string(),
            timestamp: Utc::now(),
        }));
        flat
    }
}

impl std::fmt::Debug for RoamingNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoamingNetwork")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("operators", &self.operators.len())
            .field("providers", &self.providers.len())
            .field("partners", &self.partners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::domain::ids::{ChargingPoolId, ChargingStationId};
    use crate::domain::results::PushStatusResultType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPartner {
        id: String,
        answer: PushStatusResultType,
        received: AtomicUsize,
    }

    impl CountingPartner {
        fn new(id: &str, answer: PushStatusResultType) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                answer,
                received: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RoamingPartner for CountingPartner {
        fn id(&self) -> &str {
            &self.id
        }

        async fn push_evse_status(
            &self,
            event_tracking_id: EventTrackingId,
            updates: &[EvseStatusUpdate],
        ) -> PushStatusResult {
            self.received.fetch_add(updates.len(), Ordering::SeqCst);
            match self.answer {
                PushStatusResultType::Error => {
                    PushStatusResult::error(event_tracking_id, &self.id, "unreachable")
                }
                PushStatusResultType::Enqueued => {
                    PushStatusResult::enqueued(event_tracking_id, &self.id)
                }
                _ => PushStatusResult::success(event_tracking_id, &self.id),
            }
        }
    }

    fn network() -> RoamingNetwork {
        RoamingNetwork::new(RoamingNetworkId::parse("Test").unwrap(), "Test", create_event_bus())
    }

    fn seeded() -> (RoamingNetwork, EvseId) {
        let rn = network();
        let op = rn
            .create_charging_station_operator(
                ChargingStationOperatorId::parse("DE*GEF").unwrap(),
                "GraphDefined",
            )
            .unwrap();
        let pool = op
            .create_charging_pool(ChargingPoolId::parse("DE*GEF*P1").unwrap(), None)
            .unwrap();
        let station = op
            .create_charging_station(pool.id(), ChargingStationId::parse("DE*GEF*S1").unwrap())
            .unwrap();
        let evse = op
            .create_evse(station.id(), EvseId::parse("DE*GEF*E1*1").unwrap())
            .unwrap();
        let id = evse.id().clone();
        (rn, id)
    }

    #[test]
    fn operator_crud_and_events() {
        let rn = network();
        let mut events = rn.event_bus().subscribe();
        let id = ChargingStationOperatorId::parse("DE*GEF").unwrap();

        rn.create_charging_station_operator(id.clone(), "GraphDefined").unwrap();
        assert!(rn.contains_charging_station_operator(&id));
        assert!(matches!(
            rn.create_charging_station_operator(id.clone(), "again"),
            Err(DomainError::Conflict { .. })
        ));
        assert_eq!(events.try_recv().unwrap().event.event_type(), "operator_added");

        assert!(rn.remove_charging_station_operator(&id).is_some());
        assert!(rn.charging_station_operators().is_empty());
        assert_eq!(events.try_recv().unwrap().event.event_type(), "operator_removed");
    }

    #[test]
    fn vetoed_provider_is_not_added_and_not_announced() {
        let rn = network();
        let mut events = rn.event_bus().subscribe();
        rn.provider_addition
            .on_vote(|p: &EMobilityProvider| Vote::veto(format!("{} is not trusted", p.id())));

        let id = EMobilityProviderId::parse("DE*GDF").unwrap();
        let err = rn.create_emobility_provider(id.clone(), "GraphDefined").unwrap_err();
        assert!(matches!(err, DomainError::Vetoed { .. }));
        assert!(!rn.contains_emobility_provider(&id));
        assert!(events.try_recv().is_none());
    }

    #[test]
    fn evse_lookup_goes_through_the_operator() {
        let (rn, evse_id) = seeded();
        assert!(rn.contains_evse(&evse_id));
        assert_eq!(rn.evses().len(), 1);
        assert!(rn.get_evse(&EvseId::parse("DE*XYZ*E1*1").unwrap()).is_none());

        let update = rn
            .set_evse_status(&evse_id, EvseStatus::Available, Utc::now())
            .unwrap();
        assert!(update.is_some());
        assert!(matches!(
            rn.set_evse_status(
                &EvseId::parse("DE*XYZ*E1*1").unwrap(),
                EvseStatus::Available,
                Utc::now()
            ),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn push_fans_out_and_flattens() {
        let (rn, evse_id) = seeded();
        let ok = CountingPartner::new("A", PushStatusResultType::Success);
        let queued = CountingPartner::new("B", PushStatusResultType::Enqueued);
        rn.register_roaming_partner(ok.clone()).unwrap();
        rn.register_roaming_partner(queued.clone()).unwrap();
        assert!(rn.register_roaming_partner(ok.clone()).is_err());

        let update = rn
            .set_evse_status(&evse_id, EvseStatus::Charging, Utc::now())
            .unwrap()
            .unwrap();
        let result = rn.push_evse_status(&[update], None).await;

        assert_eq!(result.result, PushStatusResultType::Enqueued);
        assert_eq!(result.sender_id, "Test");
        assert!(result.runtime.is_some());
        assert_eq!(ok.received.load(Ordering::SeqCst), 1);
        assert_eq!(queued.received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn push_reports_partner_errors() {
        let (rn, evse_id) = seeded();
        rn.register_roaming_partner(CountingPartner::new("A", PushStatusResultType::Success))
            .unwrap();
        rn.register_roaming_partner(CountingPartner::new("B", PushStatusResultType::Error))
            .unwrap();

        let update = rn
            .set_evse_status(&evse_id, EvseStatus::Error, Utc::now())
            .unwrap()
            .unwrap();
        let result = rn.push_evse_status(&[update], None).await;
        assert_eq!(result.result, PushStatusResultType::Error);
        assert!(result.warnings.iter().any(|w| w.contains("unreachable")));
    }

    #[tokio::test]
    async fn push_short_circuits() {
        let (rn, evse_id) = seeded();
        let partner = CountingPartner::new("A", PushStatusResultType::Success);
        rn.register_roaming_partner(partner.clone()).unwrap();

        let empty = rn.push_evse_status(&[], None).await;
        assert_eq!(empty.result, PushStatusResultType::NoOperation);

        rn.set_admin_status(RoamingNetworkAdminStatus::OutOfService, Utc::now());
        let update = rn
            .set_evse_status(&evse_id, EvseStatus::Available, Utc::now())
            .unwrap()
            .unwrap();
        let down = rn.push_evse_status(&[update], None).await;
        assert_eq!(down.result, PushStatusResultType::AdminDown);
        assert_eq!(partner.received.load(Ordering::SeqCst), 0);

        let admin = rn.push_evse_admin_status(&[], None).await;
        assert_eq!(admin.result, PushStatusResultType::AdminDown);
    }
}
