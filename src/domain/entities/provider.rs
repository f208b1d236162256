//! E-mobility provider aggregate and its customer accounts

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;

use super::voting::{Vote, VotingNotificator};
use super::EntityContext;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::events::{EntityEvent, Event, StatusChangedEvent};
use crate::domain::ids::{EMobilityAccountId, EMobilityProviderId, RoamingNetworkId};
use crate::domain::status::{
    AccountStatus, ProviderAdminStatus, ProviderStatus, ProviderStatusUpdate, StatusSchedule,
    StatusUpdate, Timestamped,
};

/// A customer account (contract) of an e-mobility provider.
#[derive(Debug)]
pub struct EMobilityAccount {
    id: EMobilityAccountId,
    holder: Option<String>,
    status: RwLock<StatusSchedule<AccountStatus>>,
}

impl EMobilityAccount {
    pub fn new(id: EMobilityAccountId, holder: Option<String>) -> Self {
        Self {
            id,
            holder,
            status: RwLock::new(StatusSchedule::starting_with(AccountStatus::Active, Utc::now())),
        }
    }

    pub fn id(&self) -> &EMobilityAccountId {
        &self.id
    }

    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    pub fn status(&self) -> Timestamped<AccountStatus> {
        self.status.read().current()
    }

    pub fn set_status(
        &self,
        status: AccountStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<EMobilityAccountId, AccountStatus>> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        Some(StatusUpdate::new(self.id.clone(), old, new))
    }
}

/// An e-mobility provider (EMP) and its accounts.
pub struct EMobilityProvider {
    id: EMobilityProviderId,
    name: String,
    ctx: EntityContext,
    admin_status: RwLock<StatusSchedule<ProviderAdminStatus>>,
    status: RwLock<StatusSchedule<ProviderStatus>>,
    accounts: DashMap<EMobilityAccountId, Arc<EMobilityAccount>>,
    pub account_addition: VotingNotificator<EMobilityAccount>,
}

impl EMobilityProvider {
    pub(crate) fn new(id: EMobilityProviderId, name: String, ctx: EntityContext) -> Self {
        Self {
            id,
            name,
            ctx,
            admin_status: RwLock::new(StatusSchedule::new()),
            status: RwLock::new(StatusSchedule::new()),
            accounts: DashMap::new(),
            account_addition: VotingNotificator::new(),
        }
    }

    pub fn id(&self) -> &EMobilityProviderId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roaming_network_id(&self) -> &RoamingNetworkId {
        &self.ctx.roaming_network_id
    }

    pub fn admin_status(&self) -> Timestamped<ProviderAdminStatus> {
        self.admin_status.read().current()
    }

    pub fn status(&self) -> Timestamped<ProviderStatus> {
        self.status.read().current()
    }

    pub fn set_admin_status(
        &self,
        status: ProviderAdminStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<StatusUpdate<EMobilityProviderId, ProviderAdminStatus>> {
        let (old, new) = self.admin_status.write().insert(status, timestamp)?;
        let update = StatusUpdate::new(self.id.clone(), old, new);
        self.ctx.publish(Event::ProviderAdminStatusChanged(
            StatusChangedEvent::from_update(&self.ctx.roaming_network_id, &update),
        ));
        Some(update)
    }

    pub fn set_status(
        &self,
        status: ProviderStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<ProviderStatusUpdate> {
        let (old, new) = self.status.write().insert(status, timestamp)?;
        let update = StatusUpdate::new(self.id.clone(), old, new);
        self.ctx.publish(Event::ProviderStatusChanged(StatusChangedEvent::from_update(
            &self.ctx.roaming_network_id,
            &update,
        )));
        Some(update)
    }

    pub fn create_account(
        &self,
        id: EMobilityAccountId,
        holder: Option<String>,
    ) -> DomainResult<Arc<EMobilityAccount>> {
        if id.provider_id() != &self.id {
            return Err(DomainError::Validation(format!(
                "Account '{}' does not belong to provider '{}'",
                id, self.id
            )));
        }
        if self.accounts.contains_key(&id) {
            return Err(DomainError::conflict("EMobilityAccount", &id));
        }

        let account = EMobilityAccount::new(id.clone(), holder);
        if let Vote::Veto(reason) = self.account_addition.vote(&account) {
            return Err(DomainError::Vetoed {
                entity: "EMobilityAccount",
                id: id.to_string(),
                reason,
            });
        }

        let account = Arc::new(account);
        match self.accounts.entry(id.clone()) {
            Entry::Occupied(_) => return Err(DomainError::conflict("EMobilityAccount", &id)),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
            }
        }

        info!(provider_id = %self.id, account_id = %id, "Account added");
        self.ctx.publish(Event::AccountAdded(EntityEvent::now(
            &self.ctx.roaming_network_id,
            &self.id,
            &id,
        )));
        Ok(account)
    }

    pub fn get_account(&self, id: &EMobilityAccountId) -> Option<Arc<EMobilityAccount>> {
        self.accounts.get(id).map(|a| a.value().clone())
    }

    pub fn contains_account(&self, id: &EMobilityAccountId) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn remove_account(&self, id: &EMobilityAccountId) -> Option<Arc<EMobilityAccount>> {
        self.accounts.remove(id).map(|(_, account)| account)
    }

    pub fn accounts(&self) -> Vec<Arc<EMobilityAccount>> {
        let mut accounts: Vec<_> = self.accounts.iter().map(|a| a.value().clone()).collect();
        accounts.sort_by(|a, b| a.id().cmp(b.id()));
        accounts
    }

    /// Whether the account exists and is currently active.
    pub fn is_authorized(&self, id: &EMobilityAccountId) -> bool {
        self.get_account(id)
            .map(|a| a.status().value == AccountStatus::Active)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for EMobilityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EMobilityProvider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("accounts", &self.accounts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;

    fn provider() -> EMobilityProvider {
        EMobilityProvider::new(
            EMobilityProviderId::parse("DE*GDF").unwrap(),
            "GraphDefined EMP".into(),
            EntityContext::new(RoamingNetworkId::parse("Test").unwrap(), create_event_bus()),
        )
    }

    #[test]
    fn accounts_must_belong_to_the_provider() {
        let emp = provider();
        let own = EMobilityAccountId::parse("DE-GDF-C12345678-X").unwrap();
        let foreign = EMobilityAccountId::parse("DE-ABC-C12345678-X").unwrap();

        emp.create_account(own.clone(), Some("Jane Doe".into())).unwrap();
        assert!(matches!(
            emp.create_account(foreign, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            emp.create_account(own.clone(), None),
            Err(DomainError::Conflict { .. })
        ));
        assert_eq!(emp.accounts().len(), 1);
        assert_eq!(emp.get_account(&own).unwrap().holder(), Some("Jane Doe"));
    }

    #[test]
    fn blocked_accounts_are_not_authorized() {
        let emp = provider();
        let id = EMobilityAccountId::parse("DEGDFC12345678").unwrap();
        let account = emp.create_account(id.clone(), None).unwrap();
        assert!(emp.is_authorized(&id));

        account.set_status(AccountStatus::Blocked, Utc::now());
        assert!(!emp.is_authorized(&id));
        assert!(emp.remove_account(&id).is_some());
        assert!(!emp.contains_account(&id));
    }

    #[test]
    fn admin_status_changes_are_published() {
        let emp = provider();
        let mut events = emp.ctx.event_bus.subscribe();

        let update = emp
            .set_admin_status(ProviderAdminStatus::OutOfService, Utc::now())
            .unwrap();
        assert_eq!(update.new_status.value, ProviderAdminStatus::OutOfService);

        let msg = events.try_recv().unwrap();
        assert_eq!(msg.event.event_type(), "provider_admin_status_changed");
        assert_eq!(msg.event.subject_id(), "DE*GDF");
    }

    #[test]
    fn account_addition_can_be_vetoed() {
        let emp = provider();
        emp.account_addition
            .on_vote(|_: &EMobilityAccount| Vote::veto("registration closed"));
        let id = EMobilityAccountId::parse("DEGDFC12345678").unwrap();
        assert!(matches!(
            emp.create_account(id, None),
            Err(DomainError::Vetoed { .. })
        ));
    }
}
