//! One contract instance: registry, engine, ledger and event log behind a
//! single lock.
//!
//! Every mutating call runs start to finish under the lock, so concurrent
//! purchases never observe a half-applied split. Events of a call are staged
//! and reach the shared log only once the call succeeded.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::{DistributionConfig, Settings, SettingsError},
    engine::{DistributionEngine, DistributionReceipt},
    error::{CashbackError, Result},
    events::{DistributionEvent, EventLog, PendingEvents},
    ledger::{Address, Amount, LedgerError, LedgerSnapshot, LedgerState, ValueTransfer},
    registry::{Partner, PartnerId, PartnerInfo, PartnerRegistry},
};

struct State {
    registry: PartnerRegistry,
    engine: DistributionEngine,
    ledger: LedgerState,
    events: EventLog,
}

impl State {
    /// Runs `op` with a staging buffer; events are published on success.
    fn commit<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self, &mut PendingEvents) -> Result<T>,
    ) -> Result<T> {
        let mut pending = PendingEvents::new();
        match op(self, &mut pending) {
            Ok(value) => {
                pending.flush_into(&mut self.events);
                Ok(value)
            }
            Err(err) => {
                warn!(operation = name, %err, "operation rejected");
                Err(err)
            }
        }
    }
}

/// Serialisable view of a whole instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub registry_owner: Address,
    pub engine_owner: Address,
    pub config: DistributionConfig,
    pub reserve_wallet: Address,
    pub burn_sink: Address,
    pub pool_balance: Amount,
    pub partners: Vec<Partner>,
    pub referrals: BTreeMap<Address, PartnerId>,
    pub ledger: LedgerSnapshot,
    pub event_count: usize,
}

pub struct CashbackService {
    state: Mutex<State>,
}

impl CashbackService {
    pub fn new(settings: &Settings) -> Result<Self, SettingsError> {
        let engine = DistributionEngine::new(settings)?;
        Ok(Self {
            state: Mutex::new(State {
                registry: PartnerRegistry::new(settings.owner),
                engine,
                ledger: LedgerState::new(),
                events: EventLog::new(),
            }),
        })
    }

    // ---- partner registry ----

    pub fn add_partner(&self, caller: &Address, info: PartnerInfo) -> Result<PartnerId> {
        self.state.lock().commit("add_partner", |s, ev| {
            s.registry.add_partner(caller, info, ev)
        })
    }

    pub fn update_partner(&self, caller: &Address, id: PartnerId, info: PartnerInfo) -> Result<()> {
        self.state.lock().commit("update_partner", |s, ev| {
            s.registry.update_partner(caller, id, info, ev)
        })
    }

    pub fn toggle_partner_status(
        &self,
        caller: &Address,
        id: PartnerId,
        is_active: bool,
    ) -> Result<()> {
        self.state.lock().commit("toggle_partner_status", |s, ev| {
            s.registry.toggle_partner_status(caller, id, is_active, ev)
        })
    }

    pub fn partner_details(&self, id: PartnerId) -> Result<Partner> {
        self.state.lock().registry.partner_details(id).cloned()
    }

    pub fn partner_wallet(&self, id: PartnerId) -> Result<Address> {
        self.state.lock().registry.partner_wallet(id)
    }

    pub fn partner_count(&self) -> u64 {
        self.state.lock().registry.partner_count()
    }

    // ---- distribution engine ----

    pub fn register_user(
        &self,
        caller: &Address,
        user: Address,
        referrer_id: PartnerId,
    ) -> Result<bool> {
        self.state.lock().commit("register_user", |s, ev| {
            s.engine
                .register_user(caller, user, referrer_id, &s.registry, ev)
        })
    }

    pub fn issue_cashback_and_distribute(
        &self,
        caller: &Address,
        user: Address,
        purchase_amount: Amount,
        partner_id: PartnerId,
    ) -> Result<DistributionReceipt> {
        self.state.lock().commit("issue_cashback_and_distribute", |s, ev| {
            s.engine.issue_cashback_and_distribute(
                caller,
                user,
                purchase_amount,
                partner_id,
                &s.registry,
                &mut s.ledger,
                ev,
            )
        })
    }

    pub fn set_cashback_params(
        &self,
        caller: &Address,
        base_percent: u8,
        user_share: u8,
        reserve_share: u8,
        burn_share: u8,
    ) -> Result<()> {
        self.state.lock().commit("set_cashback_params", |s, ev| {
            s.engine.set_cashback_params(
                caller,
                base_percent,
                user_share,
                reserve_share,
                burn_share,
                ev,
            )
        })
    }

    pub fn set_referrer_bonus_percent(&self, caller: &Address, percent: u8) -> Result<()> {
        self.state.lock().commit("set_referrer_bonus_percent", |s, ev| {
            s.engine.set_referrer_bonus_percent(caller, percent, ev)
        })
    }

    pub fn set_reserve_wallet(&self, caller: &Address, new_wallet: Address) -> Result<()> {
        self.state.lock().commit("set_reserve_wallet", |s, ev| {
            s.engine.set_reserve_wallet(caller, new_wallet, ev)
        })
    }

    pub fn withdraw_stray_tokens(
        &self,
        caller: &Address,
        asset: &str,
        amount: Amount,
        to: Address,
    ) -> Result<()> {
        self.state.lock().commit("withdraw_stray_tokens", |s, ev| {
            s.engine
                .withdraw_stray_tokens(caller, asset, amount, to, &mut s.ledger, ev)
        })
    }

    pub fn config(&self) -> DistributionConfig {
        *self.state.lock().engine.config()
    }

    pub fn referrer_of(&self, user: &Address) -> PartnerId {
        self.state.lock().engine.referrer_of(user)
    }

    pub fn reserve_wallet(&self) -> Address {
        self.state.lock().engine.reserve_wallet()
    }

    pub fn pool_balance(&self) -> Amount {
        let state = self.state.lock();
        state.engine.pool_balance(&state.ledger)
    }

    // ---- ownership ----

    /// Moves ownership of both the registry and the engine.
    pub fn transfer_ownership(&self, caller: &Address, new_owner: Address) -> Result<()> {
        self.state.lock().commit("transfer_ownership", |s, ev| {
            // Check both guards before touching either.
            s.registry.access().ensure_owner(caller)?;
            s.engine.access().ensure_owner(caller)?;
            s.registry
                .access_mut()
                .transfer_ownership(caller, new_owner, &mut *ev)?;
            s.engine
                .access_mut()
                .transfer_ownership(caller, new_owner, ev)
        })
    }

    pub fn propose_owner(&self, caller: &Address, candidate: Address) -> Result<()> {
        self.state.lock().commit("propose_owner", |s, ev| {
            s.registry.access().ensure_owner(caller)?;
            s.engine.access().ensure_owner(caller)?;
            s.registry
                .access_mut()
                .propose_owner(caller, candidate, &mut *ev)?;
            s.engine.access_mut().propose_owner(caller, candidate, ev)
        })
    }

    pub fn accept_ownership(&self, caller: &Address) -> Result<()> {
        self.state.lock().commit("accept_ownership", |s, ev| {
            let registry_pending = s.registry.access().pending_owner();
            let engine_pending = s.engine.access().pending_owner();
            if registry_pending != Some(*caller) || engine_pending != Some(*caller) {
                return Err(CashbackError::Unauthorized(*caller));
            }
            s.registry.access_mut().accept_ownership(caller, &mut *ev)?;
            s.engine.access_mut().accept_ownership(caller, ev)
        })
    }

    pub fn owner(&self) -> Address {
        self.state.lock().engine.access().owner()
    }

    // ---- ledger ----

    /// Credits value arriving from outside, e.g. a top-up of the reward pool.
    pub fn fund(&self, asset: &str, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        self.state.lock().ledger.mint(asset, to, amount)
    }

    pub fn balance_of(&self, asset: &str, holder: &Address) -> Amount {
        self.state.lock().ledger.balance_of(asset, holder)
    }

    // ---- observation ----

    pub fn event_count(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn events_since(&self, from: usize) -> Vec<DistributionEvent> {
        self.state.lock().events.since(from).to_vec()
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        let state = self.state.lock();
        ServiceSnapshot {
            registry_owner: state.registry.access().owner(),
            engine_owner: state.engine.access().owner(),
            config: *state.engine.config(),
            reserve_wallet: state.engine.reserve_wallet(),
            burn_sink: state.engine.burn_sink(),
            pool_balance: state.engine.pool_balance(&state.ledger),
            partners: state.registry.partners().cloned().collect(),
            referrals: state.engine.referrals().clone(),
            ledger: state.ledger.snapshot(),
            event_count: state.events.len(),
        }
    }
}
