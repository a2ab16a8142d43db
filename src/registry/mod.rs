use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    access::Ownable,
    error::{CashbackError, Result},
    events::{DistributionEvent, EventSink},
    ledger::Address,
};

/// Sequential partner id. `0` never names a partner and means "none".
pub type PartnerId = u64;

pub const NO_PARTNER: PartnerId = 0;

/// Mutable descriptive fields of a partner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartnerInfo {
    pub name: String,
    pub description: String,
    pub referral_link: String,
    pub wallet: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Partner {
    pub id: PartnerId,
    pub is_active: bool,
    #[serde(flatten)]
    pub info: PartnerInfo,
}

/// Owns every partner record. Records are never removed; deactivation is the
/// only way to retire a partner.
#[derive(Clone, Debug)]
pub struct PartnerRegistry {
    access: Ownable,
    partners: Vec<Partner>,
}

impl PartnerRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            access: Ownable::new(owner),
            partners: Vec::new(),
        }
    }

    pub fn access(&self) -> &Ownable {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut Ownable {
        &mut self.access
    }

    pub fn partner_count(&self) -> u64 {
        self.partners.len() as u64
    }

    pub fn partners(&self) -> impl Iterator<Item = &Partner> {
        self.partners.iter()
    }

    pub fn add_partner(
        &mut self,
        caller: &Address,
        info: PartnerInfo,
        events: &mut impl EventSink,
    ) -> Result<PartnerId> {
        self.access.ensure_owner(caller)?;
        if info.wallet.is_zero() {
            return Err(CashbackError::InvalidInput("partner wallet is the null address"));
        }
        let id = self.partner_count() + 1;
        debug!(id, name = %info.name, wallet = %info.wallet, "registering partner");
        let event = DistributionEvent::PartnerAdded {
            id,
            name: info.name.clone(),
            wallet: info.wallet,
        };
        self.partners.push(Partner {
            id,
            is_active: true,
            info,
        });
        events.emit(event);
        Ok(id)
    }

    /// Overwrites every descriptive field. Activation is left as is.
    pub fn update_partner(
        &mut self,
        caller: &Address,
        id: PartnerId,
        info: PartnerInfo,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        let index = self.index_of(id)?;
        if info.wallet.is_zero() {
            return Err(CashbackError::InvalidInput("partner wallet is the null address"));
        }
        let partner = &mut self.partners[index];
        partner.info = info;
        events.emit(DistributionEvent::PartnerUpdated {
            id,
            name: partner.info.name.clone(),
            wallet: partner.info.wallet,
        });
        Ok(())
    }

    pub fn toggle_partner_status(
        &mut self,
        caller: &Address,
        id: PartnerId,
        is_active: bool,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        let index = self.index_of(id)?;
        self.partners[index].is_active = is_active;
        events.emit(DistributionEvent::PartnerStatusChanged { id, is_active });
        Ok(())
    }

    pub fn partner_details(&self, id: PartnerId) -> Result<&Partner> {
        let index = self.index_of(id)?;
        Ok(&self.partners[index])
    }

    pub fn partner_wallet(&self, id: PartnerId) -> Result<Address> {
        Ok(self.partner_details(id)?.info.wallet)
    }

    /// The partner if it exists and is active.
    pub fn active_partner(&self, id: PartnerId) -> Option<&Partner> {
        self.partner_details(id).ok().filter(|p| p.is_active)
    }

    pub fn is_active_partner(&self, id: PartnerId) -> bool {
        self.active_partner(id).is_some()
    }

    fn index_of(&self, id: PartnerId) -> Result<usize> {
        if id == NO_PARTNER || id > self.partner_count() {
            return Err(CashbackError::InvalidPartnerId(id));
        }
        Ok((id - 1) as usize)
    }
}
