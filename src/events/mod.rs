//! Append-only domain event log.
//!
//! Events are written only after the state change they describe is final.
//! Observers (dashboards, auditors) read this log, never the internal state.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::DistributionConfig,
    ledger::{Address, Amount, AssetId},
    registry::PartnerId,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionEvent {
    PartnerAdded {
        id: PartnerId,
        name: String,
        wallet: Address,
    },
    PartnerUpdated {
        id: PartnerId,
        name: String,
        wallet: Address,
    },
    PartnerStatusChanged {
        id: PartnerId,
        is_active: bool,
    },
    UserRegistered {
        user: Address,
        referrer_id: PartnerId,
    },
    CashbackIssued {
        user: Address,
        amount: Amount,
    },
    ReferrerBonusIssued {
        referrer_id: PartnerId,
        wallet: Address,
        amount: Amount,
    },
    TokensToReserve {
        wallet: Address,
        amount: Amount,
    },
    TokensBurned {
        sink: Address,
        amount: Amount,
    },
    CashbackParamsUpdated {
        config: DistributionConfig,
    },
    ReferrerBonusUpdated {
        old_percent: u8,
        new_percent: u8,
    },
    ReserveWalletUpdated {
        old_wallet: Address,
        new_wallet: Address,
    },
    StrayTokensWithdrawn {
        asset: AssetId,
        to: Address,
        amount: Amount,
    },
    OwnershipTransferStarted {
        owner: Address,
        pending_owner: Address,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

impl DistributionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DistributionEvent::PartnerAdded { .. } => "partner_added",
            DistributionEvent::PartnerUpdated { .. } => "partner_updated",
            DistributionEvent::PartnerStatusChanged { .. } => "partner_status_changed",
            DistributionEvent::UserRegistered { .. } => "user_registered",
            DistributionEvent::CashbackIssued { .. } => "cashback_issued",
            DistributionEvent::ReferrerBonusIssued { .. } => "referrer_bonus_issued",
            DistributionEvent::TokensToReserve { .. } => "tokens_to_reserve",
            DistributionEvent::TokensBurned { .. } => "tokens_burned",
            DistributionEvent::CashbackParamsUpdated { .. } => "cashback_params_updated",
            DistributionEvent::ReferrerBonusUpdated { .. } => "referrer_bonus_updated",
            DistributionEvent::ReserveWalletUpdated { .. } => "reserve_wallet_updated",
            DistributionEvent::StrayTokensWithdrawn { .. } => "stray_tokens_withdrawn",
            DistributionEvent::OwnershipTransferStarted { .. } => "ownership_transfer_started",
            DistributionEvent::OwnershipTransferred { .. } => "ownership_transferred",
        }
    }
}

pub trait EventSink {
    fn emit(&mut self, event: DistributionEvent);
}

/// In-memory event log. Each appended event is mirrored to `tracing`.
#[derive(Default, Clone, Debug)]
pub struct EventLog {
    events: Vec<DistributionEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DistributionEvent> {
        self.events.iter()
    }

    /// Events appended at or after position `from`.
    pub fn since(&self, from: usize) -> &[DistributionEvent] {
        self.events.get(from..).unwrap_or(&[])
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: DistributionEvent) {
        info!(target: "cashback::events", seq = self.events.len(), kind = event.kind(), ?event);
        self.events.push(event);
    }
}

/// Collects events of one operation so they reach the shared log only when
/// the whole operation succeeded.
#[derive(Default, Debug)]
pub struct PendingEvents(Vec<DistributionEvent>);

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_into(self, sink: &mut impl EventSink) {
        for event in self.0 {
            sink.emit(event);
        }
    }
}

impl EventSink for PendingEvents {
    fn emit(&mut self, event: DistributionEvent) {
        self.0.push(event);
    }
}
