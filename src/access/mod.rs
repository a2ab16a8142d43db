use serde::{Deserialize, Serialize};

use crate::{
    error::{CashbackError, Result},
    events::{DistributionEvent, EventSink},
    ledger::Address,
};

/// Single-owner authorization guard. The owner is fixed at construction and
/// can move either directly or through a propose/accept handshake.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ownable {
    owner: Address,
    pending_owner: Option<Address>,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            pending_owner: None,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pending_owner(&self) -> Option<Address> {
        self.pending_owner
    }

    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if *caller != self.owner {
            return Err(CashbackError::Unauthorized(*caller));
        }
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(CashbackError::InvalidInput("new owner is the null address"));
        }
        let previous_owner = self.owner;
        self.owner = new_owner;
        self.pending_owner = None;
        events.emit(DistributionEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    /// First half of the handshake. Proposing the null address cancels a
    /// pending transfer.
    pub fn propose_owner(
        &mut self,
        caller: &Address,
        candidate: Address,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        if candidate.is_zero() {
            self.pending_owner = None;
            return Ok(());
        }
        self.pending_owner = Some(candidate);
        events.emit(DistributionEvent::OwnershipTransferStarted {
            owner: self.owner,
            pending_owner: candidate,
        });
        Ok(())
    }

    pub fn accept_ownership(&mut self, caller: &Address, events: &mut impl EventSink) -> Result<()> {
        if self.pending_owner != Some(*caller) {
            return Err(CashbackError::Unauthorized(*caller));
        }
        let previous_owner = self.owner;
        self.owner = *caller;
        self.pending_owner = None;
        events.emit(DistributionEvent::OwnershipTransferred {
            previous_owner,
            new_owner: *caller,
        });
        Ok(())
    }
}
