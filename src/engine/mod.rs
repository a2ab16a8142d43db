//! Purchase-to-cashback processing.
//!
//! A purchase made through an active partner turns a fixed percentage of the
//! purchase amount into a cashback pool. The pool is split between the user,
//! the reserve wallet and the burn sink; when the user was referred by a
//! partner that is still active, part of the user's share goes to that
//! partner instead. Amounts are computed up front and checked against the
//! engine's pool balance before the first transfer is issued.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    access::Ownable,
    config::{DistributionConfig, Settings, SettingsError},
    error::{CashbackError, Result},
    events::{DistributionEvent, EventSink},
    ledger::{Address, Amount, AssetId, LedgerError, ValueTransfer},
    registry::{PartnerId, PartnerRegistry, NO_PARTNER},
};

mod plan;

pub use plan::{percent_of, Destinations, DistributionPlan, Leg, PlannedTransfer, Referrer};

/// Outcome of one processed purchase.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionReceipt {
    pub user: Address,
    pub partner_id: PartnerId,
    pub purchase_amount: Amount,
    pub total_cashback: Amount,
    pub referrer_id: Option<PartnerId>,
    pub transfers: Vec<PlannedTransfer>,
    pub rounding_remainder: Amount,
}

#[derive(Clone, Debug)]
pub struct DistributionEngine {
    access: Ownable,
    config: DistributionConfig,
    referrals: BTreeMap<Address, PartnerId>,
    account: Address,
    reward_asset: AssetId,
    reserve_wallet: Address,
    burn_sink: Address,
}

impl DistributionEngine {
    /// Builds an engine from deployment settings, which must validate.
    pub fn new(settings: &Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            access: Ownable::new(settings.owner),
            config: settings.distribution,
            referrals: BTreeMap::new(),
            account: settings.engine_account,
            reward_asset: settings.reward_asset.clone(),
            reserve_wallet: settings.reserve_wallet,
            burn_sink: settings.burn_sink,
        })
    }

    pub fn access(&self) -> &Ownable {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut Ownable {
        &mut self.access
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn reward_asset(&self) -> &str {
        &self.reward_asset
    }

    pub fn reserve_wallet(&self) -> Address {
        self.reserve_wallet
    }

    pub fn burn_sink(&self) -> Address {
        self.burn_sink
    }

    /// Stored referrer of `user`, `NO_PARTNER` when none was registered.
    pub fn referrer_of(&self, user: &Address) -> PartnerId {
        self.referrals.get(user).copied().unwrap_or(NO_PARTNER)
    }

    pub fn referrals(&self) -> &BTreeMap<Address, PartnerId> {
        &self.referrals
    }

    pub fn pool_balance(&self, ledger: &impl ValueTransfer) -> Amount {
        ledger.balance_of(&self.reward_asset, &self.account)
    }

    /// Links `user` to a referring partner. The first non-zero link wins;
    /// later calls for an already linked user change nothing and return
    /// `false`.
    pub fn register_user(
        &mut self,
        caller: &Address,
        user: Address,
        referrer_id: PartnerId,
        registry: &PartnerRegistry,
        events: &mut impl EventSink,
    ) -> Result<bool> {
        self.access.ensure_owner(caller)?;
        if user.is_zero() {
            return Err(CashbackError::InvalidInput("user is the null address"));
        }
        if referrer_id != NO_PARTNER && !registry.is_active_partner(referrer_id) {
            return Err(CashbackError::InactiveOrUnknownPartner(referrer_id));
        }
        if self.referrer_of(&user) != NO_PARTNER {
            debug!(%user, referrer_id, "user already linked, keeping first referrer");
            return Ok(false);
        }
        self.referrals.insert(user, referrer_id);
        events.emit(DistributionEvent::UserRegistered { user, referrer_id });
        Ok(true)
    }

    /// Splits the cashback of one purchase and settles it from the pool.
    #[allow(clippy::too_many_arguments)]
    pub fn issue_cashback_and_distribute(
        &self,
        caller: &Address,
        user: Address,
        purchase_amount: Amount,
        partner_id: PartnerId,
        registry: &PartnerRegistry,
        ledger: &mut impl ValueTransfer,
        events: &mut impl EventSink,
    ) -> Result<DistributionReceipt> {
        self.access.ensure_owner(caller)?;
        if user.is_zero() {
            return Err(CashbackError::InvalidInput("user is the null address"));
        }
        if purchase_amount == 0 {
            return Err(CashbackError::InvalidInput("purchase amount must be positive"));
        }
        if partner_id == NO_PARTNER {
            return Err(CashbackError::InvalidInput("partner id must be positive"));
        }
        if !registry.is_active_partner(partner_id) {
            return Err(CashbackError::InactiveOrUnknownPartner(partner_id));
        }

        let plan = DistributionPlan::compute(
            &self.config,
            purchase_amount,
            self.active_referrer(&user, registry),
        );
        let available = self.pool_balance(&*ledger);
        if available < plan.total_cashback {
            return Err(CashbackError::InsufficientPoolBalance {
                available,
                required: plan.total_cashback,
            });
        }
        debug!(
            %user,
            partner_id,
            purchase_amount,
            total = plan.total_cashback,
            user_amount = plan.user_amount,
            referrer_amount = plan.referrer_amount,
            reserve = plan.reserve_amount,
            burn = plan.burn_amount,
            remainder = plan.rounding_remainder(),
            "distribution planned"
        );

        let transfers = plan.transfers(&Destinations {
            user,
            reserve: self.reserve_wallet,
            burn_sink: self.burn_sink,
        });
        self.ensure_credits_fit(&transfers, &*ledger)?;
        // The pool covers the sum of all legs and every destination can take
        // its credit, so every transfer below clears.
        for transfer in &transfers {
            ledger.transfer(&self.reward_asset, &self.account, &transfer.to, transfer.amount)?;
        }
        for transfer in &transfers {
            events.emit(self.transfer_event(transfer, &plan));
        }

        info!(%user, partner_id, total = plan.total_cashback, legs = transfers.len(), "cashback distributed");
        Ok(DistributionReceipt {
            user,
            partner_id,
            purchase_amount,
            total_cashback: plan.total_cashback,
            referrer_id: plan.referrer.map(|r| r.id),
            rounding_remainder: plan.rounding_remainder(),
            transfers,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_cashback_params(
        &mut self,
        caller: &Address,
        base_percent: u8,
        user_share: u8,
        reserve_share: u8,
        burn_share: u8,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        self.config
            .set_cashback_params(base_percent, user_share, reserve_share, burn_share)?;
        events.emit(DistributionEvent::CashbackParamsUpdated {
            config: self.config,
        });
        Ok(())
    }

    pub fn set_referrer_bonus_percent(
        &mut self,
        caller: &Address,
        percent: u8,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        let old_percent = self.config.referrer_bonus_percent;
        self.config.set_referrer_bonus_percent(percent)?;
        events.emit(DistributionEvent::ReferrerBonusUpdated {
            old_percent,
            new_percent: percent,
        });
        Ok(())
    }

    pub fn set_reserve_wallet(
        &mut self,
        caller: &Address,
        new_wallet: Address,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if new_wallet.is_zero() {
            return Err(CashbackError::InvalidInput("reserve wallet is the null address"));
        }
        let old_wallet = std::mem::replace(&mut self.reserve_wallet, new_wallet);
        events.emit(DistributionEvent::ReserveWalletUpdated {
            old_wallet,
            new_wallet,
        });
        Ok(())
    }

    /// Recovers assets sent to the engine account by mistake. The reward
    /// asset never leaves through this path.
    pub fn withdraw_stray_tokens(
        &self,
        caller: &Address,
        asset: &str,
        amount: Amount,
        to: Address,
        ledger: &mut impl ValueTransfer,
        events: &mut impl EventSink,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if asset == self.reward_asset {
            return Err(CashbackError::ForbiddenAssetWithdrawal(asset.to_string()));
        }
        if to.is_zero() {
            return Err(CashbackError::InvalidInput("withdrawal target is the null address"));
        }
        if amount == 0 {
            return Err(CashbackError::InvalidInput("withdrawal amount must be positive"));
        }
        let available = ledger.balance_of(asset, &self.account);
        if available < amount {
            return Err(CashbackError::InsufficientBalance {
                asset: asset.to_string(),
                available,
                requested: amount,
            });
        }
        ledger.transfer(asset, &self.account, &to, amount)?;
        events.emit(DistributionEvent::StrayTokensWithdrawn {
            asset: asset.to_string(),
            to,
            amount,
        });
        Ok(())
    }

    /// Fails when some destination cannot absorb what the batch credits it.
    /// Legs sharing a destination are summed first.
    fn ensure_credits_fit(
        &self,
        transfers: &[PlannedTransfer],
        ledger: &impl ValueTransfer,
    ) -> Result<()> {
        let mut credits: BTreeMap<Address, Amount> = BTreeMap::new();
        for transfer in transfers.iter().filter(|t| t.to != self.account) {
            // Legs sum to at most the cashback total, which fits in an Amount.
            *credits.entry(transfer.to).or_default() += transfer.amount;
        }
        for (holder, amount) in credits {
            if !ledger.can_credit(&self.reward_asset, &holder, amount) {
                return Err(LedgerError::Overflow {
                    asset: self.reward_asset.clone(),
                    holder,
                    amount,
                }
                .into());
            }
        }
        Ok(())
    }

    /// The user's referrer when it is still an active partner. A deactivated
    /// referrer forfeits the bonus without failing the purchase.
    fn active_referrer(&self, user: &Address, registry: &PartnerRegistry) -> Option<Referrer> {
        let id = self.referrer_of(user);
        if id == NO_PARTNER {
            return None;
        }
        let referrer = registry.active_partner(id).map(|partner| Referrer {
            id,
            wallet: partner.info.wallet,
        });
        if referrer.is_none() {
            debug!(%user, referrer_id = id, "referrer inactive, bonus forfeited");
        }
        referrer
    }

    fn transfer_event(&self, transfer: &PlannedTransfer, plan: &DistributionPlan) -> DistributionEvent {
        match transfer.leg {
            Leg::User => DistributionEvent::CashbackIssued {
                user: transfer.to,
                amount: transfer.amount,
            },
            Leg::Referrer => DistributionEvent::ReferrerBonusIssued {
                referrer_id: plan.referrer.map(|r| r.id).unwrap_or(NO_PARTNER),
                wallet: transfer.to,
                amount: transfer.amount,
            },
            Leg::Reserve => DistributionEvent::TokensToReserve {
                wallet: transfer.to,
                amount: transfer.amount,
            },
            Leg::Burn => DistributionEvent::TokensBurned {
                sink: transfer.to,
                amount: transfer.amount,
            },
        }
    }
}
