use serde::{Deserialize, Serialize};

use crate::error::{CashbackError, Result};

mod settings;

pub use settings::{Settings, SettingsError, DEFAULT_LOG_FILTER, DEFAULT_REWARD_ASSET};

pub const DEFAULT_CASHBACK_BASE_PERCENT: u8 = 1;
pub const DEFAULT_USER_SHARE: u8 = 70;
pub const DEFAULT_RESERVE_SHARE: u8 = 20;
pub const DEFAULT_BURN_SHARE: u8 = 10;
pub const DEFAULT_REFERRER_BONUS_PERCENT: u8 = 0;

/// Tunable percentages of the distribution.
///
/// Invariants, held after every write:
/// * `0 < cashback_base_percent <= 100`
/// * `user_share + reserve_share + burn_share == 100`
/// * `referrer_bonus_percent <= user_share`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionConfig {
    pub cashback_base_percent: u8,
    pub user_share: u8,
    pub reserve_share: u8,
    pub burn_share: u8,
    pub referrer_bonus_percent: u8,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            cashback_base_percent: DEFAULT_CASHBACK_BASE_PERCENT,
            user_share: DEFAULT_USER_SHARE,
            reserve_share: DEFAULT_RESERVE_SHARE,
            burn_share: DEFAULT_BURN_SHARE,
            referrer_bonus_percent: DEFAULT_REFERRER_BONUS_PERCENT,
        }
    }
}

impl DistributionConfig {
    pub fn validate(&self) -> Result<()> {
        check_cashback_params(
            self.cashback_base_percent,
            self.user_share,
            self.reserve_share,
            self.burn_share,
        )?;
        check_referrer_bonus(self.referrer_bonus_percent, self.user_share)
    }

    /// Replaces base rate and shares in one step. Nothing changes on error.
    pub fn set_cashback_params(
        &mut self,
        base_percent: u8,
        user_share: u8,
        reserve_share: u8,
        burn_share: u8,
    ) -> Result<()> {
        check_cashback_params(base_percent, user_share, reserve_share, burn_share)?;
        // A lower user share must still cover the configured referral bonus.
        check_referrer_bonus(self.referrer_bonus_percent, user_share)?;
        self.cashback_base_percent = base_percent;
        self.user_share = user_share;
        self.reserve_share = reserve_share;
        self.burn_share = burn_share;
        Ok(())
    }

    pub fn set_referrer_bonus_percent(&mut self, percent: u8) -> Result<()> {
        check_referrer_bonus(percent, self.user_share)?;
        self.referrer_bonus_percent = percent;
        Ok(())
    }
}

fn check_cashback_params(
    base_percent: u8,
    user_share: u8,
    reserve_share: u8,
    burn_share: u8,
) -> Result<()> {
    if base_percent == 0 || base_percent > 100 {
        return Err(CashbackError::InvalidConfig(
            "cashback base percent must be in 1..=100",
        ));
    }
    let total = u16::from(user_share) + u16::from(reserve_share) + u16::from(burn_share);
    if total != 100 {
        return Err(CashbackError::InvalidConfig("shares must sum to 100"));
    }
    Ok(())
}

fn check_referrer_bonus(percent: u8, user_share: u8) -> Result<()> {
    if percent > 100 {
        return Err(CashbackError::InvalidConfig(
            "referrer bonus percent must be at most 100",
        ));
    }
    if percent > user_share {
        return Err(CashbackError::InvalidConfig(
            "referrer bonus percent exceeds user share",
        ));
    }
    Ok(())
}
