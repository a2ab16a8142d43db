use serde::{Deserialize, Serialize};

use crate::{
    config::DistributionConfig,
    ledger::{Address, Amount},
    registry::PartnerId,
};

/// `floor(amount * percent / 100)`. Never exceeds `amount`.
pub fn percent_of(amount: Amount, percent: u8) -> Amount {
    (u128::from(amount) * u128::from(percent) / 100) as Amount
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    User,
    Referrer,
    Reserve,
    Burn,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Referrer {
    pub id: PartnerId,
    pub wallet: Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Destinations {
    pub user: Address,
    pub reserve: Address,
    pub burn_sink: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedTransfer {
    pub leg: Leg,
    pub to: Address,
    pub amount: Amount,
}

/// Amounts of one distribution, computed before anything moves.
///
/// Each share is floored on its own, so the legs can add up to less than
/// `total_cashback`. The difference stays in the pool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionPlan {
    pub total_cashback: Amount,
    pub user_amount: Amount,
    pub referrer_amount: Amount,
    pub reserve_amount: Amount,
    pub burn_amount: Amount,
    pub referrer: Option<Referrer>,
}

impl DistributionPlan {
    /// `referrer` is the user's active referring partner, if any. It only
    /// receives a bonus when the config carries a non-zero bonus rate.
    pub fn compute(
        config: &DistributionConfig,
        purchase_amount: Amount,
        referrer: Option<Referrer>,
    ) -> Self {
        let total_cashback = percent_of(purchase_amount, config.cashback_base_percent);
        let mut user_amount = percent_of(total_cashback, config.user_share);
        let reserve_amount = percent_of(total_cashback, config.reserve_share);
        let burn_amount = percent_of(total_cashback, config.burn_share);

        let referrer = referrer.filter(|_| config.referrer_bonus_percent > 0);
        let referrer_amount = match referrer {
            Some(_) => percent_of(user_amount, config.referrer_bonus_percent),
            None => 0,
        };
        user_amount -= referrer_amount;

        Self {
            total_cashback,
            user_amount,
            referrer_amount,
            reserve_amount,
            burn_amount,
            referrer,
        }
    }

    pub fn distributed(&self) -> Amount {
        self.user_amount + self.referrer_amount + self.reserve_amount + self.burn_amount
    }

    pub fn rounding_remainder(&self) -> Amount {
        self.total_cashback - self.distributed()
    }

    /// Strictly positive legs in settlement order: user, referrer, reserve,
    /// burn.
    pub fn transfers(&self, destinations: &Destinations) -> Vec<PlannedTransfer> {
        let mut legs = vec![(Leg::User, destinations.user, self.user_amount)];
        if let Some(referrer) = self.referrer {
            legs.push((Leg::Referrer, referrer.wallet, self.referrer_amount));
        }
        legs.push((Leg::Reserve, destinations.reserve, self.reserve_amount));
        legs.push((Leg::Burn, destinations.burn_sink, self.burn_amount));
        legs.into_iter()
            .filter(|(_, _, amount)| *amount > 0)
            .map(|(leg, to, amount)| PlannedTransfer { leg, to, amount })
            .collect()
    }
}
