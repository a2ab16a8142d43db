//! Scripted runs against a fresh contract instance.
//!
//! A scenario file carries deployment settings and an ordered list of steps.
//! Each step is applied as one call; a rejected step is recorded and the run
//! carries on with the next one.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{Settings, SettingsError},
    engine::DistributionReceipt,
    events::DistributionEvent,
    ledger::{Address, Amount, AssetId},
    registry::{PartnerId, PartnerInfo},
    service::{CashbackService, ServiceSnapshot},
};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("cannot read scenario: {0}")]
    Io(#[from] io::Error),
    #[error("cannot parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub settings: Settings,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Fund {
        asset: AssetId,
        to: Address,
        amount: Amount,
    },
    AddPartner {
        caller: Address,
        #[serde(flatten)]
        info: PartnerInfo,
    },
    UpdatePartner {
        caller: Address,
        id: PartnerId,
        #[serde(flatten)]
        info: PartnerInfo,
    },
    TogglePartnerStatus {
        caller: Address,
        id: PartnerId,
        is_active: bool,
    },
    RegisterUser {
        caller: Address,
        user: Address,
        #[serde(default)]
        referrer_id: PartnerId,
    },
    Purchase {
        caller: Address,
        user: Address,
        amount: Amount,
        partner_id: PartnerId,
    },
    SetCashbackParams {
        caller: Address,
        base_percent: u8,
        user_share: u8,
        reserve_share: u8,
        burn_share: u8,
    },
    SetReferrerBonusPercent {
        caller: Address,
        percent: u8,
    },
    SetReserveWallet {
        caller: Address,
        wallet: Address,
    },
    WithdrawStrayTokens {
        caller: Address,
        asset: AssetId,
        amount: Amount,
        to: Address,
    },
    TransferOwnership {
        caller: Address,
        new_owner: Address,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Accepted {
        #[serde(skip_serializing_if = "Option::is_none")]
        receipt: Option<DistributionReceipt>,
        events: Vec<DistributionEvent>,
    },
    Rejected {
        reason: String,
    },
}

impl StepOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted { .. })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub op: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub snapshot: ServiceSnapshot,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn run(&self) -> Result<RunReport, ScenarioError> {
        let service = CashbackService::new(&self.settings)?;
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepReport {
                index,
                op: step.clone(),
                outcome: apply_step(&service, step),
            })
            .collect();
        Ok(RunReport {
            steps,
            snapshot: service.snapshot(),
        })
    }
}

pub fn apply_step(service: &CashbackService, step: &Step) -> StepOutcome {
    let mark = service.event_count();
    let mut receipt = None;
    let result: Result<(), String> = match step {
        Step::Fund { asset, to, amount } => service
            .fund(asset, to, *amount)
            .map_err(|err| err.to_string()),
        Step::AddPartner { caller, info } => service
            .add_partner(caller, info.clone())
            .map(|id| debug!(id, "partner added"))
            .map_err(|err| err.to_string()),
        Step::UpdatePartner { caller, id, info } => service
            .update_partner(caller, *id, info.clone())
            .map_err(|err| err.to_string()),
        Step::TogglePartnerStatus {
            caller,
            id,
            is_active,
        } => service
            .toggle_partner_status(caller, *id, *is_active)
            .map_err(|err| err.to_string()),
        Step::RegisterUser {
            caller,
            user,
            referrer_id,
        } => service
            .register_user(caller, *user, *referrer_id)
            .map(|linked| debug!(%user, linked, "register user"))
            .map_err(|err| err.to_string()),
        Step::Purchase {
            caller,
            user,
            amount,
            partner_id,
        } => service
            .issue_cashback_and_distribute(caller, *user, *amount, *partner_id)
            .map(|r| receipt = Some(r))
            .map_err(|err| err.to_string()),
        Step::SetCashbackParams {
            caller,
            base_percent,
            user_share,
            reserve_share,
            burn_share,
        } => service
            .set_cashback_params(caller, *base_percent, *user_share, *reserve_share, *burn_share)
            .map_err(|err| err.to_string()),
        Step::SetReferrerBonusPercent { caller, percent } => service
            .set_referrer_bonus_percent(caller, *percent)
            .map_err(|err| err.to_string()),
        Step::SetReserveWallet { caller, wallet } => service
            .set_reserve_wallet(caller, *wallet)
            .map_err(|err| err.to_string()),
        Step::WithdrawStrayTokens {
            caller,
            asset,
            amount,
            to,
        } => service
            .withdraw_stray_tokens(caller, asset, *amount, *to)
            .map_err(|err| err.to_string()),
        Step::TransferOwnership { caller, new_owner } => service
            .transfer_ownership(caller, *new_owner)
            .map_err(|err| err.to_string()),
    };
    match result {
        Ok(()) => StepOutcome::Accepted {
            receipt,
            events: service.events_since(mark),
        },
        Err(reason) => StepOutcome::Rejected { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "settings": {
            "owner": "0x0000000000000000000000000000000000000001",
            "engine_account": "0x0000000000000000000000000000000000000002",
            "reserve_wallet": "0x0000000000000000000000000000000000000003"
        },
        "steps": [
            { "op": "fund", "asset": "RWD", "to": "0x0000000000000000000000000000000000000002", "amount": 5000 },
            { "op": "add_partner", "caller": "0x0000000000000000000000000000000000000001",
              "name": "shop", "description": "", "referral_link": "",
              "wallet": "0x0000000000000000000000000000000000000020" },
            { "op": "add_partner", "caller": "0x0000000000000000000000000000000000000001",
              "name": "blog", "description": "", "referral_link": "",
              "wallet": "0x0000000000000000000000000000000000000021" },
            { "op": "set_referrer_bonus_percent", "caller": "0x0000000000000000000000000000000000000001", "percent": 10 },
            { "op": "register_user", "caller": "0x0000000000000000000000000000000000000001",
              "user": "0x0000000000000000000000000000000000000010", "referrer_id": 2 },
            { "op": "purchase", "caller": "0x0000000000000000000000000000000000000001",
              "user": "0x0000000000000000000000000000000000000010", "amount": 100000, "partner_id": 1 },
            { "op": "purchase", "caller": "0x0000000000000000000000000000000000000009",
              "user": "0x0000000000000000000000000000000000000010", "amount": 100000, "partner_id": 1 }
        ]
    }"#;

    #[test]
    fn runs_scripted_steps() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        let report = scenario.run().unwrap();
        assert_eq!(report.steps.len(), 7);
        assert!(report.steps[..6].iter().all(|s| s.outcome.is_accepted()));

        match &report.steps[5].outcome {
            StepOutcome::Accepted { receipt, events } => {
                let receipt = receipt.as_ref().unwrap();
                assert_eq!(receipt.total_cashback, 1_000);
                assert_eq!(receipt.referrer_id, Some(2));
                assert_eq!(events.len(), 4);
            }
            other => panic!("purchase rejected: {other:?}"),
        }
        assert!(matches!(
            &report.steps[6].outcome,
            StepOutcome::Rejected { reason } if reason.contains("not the owner")
        ));
        assert_eq!(report.snapshot.pool_balance, 4_000);
    }

    #[test]
    fn invalid_settings_abort_the_run() {
        let scenario = Scenario {
            settings: Settings::default(),
            steps: vec![],
        };
        assert!(matches!(scenario.run(), Err(ScenarioError::Settings(_))));
    }
}
