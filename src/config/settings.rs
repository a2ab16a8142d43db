use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use super::DistributionConfig;
use crate::{
    error::CashbackError,
    ledger::{Address, AssetId, BURN_SINK},
};

pub const DEFAULT_REWARD_ASSET: &str = "RWD";
pub const DEFAULT_LOG_FILTER: &str = "cashback=info";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings: {0}")]
    Io(#[from] io::Error),
    #[error("cannot parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Deployment parameters of one contract instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Deploying identity; becomes owner of registry and engine.
    pub owner: Address,
    /// Account holding the reward pool on the ledger.
    pub engine_account: Address,
    pub reward_asset: AssetId,
    pub reserve_wallet: Address,
    pub burn_sink: Address,
    pub distribution: DistributionConfig,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner: Address::ZERO,
            engine_account: Address::ZERO,
            reward_asset: DEFAULT_REWARD_ASSET.to_string(),
            reserve_wallet: Address::ZERO,
            burn_sink: BURN_SINK,
            distribution: DistributionConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let bytes = fs::read(path)?;
        let settings: Settings = serde_json::from_slice(&bytes)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("owner", &self.owner),
            ("engine_account", &self.engine_account),
            ("reserve_wallet", &self.reserve_wallet),
            ("burn_sink", &self.burn_sink),
        ];
        for (name, address) in required {
            if address.is_zero() {
                return Err(SettingsError::Invalid(format!("{name} must not be the null address")));
            }
        }
        if self.reward_asset.trim().is_empty() {
            return Err(SettingsError::Invalid("reward_asset must not be empty".into()));
        }
        self.distribution
            .validate()
            .map_err(|err: CashbackError| SettingsError::Invalid(err.to_string()))
    }

    /// Template with the given identities and default percentages.
    pub fn template(owner: Address, engine_account: Address, reserve_wallet: Address) -> Self {
        Self {
            owner,
            engine_account,
            reserve_wallet,
            ..Self::default()
        }
    }
}
