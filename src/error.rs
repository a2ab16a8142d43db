use crate::{
    ledger::{Address, Amount, AssetId, LedgerError},
    registry::PartnerId,
};

/// Rejection reasons for core operations. Every variant means the operation
/// had no effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CashbackError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("partner id {0} is out of range")]
    InvalidPartnerId(PartnerId),

    #[error("partner {0} is inactive or unknown")]
    InactiveOrUnknownPartner(PartnerId),

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error("reward pool holds {available}, distribution needs {required}")]
    InsufficientPoolBalance { available: Amount, required: Amount },

    #[error("engine holds {available} {asset}, {requested} requested")]
    InsufficientBalance {
        asset: AssetId,
        available: Amount,
        requested: Amount,
    },

    #[error("caller {0} is not the owner")]
    Unauthorized(Address),

    #[error("reward asset {0} cannot be withdrawn as a stray token")]
    ForbiddenAssetWithdrawal(AssetId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T, E = CashbackError> = std::result::Result<T, E>;
