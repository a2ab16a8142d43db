use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod address;

pub use address::{Address, ParseAddressError, ADDRESS_LEN};

pub type AssetId = String;
pub type Amount = u64;

/// Conventional burn destination: value sent here is out of circulation.
pub const BURN_SINK: Address = Address::new([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xde, 0xad,
]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{holder} holds {available} {asset}, {requested} requested")]
    InsufficientFunds {
        asset: AssetId,
        holder: Address,
        available: Amount,
        requested: Amount,
    },
    #[error("transfer to the null address")]
    ZeroAddress,
    #[error("crediting {amount} {asset} to {holder} overflows its balance")]
    Overflow {
        asset: AssetId,
        holder: Address,
        amount: Amount,
    },
}

/// The value-transfer collaborator the distribution engine settles against.
///
/// `balance_of` is authoritative: callers check it before committing a batch
/// of transfers so that no batch is ever applied partially. A failed
/// `transfer` leaves every balance untouched.
pub trait ValueTransfer {
    fn balance_of(&self, asset: &str, holder: &Address) -> Amount;

    /// Whether `holder` can receive `amount` more of `asset`.
    fn can_credit(&self, asset: &str, holder: &Address, amount: Amount) -> bool {
        self.balance_of(asset, holder).checked_add(amount).is_some()
    }

    fn transfer(
        &mut self,
        asset: &str,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Mint {
        asset: AssetId,
        to: Address,
        amount: Amount,
    },
    Transfer {
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub height: u64,
    pub balances: BTreeMap<AssetId, BTreeMap<Address, Amount>>,
    #[serde(with = "hex_root")]
    pub merkle_root: [u8; 32],
}

/// In-memory multi-asset balance book.
#[derive(Default, Clone, Debug)]
pub struct LedgerState {
    pub height: u64,
    balances: BTreeMap<AssetId, BTreeMap<Address, Amount>>,
    pub events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn credit_account(
        &mut self,
        asset: &str,
        account: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let balance = self
            .balances
            .entry(asset.to_string())
            .or_default()
            .entry(*account)
            .or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                asset: asset.to_string(),
                holder: *account,
                amount,
            })?;
        Ok(())
    }

    fn debit_account(
        &mut self,
        asset: &str,
        account: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(asset, account);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                asset: asset.to_string(),
                holder: *account,
                available,
                requested: amount,
            });
        }
        if let Some(balance) = self
            .balances
            .get_mut(asset)
            .and_then(|book| book.get_mut(account))
        {
            *balance -= amount;
        }
        Ok(())
    }

    /// Credits `amount` of `asset` to `to` out of thin air. Models value
    /// arriving from outside the ledger (deposits, pool top-ups).
    pub fn mint(&mut self, asset: &str, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.credit_account(asset, to, amount)?;
        self.height += 1;
        self.events.push(LedgerEvent::Mint {
            asset: asset.to_string(),
            to: *to,
            amount,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            height: self.height,
            balances: self.balances.clone(),
            merkle_root: compute_merkle_root(&self.balances),
        }
    }
}

impl ValueTransfer for LedgerState {
    fn balance_of(&self, asset: &str, holder: &Address) -> Amount {
        self.balances
            .get(asset)
            .and_then(|book| book.get(holder))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &str,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        // Self-transfers leave the balance unchanged and cannot overflow.
        if from != to && !self.can_credit(asset, to, amount) {
            return Err(LedgerError::Overflow {
                asset: asset.to_string(),
                holder: *to,
                amount,
            });
        }
        self.debit_account(asset, from, amount)?;
        self.credit_account(asset, to, amount)?;
        self.height += 1;
        self.events.push(LedgerEvent::Transfer {
            asset: asset.to_string(),
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }
}

fn compute_merkle_root(balances: &BTreeMap<AssetId, BTreeMap<Address, Amount>>) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    for (asset, book) in balances {
        for (holder, amount) in book {
            let mut hasher = Sha256::new();
            hasher.update(b"bal");
            hasher.update(asset.as_bytes());
            hasher.update(holder.as_bytes());
            hasher.update(amount.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"cashback-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(&encoded, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}
