//! Cashback distribution ledger.
//!
//! Purchases made through registered partners turn a percentage of the
//! purchase amount into a cashback pool, which is split between the buyer, a
//! reserve wallet and a burn sink. A partner that referred the buyer can
//! receive part of the buyer's share.
//!
//! * [`registry`] keeps partner records.
//! * [`engine`] computes and settles distributions.
//! * [`config`] holds the percentages and deployment settings.
//! * [`access`] is the single-owner guard in front of every mutation.
//! * [`ledger`] is the in-memory value-transfer collaborator.
//! * [`service`] ties one instance together behind a lock.
//! * [`scenario`] replays scripted operations, used by the CLI.

pub mod access;
pub mod config;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod scenario;
pub mod service;

mod error;

pub use error::{CashbackError, Result};
