//! Interfaces to the services a wallet talks to. Implementations live with
//! the caller; their failures stay opaque and surface as
//! [`TxError::Upstream`](crate::TxError::Upstream).

use crate::fees::{FeeTier, RecommendedFees};
use crate::types::{Txid, Utxo};
use hdwallet::Address;

pub trait FeeRateSource {
    /// Fee rate in sat/vB for `tier`.
    fn fee_rate(&self, tier: FeeTier) -> anyhow::Result<u64>;
}

pub trait UtxoSource {
    fn utxos(&self, address: &Address) -> anyhow::Result<Vec<Utxo>>;
}

pub trait Broadcaster {
    /// Submits a hex-encoded transaction and returns the txid the node
    /// reports.
    fn broadcast(&self, raw_tx_hex: &str) -> anyhow::Result<Txid>;
}

/// A fetched recommendation used as a fixed source.
impl FeeRateSource for RecommendedFees {
    fn fee_rate(&self, tier: FeeTier) -> anyhow::Result<u64> {
        Ok(self.rate_for(tier))
    }
}

/// Everything [`send_payment`](crate::wallet::send_payment) needs from the
/// outside world.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub fees: &'a dyn FeeRateSource,
    pub utxos: &'a dyn UtxoSource,
    pub broadcaster: &'a dyn Broadcaster,
}
