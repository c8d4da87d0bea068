use crate::builder::{
    DEFAULT_LOCK_TIME, DEFAULT_VERSION, LinearSizeEstimator, SEQUENCE_FINAL, SizeEstimator,
    TxTemplate, VirtualSizeEstimator,
};
use crate::error::{Result, TxError};
use crate::fees::FeeTier;
use crate::sighash::SighashType;
use hdwallet::{AddressKind, Network};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// 180 vB per input, 34 per output, 10 overhead.
    #[default]
    Linear,
    /// BIP-141 virtual size per spend kind.
    Vsize,
}

/// Knobs for building and sending a transaction. Every field is optional in
/// JSON; missing ones take the defaults below.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    pub network: Network,
    pub fee_tier: FeeTier,
    pub version: i32,
    pub lock_time: u32,
    pub sequence: u32,
    pub sighash: SighashType,
    pub estimator: EstimatorKind,
    /// Address kind `send_payment` derives for the spending key.
    pub spend_kind: AddressKind,
}

impl Default for TxConfig {
    fn default() -> Self {
        TxConfig {
            network: Network::Testnet,
            fee_tier: FeeTier::Hour,
            version: DEFAULT_VERSION,
            lock_time: DEFAULT_LOCK_TIME,
            sequence: SEQUENCE_FINAL,
            sighash: SighashType::Default,
            estimator: EstimatorKind::Linear,
            spend_kind: AddressKind::Taproot,
        }
    }
}

impl TxConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TxError::SerializationFailure(format!("config: {e}")))
    }

    pub fn template(&self) -> TxTemplate {
        TxTemplate {
            version: self.version,
            lock_time: self.lock_time,
            sequence: self.sequence,
        }
    }

    /// The configured estimator for a wallet spending from and changing to
    /// `kind`.
    pub fn estimator(&self, kind: AddressKind) -> Box<dyn SizeEstimator> {
        match self.estimator {
            EstimatorKind::Linear => Box::new(LinearSizeEstimator::default()),
            EstimatorKind::Vsize => Box::new(VirtualSizeEstimator::uniform(kind)),
        }
    }
}
