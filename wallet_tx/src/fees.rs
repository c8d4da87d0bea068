use crate::error::{Result, TxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confirmation-speed tiers of the mempool.space recommendation endpoint.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeTier {
    Fastest,
    HalfHour,
    #[default]
    Hour,
    Economy,
    Minimum,
}

impl FeeTier {
    pub const ALL: [FeeTier; 5] = [
        FeeTier::Fastest,
        FeeTier::HalfHour,
        FeeTier::Hour,
        FeeTier::Economy,
        FeeTier::Minimum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeeTier::Fastest => "fastest",
            FeeTier::HalfHour => "halfHour",
            FeeTier::Hour => "hour",
            FeeTier::Economy => "economy",
            FeeTier::Minimum => "minimum",
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeTier {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        FeeTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TxError::SerializationFailure(format!("unknown fee tier {s:?}")))
    }
}

/// Body of `GET /api/v1/fees/recommended`, in sat/vB.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: u64,
    pub half_hour_fee: u64,
    pub hour_fee: u64,
    pub economy_fee: u64,
    pub minimum_fee: u64,
}

impl RecommendedFees {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TxError::SerializationFailure(format!("fee recommendation: {e}")))
    }

    pub fn rate_for(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::Fastest => self.fastest_fee,
            FeeTier::HalfHour => self.half_hour_fee,
            FeeTier::Hour => self.hour_fee,
            FeeTier::Economy => self.economy_fee,
            FeeTier::Minimum => self.minimum_fee,
        }
    }
}
