use crate::types::OutPoint;
use hdwallet::{HdError, Network};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("insufficient funds: have {available} sats, need {required} sats (including fee)")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("previous output {0} missing from the prevout index")]
    PrevOutputMissing(OutPoint),

    #[error("outpoint {0} is spent more than once")]
    DuplicateOutpoint(OutPoint),

    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    #[error("input index {index} out of range for {inputs} inputs")]
    InputOutOfRange { index: usize, inputs: usize },

    #[error("input {input} spends an unsupported script")]
    UnsupportedScript { input: usize },

    #[error("key does not control the output spent by input {input}")]
    KeyMismatch { input: usize },

    #[error("{keys} keys supplied for {inputs} inputs")]
    KeyCountMismatch { keys: usize, inputs: usize },

    #[error("signature check failed for input {input}: {reason}")]
    InvalidSignature { input: usize, reason: String },

    #[error("sighash type {0:#04x} is not valid here")]
    InvalidSighashType(u8),

    #[error("transaction has no payment outputs")]
    NoPayments,

    #[error("amount overflow")]
    AmountOverflow,

    #[error("amount {0} sats exceeds the 21 million BTC supply")]
    AmountOutOfRange(u64),

    #[error("address is for {found}, expected {expected}")]
    NetworkMismatch { expected: Network, found: Network },

    #[error(transparent)]
    Key(#[from] HdError),

    /// Failure reported by a fee, UTXO or broadcast collaborator.
    #[error("upstream collaborator failed: {0:#}")]
    Upstream(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TxError>;
