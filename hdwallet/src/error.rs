use crypto_utils::Base58Error;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HdError {
    #[error("seed length {0} outside 16..=64 bytes")]
    InvalidSeedLength(usize),
    #[error("seed produced an invalid master key")]
    InvalidMasterKey,
    #[error("hardened derivation requires a private key")]
    PrivateKeyRequired,
    /// Retryable with the next index, see [`crate::ExtendedKey::derive_next_valid`].
    #[error("child index {0} yields an invalid key")]
    InvalidChildKey(u32),
    #[error("maximum derivation depth exceeded")]
    DepthExceeded,
    #[error("invalid extended key data")]
    InvalidKeyData,
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid base58 encoding")]
    InvalidBase58,
    #[error("unknown extended key version")]
    InvalidVersion,
    #[error("invalid derivation path")]
    InvalidDerivationPath,
    #[error("unsupported purpose {0}")]
    UnsupportedPurpose(u32),
    #[error("invalid address format: {0}")]
    InvalidAddressFormat(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("unsupported witness version {0}")]
    UnsupportedWitnessVersion(u8),
    #[error("invalid WIF private key")]
    InvalidWif,
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("unknown network {0:?}")]
    UnknownNetwork(String),
}

impl From<Base58Error> for HdError {
    fn from(e: Base58Error) -> Self {
        match e {
            Base58Error::InvalidChecksum => HdError::ChecksumMismatch,
            Base58Error::InvalidLength => HdError::InvalidLength,
            Base58Error::InvalidCharacter(_) => HdError::InvalidBase58,
        }
    }
}

pub type Result<T> = std::result::Result<T, HdError>;
