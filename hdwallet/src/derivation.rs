use crate::{
    HdError,
    address::AddressKind,
    extended_key::{ExtendedKey, HARDENED_OFFSET},
};
use secp256k1::{All, Secp256k1};
use std::fmt;
use std::str::FromStr;

/// A BIP-32 derivation path (e.g., "m/44'/0'/0'/0/1").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(pub Vec<u32>);

/// First path level of the BIP-44 family; selects the address encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// BIP-44, legacy P2PKH
    Bip44,
    /// BIP-49, P2SH-wrapped P2WPKH
    Bip49,
    /// BIP-84, native segwit v0
    Bip84,
    /// BIP-86, single-key taproot
    Bip86,
}

impl Purpose {
    pub fn number(self) -> u32 {
        match self {
            Purpose::Bip44 => 44,
            Purpose::Bip49 => 49,
            Purpose::Bip84 => 84,
            Purpose::Bip86 => 86,
        }
    }

    pub fn address_kind(self) -> AddressKind {
        match self {
            Purpose::Bip44 => AddressKind::Legacy,
            Purpose::Bip49 => AddressKind::P2shSegwit,
            Purpose::Bip84 => AddressKind::SegwitV0,
            Purpose::Bip86 => AddressKind::Taproot,
        }
    }
}

impl TryFrom<u32> for Purpose {
    type Error = HdError;

    fn try_from(value: u32) -> Result<Self, HdError> {
        match value {
            44 => Ok(Purpose::Bip44),
            49 => Ok(Purpose::Bip49),
            84 => Ok(Purpose::Bip84),
            86 => Ok(Purpose::Bip86),
            other => Err(HdError::UnsupportedPurpose(other)),
        }
    }
}

fn harden(index: u32) -> Result<u32, HdError> {
    if index >= HARDENED_OFFSET {
        return Err(HdError::InvalidDerivationPath);
    }
    Ok(index + HARDENED_OFFSET)
}

impl FromStr for DerivationPath {
    type Err = HdError;

    /// Parses a path string like "m/44'/0'/0'/0/0" or "44h/0h/0h/0/0".
    fn from_str(s: &str) -> Result<Self, HdError> {
        let s = s.trim();
        let body = match s {
            "m" | "M" | "" => return Ok(DerivationPath(Vec::new())),
            _ => s
                .strip_prefix("m/")
                .or_else(|| s.strip_prefix("M/"))
                .unwrap_or(s),
        };

        body.split('/')
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                    Some(stripped) => (stripped, true),
                    None => (part, false),
                };
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(HdError::InvalidDerivationPath);
                }
                let index: u32 = digits.parse().map_err(|_| HdError::InvalidDerivationPath)?;
                if hardened {
                    harden(index)
                } else if index >= HARDENED_OFFSET {
                    Err(HdError::InvalidDerivationPath)
                } else {
                    Ok(index)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(DerivationPath)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &i in &self.0 {
            if i >= HARDENED_OFFSET {
                write!(f, "/{}'", i - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{i}")?;
            }
        }
        Ok(())
    }
}

impl AsRef<[u32]> for DerivationPath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl DerivationPath {
    /// `m/purpose'/coin_type'/account'/change/address_index`
    pub fn bip44_style(
        purpose: Purpose,
        coin_type: u32,
        account: u32,
        change: u32,
        address_index: u32,
    ) -> Result<Self, HdError> {
        if change >= HARDENED_OFFSET || address_index >= HARDENED_OFFSET {
            return Err(HdError::InvalidDerivationPath);
        }
        Ok(DerivationPath(vec![
            harden(purpose.number())?,
            harden(coin_type)?,
            harden(account)?,
            change,
            address_index,
        ]))
    }

    /// Purpose encoded in the first level, if it is one of the BIP-44 family.
    pub fn purpose(&self) -> Option<Purpose> {
        let first = *self.0.first()?;
        if first < HARDENED_OFFSET {
            return None;
        }
        Purpose::try_from(first - HARDENED_OFFSET).ok()
    }

    /// Derive along this path from `root` (private or public).
    pub fn derive(&self, secp: &Secp256k1<All>, root: &ExtendedKey) -> Result<ExtendedKey, HdError> {
        root.derive_path(secp, &self.0)
    }
}
