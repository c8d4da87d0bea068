//! BIP-39 mnemonic to seed conversion, delegated to the `bip39` crate.

use crate::error::{HdError, Result};
use bip39::{Language, Mnemonic};

/// PBKDF2-HMAC-SHA512 seed for an English mnemonic and optional passphrase.
/// The word list and checksum are validated first.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<[u8; 64]> {
    let mnemonic = Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| HdError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_seed(passphrase))
}
