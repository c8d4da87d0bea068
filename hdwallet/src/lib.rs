pub mod address;
pub mod derivation;
pub mod error;
pub mod extended_key;
pub mod network;
pub mod script;
pub mod seed;
pub mod wif;

pub use address::{Address, AddressKind};
pub use derivation::{DerivationPath, Purpose};
pub use error::HdError;
pub use extended_key::{ExtendedKey, HARDENED_OFFSET};
pub use network::Network;
pub use seed::mnemonic_to_seed;
pub use wif::{Wif, decode_wif, encode_wif};

use secp256k1::Secp256k1;
use tracing::debug;

/// Everything the wallet reports for one derived receiving key.
#[derive(Clone, Debug)]
pub struct DerivedAddress {
    pub path: DerivationPath,
    pub key: ExtendedKey,
    pub private_key_wif: String,
    pub public_key_compressed_hex: String,
    pub public_key_uncompressed_hex: String,
    pub address: Address,
}

/// Derives `m/purpose'/coin_type'/account'/change/index` from `seed` and
/// encodes the key with the address kind the purpose prescribes.
pub fn derive_address(
    seed: &[u8],
    purpose: Purpose,
    coin_type: u32,
    account: u32,
    change: u32,
    index: u32,
    network: Network,
) -> Result<DerivedAddress, HdError> {
    let secp = Secp256k1::new();
    let path = DerivationPath::bip44_style(purpose, coin_type, account, change, index)?;
    let master = ExtendedKey::new_master(&secp, seed, network)?;
    let key = path.derive(&secp, &master)?;
    let secret_key = key.private_key().ok_or(HdError::PrivateKeyRequired)?;
    let public_key = key.public_key();
    let address = Address::from_public_key(&secp, purpose.address_kind(), public_key, network)?;
    debug!(%path, %address, "derived address");

    Ok(DerivedAddress {
        private_key_wif: encode_wif(secret_key, network),
        public_key_compressed_hex: hex::encode(public_key.serialize()),
        public_key_uncompressed_hex: hex::encode(public_key.serialize_uncompressed()),
        path,
        address,
        key,
    })
}
