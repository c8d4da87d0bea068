use crate::error::{HdError, Result};
use crate::network::Network;
use crypto_utils::{
    base58::{base58_check_decode, base58_check_encode},
    hash::hash160,
    hmac::hmac_sha512,
};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use tracing::warn;

/// Index offset for hardened children (index >= 0x80000000) i.e., 0x80000000 = 2³¹
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Upper bound on consecutive indices tried by [`ExtendedKey::derive_next_valid`].
pub const MAX_CHILD_ATTEMPTS: u32 = 16;

const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";
const SERIALIZED_LEN: usize = 78;

pub fn is_hardened(index: u32) -> bool {
    index >= HARDENED_OFFSET
}

/// One node of a BIP-32 tree.
///
/// Holds the private scalar when available; a neutered node carries only the
/// public key and can still derive non-hardened children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedKey {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
    chain_code: [u8; 32],
    private_key: Option<SecretKey>,
    public_key: PublicKey,
    network: Network,
}

fn split_hmac(i: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut il = [0u8; 32];
    let mut ir = [0u8; 32];
    il.copy_from_slice(&i[..32]);
    ir.copy_from_slice(&i[32..]);
    (il, ir)
}

impl ExtendedKey {
    /// Master key from a 16..=64 byte seed: HMAC-SHA512("Bitcoin seed", seed).
    pub fn new_master(secp: &Secp256k1<All>, seed: &[u8], network: Network) -> Result<Self> {
        if !(16..=64).contains(&seed.len()) {
            return Err(HdError::InvalidSeedLength(seed.len()));
        }
        let (il, chain_code) = split_hmac(&hmac_sha512(MASTER_HMAC_KEY, &[seed]));
        let private_key = SecretKey::from_slice(&il).map_err(|_| HdError::InvalidMasterKey)?;
        Ok(ExtendedKey {
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_index: 0,
            chain_code,
            private_key: Some(private_key),
            public_key: PublicKey::from_secret_key(secp, &private_key),
            network,
        })
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_index(&self) -> u32 {
        self.child_index
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn private_key(&self) -> Option<&SecretKey> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_private(&self) -> bool {
        self.private_key.is_some()
    }

    /// HASH160(compressed pubkey)[..4]
    pub fn fingerprint(&self) -> [u8; 4] {
        let mut fp = [0u8; 4];
        fp.copy_from_slice(&hash160(&self.public_key.serialize())[..4]);
        fp
    }

    /// Public-only copy of this node.
    pub fn neuter(&self) -> ExtendedKey {
        ExtendedKey {
            private_key: None,
            ..self.clone()
        }
    }

    /// CKDpriv for private nodes, CKDpub for neutered ones.
    pub fn derive_child(&self, secp: &Secp256k1<All>, index: u32) -> Result<Self> {
        let depth = self.depth.checked_add(1).ok_or(HdError::DepthExceeded)?;
        let index_bytes = index.to_be_bytes();

        let i = if is_hardened(index) {
            let parent = self.private_key.ok_or(HdError::PrivateKeyRequired)?;
            let secret = parent.secret_bytes();
            hmac_sha512(&self.chain_code, &[&[0u8][..], &secret[..], &index_bytes[..]])
        } else {
            let serialized = self.public_key.serialize();
            hmac_sha512(&self.chain_code, &[&serialized[..], &index_bytes[..]])
        };
        let (il, chain_code) = split_hmac(&i);

        // parse256(IL) >= n is invalid; so is a zero scalar or the point at infinity.
        let tweak = Scalar::from_be_bytes(il).map_err(|_| HdError::InvalidChildKey(index))?;
        let (private_key, public_key) = match self.private_key {
            Some(parent) => {
                let child = parent
                    .add_tweak(&tweak)
                    .map_err(|_| HdError::InvalidChildKey(index))?;
                (Some(child), PublicKey::from_secret_key(secp, &child))
            }
            None => {
                let child = self
                    .public_key
                    .add_exp_tweak(secp, &tweak)
                    .map_err(|_| HdError::InvalidChildKey(index))?;
                (None, child)
            }
        };

        Ok(ExtendedKey {
            depth,
            parent_fingerprint: self.fingerprint(),
            child_index: index,
            chain_code,
            private_key,
            public_key,
            network: self.network,
        })
    }

    /// Derives `index`, moving on to the following indices while the result is
    /// an invalid key. Never crosses between the normal and hardened ranges.
    /// Returns the index that was actually used.
    pub fn derive_next_valid(&self, secp: &Secp256k1<All>, index: u32) -> Result<(u32, Self)> {
        retry_child_indices(index, |candidate| self.derive_child(secp, candidate))
    }

    /// Applies `derive_child` for every index in order; the first failure aborts.
    pub fn derive_path(&self, secp: &Secp256k1<All>, path: &[u32]) -> Result<Self> {
        path.iter()
            .try_fold(self.clone(), |key, &index| key.derive_child(secp, index))
    }

    /// BIP-32 serialization (xprv/xpub, tprv/tpub).
    pub fn to_base58(&self) -> String {
        // version (4) | depth (1) | parent_fp (4) | child_index (4) | chain_code (32) | key_data (33)
        let mut payload = Vec::with_capacity(SERIALIZED_LEN);
        match &self.private_key {
            Some(sk) => {
                payload.extend(self.network.xprv_version());
                push_common(&mut payload, self);
                payload.push(0u8);
                payload.extend(sk.secret_bytes());
            }
            None => {
                payload.extend(self.network.xpub_version());
                push_common(&mut payload, self);
                payload.extend(self.public_key.serialize());
            }
        }
        base58_check_encode(&payload)
    }

    pub fn from_base58(secp: &Secp256k1<All>, s: &str) -> Result<Self> {
        let data = base58_check_decode(s).map_err(HdError::from)?;
        if data.len() != SERIALIZED_LEN {
            return Err(HdError::InvalidLength);
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&data[0..4]);
        let (network, is_private) = [Network::Mainnet, Network::Testnet]
            .into_iter()
            .find_map(|n| {
                if n.xprv_version() == version {
                    Some((n, true))
                } else if n.xpub_version() == version {
                    Some((n, false))
                } else {
                    None
                }
            })
            .ok_or(HdError::InvalidVersion)?;

        let depth = data[4];
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&data[5..9]);
        let mut index_bytes = [0u8; 4];
        index_bytes.copy_from_slice(&data[9..13]);
        let child_index = u32::from_be_bytes(index_bytes);
        if depth == 0 && (parent_fingerprint != [0u8; 4] || child_index != 0) {
            return Err(HdError::InvalidKeyData);
        }
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        let key_data = &data[45..78];
        let (private_key, public_key) = if is_private {
            if key_data[0] != 0 {
                return Err(HdError::InvalidKeyData);
            }
            let sk = SecretKey::from_slice(&key_data[1..]).map_err(|_| HdError::InvalidKeyData)?;
            (Some(sk), PublicKey::from_secret_key(secp, &sk))
        } else {
            let pk = PublicKey::from_slice(key_data).map_err(|_| HdError::InvalidKeyData)?;
            (None, pk)
        };

        Ok(ExtendedKey {
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            private_key,
            public_key,
            network,
        })
    }
}

/// Calls `derive` on `index`, then on following indices of the same
/// hardness while it reports an invalid child. On exhaustion the error
/// names the last index actually tried.
fn retry_child_indices<T>(
    index: u32,
    mut derive: impl FnMut(u32) -> Result<T>,
) -> Result<(u32, T)> {
    let hardened = is_hardened(index);
    let mut candidate = index;
    for attempt in 1..=MAX_CHILD_ATTEMPTS {
        match derive(candidate) {
            Err(HdError::InvalidChildKey(_)) => {
                warn!(index = candidate, "invalid child key, skipping to next index");
                if attempt == MAX_CHILD_ATTEMPTS {
                    break;
                }
                candidate = match candidate.checked_add(1) {
                    Some(next) if is_hardened(next) == hardened => next,
                    _ => break,
                };
            }
            other => return other.map(|key| (candidate, key)),
        }
    }
    Err(HdError::InvalidChildKey(candidate))
}

fn push_common(payload: &mut Vec<u8>, key: &ExtendedKey) {
    payload.push(key.depth);
    payload.extend(key.parent_fingerprint);
    payload.extend(key.child_index.to_be_bytes());
    payload.extend(key.chain_code);
}
