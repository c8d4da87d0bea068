use crate::error::{HdError, Result};
use crate::network::Network;
use crate::script;
use bech32::primitives::decode::UncheckedHrpstring;
use bech32::{Bech32, Bech32m, Fe32, segwit};
use crypto_utils::{
    Base58Error,
    base58::{base58_check_decode, base58_check_encode},
    hash::{hash160, tagged_hash},
};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of single-key output types the wallet handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// P2PKH
    Legacy,
    /// P2SH wrapping a P2WPKH redeem script
    P2shSegwit,
    /// P2WPKH
    SegwitV0,
    /// P2TR, key path only
    Taproot,
}

/// An encoded address together with the locking script it stands for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    kind: AddressKind,
    network: Network,
    encoded: String,
    script_pubkey: Vec<u8>,
}

/// TapTweak scalar for a key-path-only output: tagged_hash("TapTweak", x(P)).
pub fn tap_tweak(internal_key: &XOnlyPublicKey) -> Result<Scalar> {
    let hash = tagged_hash("TapTweak", &internal_key.serialize());
    Scalar::from_be_bytes(hash).map_err(|_| HdError::InvalidKeyData)
}

/// Output key Q = lift_x(P) + tap_tweak(P)·G, with no script tree.
pub fn taproot_output_key(secp: &Secp256k1<All>, internal_key: &PublicKey) -> Result<XOnlyPublicKey> {
    let (internal, _) = internal_key.x_only_public_key();
    let tweak = tap_tweak(&internal)?;
    let (output, _parity) = internal
        .add_tweak(secp, &tweak)
        .map_err(|_| HdError::InvalidKeyData)?;
    Ok(output)
}

fn encode_segwit(network: Network, version: Fe32, program: &[u8]) -> Result<String> {
    segwit::encode(network.hrp(), version, program)
        .map_err(|e| HdError::InvalidAddressFormat(e.to_string()))
}

fn encode_base58(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    base58_check_encode(&payload)
}

impl Address {
    pub fn from_public_key(
        secp: &Secp256k1<All>,
        kind: AddressKind,
        public_key: &PublicKey,
        network: Network,
    ) -> Result<Self> {
        let pubkey_hash = hash160(&public_key.serialize());
        let (encoded, script_pubkey) = match kind {
            AddressKind::Legacy => (
                encode_base58(network.p2pkh_version(), &pubkey_hash),
                script::p2pkh(&pubkey_hash),
            ),
            AddressKind::P2shSegwit => {
                let redeem_hash = hash160(&script::p2wpkh(&pubkey_hash));
                (
                    encode_base58(network.p2sh_version(), &redeem_hash),
                    script::p2sh(&redeem_hash),
                )
            }
            AddressKind::SegwitV0 => (
                encode_segwit(network, segwit::VERSION_0, &pubkey_hash)?,
                script::p2wpkh(&pubkey_hash),
            ),
            AddressKind::Taproot => {
                let output_key = taproot_output_key(secp, public_key)?.serialize();
                (
                    encode_segwit(network, segwit::VERSION_1, &output_key)?,
                    script::p2tr(&output_key),
                )
            }
        };
        Ok(Address {
            kind,
            network,
            encoded,
            script_pubkey,
        })
    }

    /// Parses `s` for `network`, validating checksum, prefix and witness version.
    pub fn decode(s: &str, network: Network) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let is_segwit = [Network::Mainnet, Network::Testnet]
            .iter()
            .any(|n| lower.starts_with(&format!("{}1", n.hrp())));
        if is_segwit {
            Self::decode_segwit(s, network)
        } else {
            Self::decode_base58(s, network)
        }
    }

    fn decode_base58(s: &str, network: Network) -> Result<Self> {
        let payload = base58_check_decode(s).map_err(|e| match e {
            Base58Error::InvalidChecksum => HdError::ChecksumMismatch,
            other => HdError::InvalidAddressFormat(other.to_string()),
        })?;
        if payload.len() != 21 {
            return Err(HdError::InvalidAddressFormat(format!(
                "base58 payload of {} bytes",
                payload.len()
            )));
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        let (kind, script_pubkey) = match payload[0] {
            v if v == network.p2pkh_version() => (AddressKind::Legacy, script::p2pkh(&hash)),
            v if v == network.p2sh_version() => (AddressKind::P2shSegwit, script::p2sh(&hash)),
            v => {
                return Err(HdError::InvalidAddressFormat(format!(
                    "version byte {v:#04x} is not valid on {network}"
                )));
            }
        };
        Ok(Address {
            kind,
            network,
            encoded: s.to_string(),
            script_pubkey,
        })
    }

    fn decode_segwit(s: &str, network: Network) -> Result<Self> {
        let unchecked =
            UncheckedHrpstring::new(s).map_err(|e| HdError::InvalidAddressFormat(e.to_string()))?;
        if unchecked.hrp() != network.hrp() {
            return Err(HdError::InvalidAddressFormat(format!(
                "prefix {} is not valid on {network}",
                unchecked.hrp()
            )));
        }
        if !unchecked.has_valid_checksum::<Bech32>() && !unchecked.has_valid_checksum::<Bech32m>()
        {
            return Err(HdError::ChecksumMismatch);
        }

        let (_, version, program) =
            segwit::decode(s).map_err(|e| HdError::InvalidAddressFormat(e.to_string()))?;
        let (kind, script_pubkey) = match (version.to_u8(), program.len()) {
            (0, 20) => {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(&program);
                (AddressKind::SegwitV0, script::p2wpkh(&hash))
            }
            (1, 32) => {
                let mut key = [0u8; 32];
                key.copy_from_slice(&program);
                (AddressKind::Taproot, script::p2tr(&key))
            }
            (0 | 1, len) => {
                return Err(HdError::InvalidAddressFormat(format!(
                    "witness v{} program of {len} bytes",
                    version.to_u8()
                )));
            }
            (v, _) => return Err(HdError::UnsupportedWitnessVersion(v)),
        };
        Ok(Address {
            kind,
            network,
            encoded: encode_segwit(network, version, &program)?,
            script_pubkey,
        })
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn script_pubkey(&self) -> &[u8] {
        &self.script_pubkey
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}
