use crate::error::{HdError, Result};
use crate::network::Network;
use crypto_utils::base58::{base58_check_decode, base58_check_encode};
use secp256k1::SecretKey;

const COMPRESSED_FLAG: u8 = 0x01;

/// A decoded Wallet Import Format key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wif {
    pub secret_key: SecretKey,
    pub network: Network,
    pub compressed: bool,
}

/// Compressed-pubkey WIF: Base58Check(prefix || key || 0x01).
pub fn encode_wif(secret_key: &SecretKey, network: Network) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.push(network.wif_prefix());
    payload.extend_from_slice(&secret_key.secret_bytes());
    payload.push(COMPRESSED_FLAG);
    base58_check_encode(&payload)
}

pub fn decode_wif(s: &str) -> Result<Wif> {
    let payload = base58_check_decode(s).map_err(HdError::from)?;
    let compressed = match payload.len() {
        33 => false,
        34 if payload[33] == COMPRESSED_FLAG => true,
        _ => return Err(HdError::InvalidWif),
    };
    let network = Network::from_wif_prefix(payload[0]).ok_or(HdError::InvalidWif)?;
    let secret_key = SecretKey::from_slice(&payload[1..33]).map_err(|_| HdError::InvalidWif)?;
    Ok(Wif {
        secret_key,
        network,
        compressed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one() -> SecretKey {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        SecretKey::from_slice(&bytes).unwrap()
    }

    /// Private key 1, compressed, mainnet.
    #[test]
    fn encode_known_key() {
        assert_eq!(
            encode_wif(&one(), Network::Mainnet),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
    }

    #[test]
    fn decode_uncompressed_and_compressed() {
        let uncompressed = decode_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf").unwrap();
        assert_eq!(uncompressed.secret_key, one());
        assert!(!uncompressed.compressed);
        assert_eq!(uncompressed.network, Network::Mainnet);

        let testnet = encode_wif(&one(), Network::Testnet);
        let decoded = decode_wif(&testnet).unwrap();
        assert!(decoded.compressed);
        assert_eq!(decoded.network, Network::Testnet);
    }

    #[test]
    fn decode_rejects_bad_input() {
        let mut wif = encode_wif(&one(), Network::Mainnet);
        let last = wif.pop().unwrap();
        wif.push(if last == 'x' { 'y' } else { 'x' });
        assert_eq!(decode_wif(&wif).unwrap_err(), HdError::ChecksumMismatch);

        // a P2PKH address has the right encoding but the wrong length
        assert_eq!(
            decode_wif("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH").unwrap_err(),
            HdError::InvalidWif
        );
    }
}
