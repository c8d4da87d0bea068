use crate::error::{Result, TxError};
use hdwallet::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Largest amount, in satoshis, a single value may carry.
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Transaction id in internal (hash) byte order. Displayed and parsed
/// reversed, the way block explorers print it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

impl FromStr for Txid {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| TxError::SerializationFailure(format!("txid {s:?}: {e}")))?;
        let mut txid: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TxError::SerializationFailure(format!("txid {s:?}: expected 32 bytes")))?;
        txid.reverse();
        Ok(Txid(txid))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        OutPoint { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// An unspent output the wallet may select.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl Utxo {
    pub fn txout(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}

/// One entry of an Esplora `/address/:addr/utxo` response. The locking
/// script is not part of the document; it comes from the queried address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsploraUtxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
}

impl EsploraUtxo {
    pub fn into_utxo(self, address: &Address) -> Utxo {
        Utxo {
            outpoint: OutPoint::new(self.txid, self.vout),
            value: self.value,
            script_pubkey: address.script_pubkey().to_vec(),
        }
    }

    /// Parses a full response body into UTXOs locked to `address`.
    pub fn parse_list(json: &str, address: &Address) -> Result<Vec<Utxo>> {
        let entries: Vec<EsploraUtxo> = serde_json::from_str(json)
            .map_err(|e| TxError::SerializationFailure(format!("utxo list: {e}")))?;
        Ok(entries.into_iter().map(|u| u.into_utxo(address)).collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    pub fn total_output(&self) -> Result<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
            .ok_or(TxError::AmountOverflow)
    }
}

/// Outputs being spent, keyed by outpoint. Signing and verification look up
/// amounts and locking scripts here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrevOutputIndex {
    outputs: HashMap<OutPoint, TxOut>,
}

impl PrevOutputIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, outpoint: OutPoint, output: TxOut) -> Option<TxOut> {
        self.outputs.insert(outpoint, output)
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOut> {
        self.outputs.get(outpoint)
    }

    pub fn require(&self, outpoint: &OutPoint) -> Result<&TxOut> {
        self.get(outpoint)
            .ok_or(TxError::PrevOutputMissing(*outpoint))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Fails on the first input whose previous output is unknown or was
    /// already spent by an earlier input.
    pub fn check_covers(&self, tx: &Transaction) -> Result<()> {
        let mut seen = HashSet::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            self.require(&input.previous_output)?;
            if !seen.insert(input.previous_output) {
                return Err(TxError::DuplicateOutpoint(input.previous_output));
            }
        }
        Ok(())
    }

    /// Previous outputs in input order.
    pub fn spent_by<'a>(&'a self, tx: &Transaction) -> Result<Vec<&'a TxOut>> {
        tx.inputs
            .iter()
            .map(|input| self.require(&input.previous_output))
            .collect()
    }

    pub fn total_spent(&self, tx: &Transaction) -> Result<u64> {
        self.spent_by(tx)?
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
            .ok_or(TxError::AmountOverflow)
    }
}

impl<'a> FromIterator<&'a Utxo> for PrevOutputIndex {
    fn from_iter<I: IntoIterator<Item = &'a Utxo>>(iter: I) -> Self {
        PrevOutputIndex {
            outputs: iter.into_iter().map(|u| (u.outpoint, u.txout())).collect(),
        }
    }
}

impl FromIterator<Utxo> for PrevOutputIndex {
    fn from_iter<I: IntoIterator<Item = Utxo>>(iter: I) -> Self {
        PrevOutputIndex {
            outputs: iter
                .into_iter()
                .map(|u| {
                    let outpoint = u.outpoint;
                    let out = TxOut {
                        value: u.value,
                        script_pubkey: u.script_pubkey,
                    };
                    (outpoint, out)
                })
                .collect(),
        }
    }
}

/// Totals reported once a transaction is signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub txid: Txid,
    pub inputs: usize,
    pub outputs: usize,
    pub total_in: u64,
    pub total_out: u64,
    pub fee: u64,
    pub vsize: u64,
}

impl TransactionSummary {
    pub fn new(tx: &Transaction, prevouts: &PrevOutputIndex) -> Result<Self> {
        let total_in = prevouts.total_spent(tx)?;
        let total_out = tx.total_output()?;
        let fee = total_in.checked_sub(total_out).ok_or(TxError::InsufficientFunds {
            available: total_in,
            required: total_out,
        })?;
        Ok(TransactionSummary {
            txid: tx.txid(),
            inputs: tx.inputs.len(),
            outputs: tx.outputs.len(),
            total_in,
            total_out,
            fee,
            vsize: tx.vsize(),
        })
    }
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} in / {} out): {} sats in, {} sats out, fee {} sats, {} vB",
            self.txid, self.inputs, self.outputs, self.total_in, self.total_out, self.fee, self.vsize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID_HEX: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    #[test]
    fn txid_display_is_reversed() {
        let txid: Txid = TXID_HEX.parse().unwrap();
        assert_eq!(txid.0[0], 0x3b);
        assert_eq!(txid.0[31], 0x4a);
        assert_eq!(txid.to_string(), TXID_HEX);
    }

    #[test]
    fn txid_rejects_bad_length() {
        assert!(matches!(
            "abcd".parse::<Txid>(),
            Err(TxError::SerializationFailure(_))
        ));
    }

    #[test]
    fn outpoint_display() {
        let outpoint = OutPoint::new(TXID_HEX.parse().unwrap(), 7);
        assert_eq!(outpoint.to_string(), format!("{TXID_HEX}:7"));
    }

    #[test]
    fn esplora_document_parses() {
        let secp = secp256k1::Secp256k1::new();
        let secret = secp256k1::SecretKey::from_slice(&[1u8; 32]).unwrap();
        let address = Address::from_public_key(
            &secp,
            hdwallet::AddressKind::Taproot,
            &secret.public_key(&secp),
            hdwallet::Network::Testnet,
        )
        .unwrap();
        let json = format!(
            r#"[{{"txid":"{TXID_HEX}","vout":1,"status":{{"confirmed":true,"block_height":2500000}},"value":100000}}]"#
        );
        let utxos = EsploraUtxo::parse_list(&json, &address).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].value, 100_000);
        assert_eq!(utxos[0].outpoint.vout, 1);
        assert_eq!(utxos[0].outpoint.txid.to_string(), TXID_HEX);
        assert_eq!(utxos[0].script_pubkey, address.script_pubkey());
    }

    #[test]
    fn repeated_input_is_rejected() {
        let outpoint = OutPoint::new(Txid([2u8; 32]), 1);
        let index: PrevOutputIndex = [Utxo {
            outpoint,
            value: 1_000,
            script_pubkey: vec![0x51],
        }]
        .into_iter()
        .collect();
        let input = TxIn {
            previous_output: outpoint,
            script_sig: Vec::new(),
            sequence: u32::MAX,
            witness: Vec::new(),
        };
        let mut tx = Transaction {
            version: 1,
            inputs: vec![input.clone()],
            outputs: Vec::new(),
            lock_time: 0,
        };
        index.check_covers(&tx).unwrap();

        tx.inputs.push(input);
        assert!(matches!(
            index.check_covers(&tx),
            Err(TxError::DuplicateOutpoint(o)) if o == outpoint
        ));
    }

    #[test]
    fn missing_prevout_is_reported() {
        let index = PrevOutputIndex::new();
        let outpoint = OutPoint::new(Txid([1u8; 32]), 0);
        assert!(matches!(
            index.require(&outpoint),
            Err(TxError::PrevOutputMissing(o)) if o == outpoint
        ));
    }
}
