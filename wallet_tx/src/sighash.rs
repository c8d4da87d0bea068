//! Signature hashes: the legacy algorithm, BIP-143 for segwit v0 and the
//! BIP-341 key-path message for taproot.

use crate::encode::{serialize_legacy, write_outpoint, write_txout, write_var_bytes};
use crate::error::{Result, TxError};
use crate::types::{PrevOutputIndex, Transaction, TxIn, TxOut};
use crypto_utils::hash::{sha256, sha256d, tagged_hash};
use serde::{Deserialize, Serialize};

const ANYONECANPAY: u8 = 0x80;

/// Hash type committed to by a signature.
///
/// `Default` exists only for taproot, where it behaves like `All` but the
/// signature carries no trailing hash-type byte. ECDSA signing treats it as
/// `All`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SighashType {
    #[default]
    Default,
    All,
    None,
    Single,
    AllPlusAnyoneCanPay,
    NonePlusAnyoneCanPay,
    SinglePlusAnyoneCanPay,
}

impl SighashType {
    pub fn to_u8(self) -> u8 {
        match self {
            SighashType::Default => 0x00,
            SighashType::All => 0x01,
            SighashType::None => 0x02,
            SighashType::Single => 0x03,
            SighashType::AllPlusAnyoneCanPay => 0x81,
            SighashType::NonePlusAnyoneCanPay => 0x82,
            SighashType::SinglePlusAnyoneCanPay => 0x83,
        }
    }

    pub fn from_u8(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x00 => SighashType::Default,
            0x01 => SighashType::All,
            0x02 => SighashType::None,
            0x03 => SighashType::Single,
            0x81 => SighashType::AllPlusAnyoneCanPay,
            0x82 => SighashType::NonePlusAnyoneCanPay,
            0x83 => SighashType::SinglePlusAnyoneCanPay,
            other => return Err(TxError::InvalidSighashType(other)),
        })
    }

    pub fn anyone_can_pay(self) -> bool {
        self.to_u8() & ANYONECANPAY != 0
    }

    fn is_none(self) -> bool {
        self.to_u8() & 0x1f == 0x02
    }

    fn is_single(self) -> bool {
        self.to_u8() & 0x1f == 0x03
    }

    /// The type used for ECDSA signatures, where `Default` is not encodable.
    pub fn for_ecdsa(self) -> Self {
        match self {
            SighashType::Default => SighashType::All,
            other => other,
        }
    }
}

fn check_index(tx: &Transaction, index: usize) -> Result<&TxIn> {
    tx.inputs.get(index).ok_or(TxError::InputOutOfRange {
        index,
        inputs: tx.inputs.len(),
    })
}

/// Legacy signature hash of input `index` against `script_code`.
///
/// SIGHASH_SINGLE without a matching output hashes to the integer one, as
/// consensus requires.
pub fn legacy_sighash(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    sighash_type: SighashType,
) -> Result<[u8; 32]> {
    check_index(tx, index)?;
    let ty = sighash_type.for_ecdsa();
    if ty.is_single() && index >= tx.outputs.len() {
        let mut one = [0u8; 32];
        one[0] = 1;
        return Ok(one);
    }

    let blank_sequences = ty.is_none() || ty.is_single();
    let inputs: Vec<TxIn> = tx
        .inputs
        .iter()
        .enumerate()
        .filter(|(i, _)| !ty.anyone_can_pay() || *i == index)
        .map(|(i, input)| TxIn {
            previous_output: input.previous_output,
            script_sig: if i == index { script_code.to_vec() } else { Vec::new() },
            sequence: if i != index && blank_sequences { 0 } else { input.sequence },
            witness: Vec::new(),
        })
        .collect();

    let outputs = if ty.is_none() {
        Vec::new()
    } else if ty.is_single() {
        let mut outputs: Vec<TxOut> = (0..index)
            .map(|_| TxOut {
                value: u64::MAX,
                script_pubkey: Vec::new(),
            })
            .collect();
        outputs.push(tx.outputs[index].clone());
        outputs
    } else {
        tx.outputs.clone()
    };

    let copy = Transaction {
        version: tx.version,
        inputs,
        outputs,
        lock_time: tx.lock_time,
    };
    let mut preimage = serialize_legacy(&copy);
    preimage.extend_from_slice(&u32::from(ty.to_u8()).to_le_bytes());
    Ok(sha256d(&preimage))
}

/// BIP-143 signature hash for a segwit v0 input spending `amount`.
pub fn segwit_v0_sighash(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: SighashType,
) -> Result<[u8; 32]> {
    let input = check_index(tx, index)?;
    let ty = sighash_type.for_ecdsa();
    let zero = [0u8; 32];

    let hash_prevouts = if ty.anyone_can_pay() {
        zero
    } else {
        let mut buf = Vec::with_capacity(36 * tx.inputs.len());
        for input in &tx.inputs {
            write_outpoint(&mut buf, &input.previous_output);
        }
        sha256d(&buf)
    };

    let hash_sequence = if ty.anyone_can_pay() || ty.is_none() || ty.is_single() {
        zero
    } else {
        let buf: Vec<u8> = tx
            .inputs
            .iter()
            .flat_map(|input| input.sequence.to_le_bytes())
            .collect();
        sha256d(&buf)
    };

    let hash_outputs = if !ty.is_none() && !ty.is_single() {
        let mut buf = Vec::new();
        for out in &tx.outputs {
            write_txout(&mut buf, out);
        }
        sha256d(&buf)
    } else if ty.is_single() && index < tx.outputs.len() {
        let mut buf = Vec::new();
        write_txout(&mut buf, &tx.outputs[index]);
        sha256d(&buf)
    } else {
        zero
    };

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    write_outpoint(&mut preimage, &input.previous_output);
    write_var_bytes(&mut preimage, script_code);
    preimage.extend_from_slice(&amount.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&u32::from(ty.to_u8()).to_le_bytes());
    Ok(sha256d(&preimage))
}

/// BIP-341 key-path signature hash (no annex, no script path).
///
/// Every spent output must be in `prevouts` unless the hash type is
/// ANYONECANPAY, in which case only the signed input's is needed.
pub fn taproot_key_spend_sighash(
    tx: &Transaction,
    index: usize,
    prevouts: &PrevOutputIndex,
    sighash_type: SighashType,
) -> Result<[u8; 32]> {
    let input = check_index(tx, index)?;
    if sighash_type.is_single() && index >= tx.outputs.len() {
        return Err(TxError::InvalidSighashType(sighash_type.to_u8()));
    }

    // epoch
    let mut msg = vec![0u8];
    msg.push(sighash_type.to_u8());
    msg.extend_from_slice(&tx.version.to_le_bytes());
    msg.extend_from_slice(&tx.lock_time.to_le_bytes());

    if !sighash_type.anyone_can_pay() {
        let spent = prevouts.spent_by(tx)?;
        let mut outpoints = Vec::with_capacity(36 * tx.inputs.len());
        let mut amounts = Vec::with_capacity(8 * spent.len());
        let mut scripts = Vec::new();
        let mut sequences = Vec::with_capacity(4 * tx.inputs.len());
        for (input, prev) in tx.inputs.iter().zip(&spent) {
            write_outpoint(&mut outpoints, &input.previous_output);
            amounts.extend_from_slice(&prev.value.to_le_bytes());
            write_var_bytes(&mut scripts, &prev.script_pubkey);
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }
        msg.extend_from_slice(&sha256(&outpoints));
        msg.extend_from_slice(&sha256(&amounts));
        msg.extend_from_slice(&sha256(&scripts));
        msg.extend_from_slice(&sha256(&sequences));
    }

    if !sighash_type.is_none() && !sighash_type.is_single() {
        let mut outputs = Vec::new();
        for out in &tx.outputs {
            write_txout(&mut outputs, out);
        }
        msg.extend_from_slice(&sha256(&outputs));
    }

    // spend_type: key path, no annex
    msg.push(0);

    if sighash_type.anyone_can_pay() {
        let prev = prevouts.require(&input.previous_output)?;
        write_outpoint(&mut msg, &input.previous_output);
        msg.extend_from_slice(&prev.value.to_le_bytes());
        write_var_bytes(&mut msg, &prev.script_pubkey);
        msg.extend_from_slice(&input.sequence.to_le_bytes());
    } else {
        let index = u32::try_from(index).map_err(|_| TxError::InputOutOfRange {
            index,
            inputs: tx.inputs.len(),
        })?;
        msg.extend_from_slice(&index.to_le_bytes());
    }

    if sighash_type.is_single() {
        let mut output = Vec::new();
        write_txout(&mut output, &tx.outputs[index]);
        msg.extend_from_slice(&sha256(&output));
    }

    Ok(tagged_hash("TapSighash", &msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::deserialize_hex;
    use crate::types::{OutPoint, Txid};
    use hex_literal::hex;

    // Native P2WPKH example from BIP-143.
    const BIP143_UNSIGNED: &str = "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000";

    fn two_in_two_out() -> Transaction {
        let input = |n: u8| TxIn {
            previous_output: OutPoint::new(Txid([n; 32]), n as u32),
            script_sig: Vec::new(),
            sequence: 0xffff_ffff,
            witness: Vec::new(),
        };
        let output = |value: u64| TxOut {
            value,
            script_pubkey: hex!("0014751e76e8199196d454941c45d1b3a323f1433bd6").to_vec(),
        };
        Transaction {
            version: 1,
            inputs: vec![input(1), input(2)],
            outputs: vec![output(1_000), output(2_000)],
            lock_time: 0,
        }
    }

    fn prevouts_for(tx: &Transaction) -> PrevOutputIndex {
        let mut index = PrevOutputIndex::new();
        for (i, input) in tx.inputs.iter().enumerate() {
            index.insert(
                input.previous_output,
                TxOut {
                    value: 10_000 * (i as u64 + 1),
                    script_pubkey: [&[0x51, 0x20][..], &[i as u8; 32][..]].concat(),
                },
            );
        }
        index
    }

    #[test]
    fn hash_type_bytes() {
        for byte in [0x00, 0x01, 0x02, 0x03, 0x81, 0x82, 0x83] {
            assert_eq!(SighashType::from_u8(byte).unwrap().to_u8(), byte);
        }
        assert!(matches!(
            SighashType::from_u8(0x04),
            Err(TxError::InvalidSighashType(0x04))
        ));
        assert!(SighashType::SinglePlusAnyoneCanPay.anyone_can_pay());
        assert_eq!(SighashType::Default.for_ecdsa(), SighashType::All);
    }

    #[test]
    fn bip143_native_p2wpkh_vector() {
        let tx = deserialize_hex(BIP143_UNSIGNED).unwrap();
        let script_code = hex!("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac");
        let sighash =
            segwit_v0_sighash(&tx, 1, &script_code, 600_000_000, SighashType::All).unwrap();
        assert_eq!(
            sighash,
            hex!("c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670")
        );
    }

    #[test]
    fn legacy_single_without_output_hashes_to_one() {
        let mut tx = two_in_two_out();
        tx.outputs.truncate(1);
        let hash = legacy_sighash(&tx, 1, &[0x51], SighashType::Single).unwrap();
        let mut one = [0u8; 32];
        one[0] = 1;
        assert_eq!(hash, one);
    }

    #[test]
    fn legacy_anyone_can_pay_ignores_other_inputs() {
        let tx = two_in_two_out();
        let mut other = tx.clone();
        other.inputs[1].previous_output.vout = 99;
        let script = [0x51];
        assert_eq!(
            legacy_sighash(&tx, 0, &script, SighashType::AllPlusAnyoneCanPay).unwrap(),
            legacy_sighash(&other, 0, &script, SighashType::AllPlusAnyoneCanPay).unwrap()
        );
        assert_ne!(
            legacy_sighash(&tx, 0, &script, SighashType::All).unwrap(),
            legacy_sighash(&other, 0, &script, SighashType::All).unwrap()
        );
    }

    #[test]
    fn segwit_none_ignores_outputs() {
        let tx = two_in_two_out();
        let mut other = tx.clone();
        other.outputs[1].value += 1;
        let script = hex!("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac");
        let a = segwit_v0_sighash(&tx, 0, &script, 5_000, SighashType::None).unwrap();
        let b = segwit_v0_sighash(&other, 0, &script, 5_000, SighashType::None).unwrap();
        assert_eq!(a, b);
        let c = segwit_v0_sighash(&tx, 0, &script, 5_001, SighashType::None).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn taproot_default_and_all_differ_only_in_type_byte() {
        let tx = two_in_two_out();
        let prevouts = prevouts_for(&tx);
        let default = taproot_key_spend_sighash(&tx, 0, &prevouts, SighashType::Default).unwrap();
        let all = taproot_key_spend_sighash(&tx, 0, &prevouts, SighashType::All).unwrap();
        assert_ne!(default, all);
    }

    #[test]
    fn taproot_commits_to_every_spent_amount() {
        let tx = two_in_two_out();
        let prevouts = prevouts_for(&tx);
        let before = taproot_key_spend_sighash(&tx, 0, &prevouts, SighashType::Default).unwrap();

        let mut changed = prevouts.clone();
        changed.insert(
            tx.inputs[1].previous_output,
            TxOut {
                value: 1,
                script_pubkey: prevouts.get(&tx.inputs[1].previous_output).unwrap().script_pubkey.clone(),
            },
        );
        let after = taproot_key_spend_sighash(&tx, 0, &changed, SighashType::Default).unwrap();
        assert_ne!(before, after);

        // ...unless the signer opted out of the other inputs.
        let acp = |p: &PrevOutputIndex| {
            taproot_key_spend_sighash(&tx, 0, p, SighashType::AllPlusAnyoneCanPay).unwrap()
        };
        assert_eq!(acp(&prevouts), acp(&changed));
    }

    #[test]
    fn taproot_needs_the_prevouts() {
        let tx = two_in_two_out();
        let mut partial = PrevOutputIndex::new();
        let full = prevouts_for(&tx);
        let first = tx.inputs[0].previous_output;
        partial.insert(first, full.get(&first).unwrap().clone());
        assert!(matches!(
            taproot_key_spend_sighash(&tx, 0, &partial, SighashType::Default),
            Err(TxError::PrevOutputMissing(o)) if o == tx.inputs[1].previous_output
        ));
        assert!(taproot_key_spend_sighash(&tx, 0, &partial, SighashType::AllPlusAnyoneCanPay).is_ok());
    }

    #[test]
    fn taproot_single_requires_matching_output() {
        let mut tx = two_in_two_out();
        tx.outputs.truncate(1);
        let prevouts = prevouts_for(&tx);
        assert!(matches!(
            taproot_key_spend_sighash(&tx, 1, &prevouts, SighashType::Single),
            Err(TxError::InvalidSighashType(0x03))
        ));
    }

    #[test]
    fn out_of_range_input() {
        let tx = two_in_two_out();
        assert!(matches!(
            legacy_sighash(&tx, 5, &[], SighashType::All),
            Err(TxError::InputOutOfRange { index: 5, inputs: 2 })
        ));
    }
}
