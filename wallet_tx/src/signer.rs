use crate::error::{Result, TxError};
use crate::sighash::{
    SighashType, legacy_sighash, segwit_v0_sighash, taproot_key_spend_sighash,
};
use crate::types::{PrevOutputIndex, Transaction};
use crypto_utils::hash::hash160;
use hdwallet::address::{tap_tweak, taproot_output_key};
use hdwallet::{HdError, script};
use secp256k1::{
    All, KeyPair, Message, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey, ecdsa, schnorr,
};
use std::fmt;
use tracing::debug;

/// How an input is unlocked, read off the script of the output it spends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpendKind {
    P2pkh,
    /// Any P2SH output is assumed to wrap a P2WPKH redeem script.
    P2shP2wpkh,
    P2wpkh,
    P2tr,
}

impl SpendKind {
    pub fn classify(script_pubkey: &[u8]) -> Option<SpendKind> {
        if script::as_p2pkh(script_pubkey).is_some() {
            Some(SpendKind::P2pkh)
        } else if script::as_p2sh(script_pubkey).is_some() {
            Some(SpendKind::P2shP2wpkh)
        } else if script::as_p2wpkh(script_pubkey).is_some() {
            Some(SpendKind::P2wpkh)
        } else if script::as_p2tr(script_pubkey).is_some() {
            Some(SpendKind::P2tr)
        } else {
            None
        }
    }
}

impl fmt::Display for SpendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpendKind::P2pkh => "p2pkh",
            SpendKind::P2shP2wpkh => "p2sh-p2wpkh",
            SpendKind::P2wpkh => "p2wpkh",
            SpendKind::P2tr => "p2tr",
        };
        f.write_str(name)
    }
}

/// Appends a direct push of `data`.
fn push(script: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(data.len() < 0x4c);
    script.push(data.len() as u8);
    script.extend_from_slice(data);
}

/// Splits a push-only script made of direct pushes.
fn parse_pushes(mut script: &[u8]) -> Option<Vec<&[u8]>> {
    let mut items = Vec::new();
    while let Some((&len, rest)) = script.split_first() {
        let len = len as usize;
        if len == 0 || len >= 0x4c || rest.len() < len {
            return None;
        }
        items.push(&rest[..len]);
        script = &rest[len..];
    }
    Some(items)
}

fn message(hash: [u8; 32]) -> Result<Message> {
    Message::from_slice(&hash).map_err(|e| TxError::SerializationFailure(e.to_string()))
}

fn invalid(input: usize, reason: impl Into<String>) -> TxError {
    TxError::InvalidSignature {
        input,
        reason: reason.into(),
    }
}

/// Unlocking data for one input.
struct Unlock {
    script_sig: Vec<u8>,
    witness: Vec<Vec<u8>>,
}

/// Signs and verifies the four supported spend kinds.
pub struct Signer {
    secp: Secp256k1<All>,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer {
    pub fn new() -> Self {
        Signer {
            secp: Secp256k1::new(),
        }
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Whether `public_key` controls an output of `kind` with this script.
    fn controls(&self, kind: SpendKind, script_pubkey: &[u8], public_key: &PublicKey) -> Result<bool> {
        let pubkey_hash = hash160(&public_key.serialize());
        Ok(match kind {
            SpendKind::P2pkh => script::as_p2pkh(script_pubkey) == Some(pubkey_hash),
            SpendKind::P2shP2wpkh => {
                let redeem_hash = hash160(&script::p2wpkh(&pubkey_hash));
                script::as_p2sh(script_pubkey) == Some(redeem_hash)
            }
            SpendKind::P2wpkh => script::as_p2wpkh(script_pubkey) == Some(pubkey_hash),
            SpendKind::P2tr => {
                let output_key = taproot_output_key(&self.secp, public_key)?;
                script::as_p2tr(script_pubkey) == Some(output_key.serialize())
            }
        })
    }

    fn ecdsa_signature(&self, hash: [u8; 32], key: &SecretKey, sighash: SighashType) -> Result<Vec<u8>> {
        let sig = self.secp.sign_ecdsa(&message(hash)?, key);
        let mut bytes = sig.serialize_der().to_vec();
        bytes.push(sighash.for_ecdsa().to_u8());
        Ok(bytes)
    }

    fn unlock(
        &self,
        tx: &Transaction,
        index: usize,
        prevouts: &PrevOutputIndex,
        kind: SpendKind,
        key: &SecretKey,
        sighash: SighashType,
    ) -> Result<Unlock> {
        let prev = prevouts.require(&tx.inputs[index].previous_output)?;
        let public_key = key.public_key(&self.secp);
        let compressed = public_key.serialize();
        let pubkey_hash = hash160(&compressed);

        Ok(match kind {
            SpendKind::P2pkh => {
                let hash = legacy_sighash(tx, index, &prev.script_pubkey, sighash)?;
                let sig = self.ecdsa_signature(hash, key, sighash)?;
                let mut script_sig = Vec::with_capacity(sig.len() + compressed.len() + 2);
                push(&mut script_sig, &sig);
                push(&mut script_sig, &compressed);
                Unlock {
                    script_sig,
                    witness: Vec::new(),
                }
            }
            SpendKind::P2shP2wpkh | SpendKind::P2wpkh => {
                let script_code = script::p2pkh(&pubkey_hash);
                let hash = segwit_v0_sighash(tx, index, &script_code, prev.value, sighash)?;
                let sig = self.ecdsa_signature(hash, key, sighash)?;
                let mut script_sig = Vec::new();
                if kind == SpendKind::P2shP2wpkh {
                    push(&mut script_sig, &script::p2wpkh(&pubkey_hash));
                }
                Unlock {
                    script_sig,
                    witness: vec![sig, compressed.to_vec()],
                }
            }
            SpendKind::P2tr => {
                let hash = taproot_key_spend_sighash(tx, index, prevouts, sighash)?;
                let keypair = KeyPair::from_secret_key(&self.secp, key);
                let (internal, _) = keypair.x_only_public_key();
                let tweaked = keypair
                    .add_xonly_tweak(&self.secp, &tap_tweak(&internal)?)
                    .map_err(|_| TxError::Key(HdError::InvalidKeyData))?;
                let sig = self.secp.sign_schnorr_no_aux_rand(&message(hash)?, &tweaked);
                let mut bytes = sig[..].to_vec();
                if sighash != SighashType::Default {
                    bytes.push(sighash.to_u8());
                }
                Unlock {
                    script_sig: Vec::new(),
                    witness: vec![bytes],
                }
            }
        })
    }

    /// Signs every input with the same key.
    pub fn sign_with_key(
        &self,
        tx: &mut Transaction,
        prevouts: &PrevOutputIndex,
        key: &SecretKey,
        sighash: SighashType,
    ) -> Result<()> {
        let keys = vec![*key; tx.inputs.len()];
        self.sign_with_keys(tx, prevouts, &keys, sighash)
    }

    /// Signs input `i` with `keys[i]`.
    ///
    /// Every check runs before the transaction is touched, so on error `tx`
    /// is left exactly as it was.
    pub fn sign_with_keys(
        &self,
        tx: &mut Transaction,
        prevouts: &PrevOutputIndex,
        keys: &[SecretKey],
        sighash: SighashType,
    ) -> Result<()> {
        if keys.len() != tx.inputs.len() {
            return Err(TxError::KeyCountMismatch {
                keys: keys.len(),
                inputs: tx.inputs.len(),
            });
        }
        prevouts.check_covers(tx)?;

        let mut kinds = Vec::with_capacity(tx.inputs.len());
        for (index, (input, key)) in tx.inputs.iter().zip(keys).enumerate() {
            let prev = prevouts.require(&input.previous_output)?;
            let kind = SpendKind::classify(&prev.script_pubkey)
                .ok_or(TxError::UnsupportedScript { input: index })?;
            let public_key = key.public_key(&self.secp);
            if !self.controls(kind, &prev.script_pubkey, &public_key)? {
                return Err(TxError::KeyMismatch { input: index });
            }
            kinds.push(kind);
        }

        // None of the sighash algorithms commit to scriptSigs or witnesses,
        // so every input can be hashed against the unsigned transaction.
        let unlocks = kinds
            .iter()
            .zip(keys)
            .enumerate()
            .map(|(index, (&kind, key))| self.unlock(tx, index, prevouts, kind, key, sighash))
            .collect::<Result<Vec<_>>>()?;

        for (index, (input, unlock)) in tx.inputs.iter_mut().zip(unlocks).enumerate() {
            input.script_sig = unlock.script_sig;
            input.witness = unlock.witness;
            debug!(input = index, kind = %kinds[index], "signed input");
        }
        Ok(())
    }

    fn verify_ecdsa(
        &self,
        index: usize,
        hash_for: impl FnOnce(SighashType) -> Result<[u8; 32]>,
        sig_with_type: &[u8],
        public_key: &PublicKey,
    ) -> Result<()> {
        let (&type_byte, der) = sig_with_type
            .split_last()
            .ok_or_else(|| invalid(index, "empty signature"))?;
        let sighash = SighashType::from_u8(type_byte)?;
        if sighash == SighashType::Default {
            return Err(TxError::InvalidSighashType(type_byte));
        }
        let sig = ecdsa::Signature::from_der(der).map_err(|e| invalid(index, e.to_string()))?;
        let msg = message(hash_for(sighash)?)?;
        self.secp
            .verify_ecdsa(&msg, &sig, public_key)
            .map_err(|e| invalid(index, e.to_string()))
    }

    fn verify_p2wpkh_witness(
        &self,
        tx: &Transaction,
        index: usize,
        program: &[u8; 20],
        amount: u64,
    ) -> Result<()> {
        let witness = &tx.inputs[index].witness;
        let [sig, key] = witness.as_slice() else {
            return Err(invalid(index, "p2wpkh witness must hold a signature and a key"));
        };
        if &hash160(key) != program {
            return Err(invalid(index, "witness key does not match the program"));
        }
        let public_key = PublicKey::from_slice(key).map_err(|e| invalid(index, e.to_string()))?;
        let script_code = script::p2pkh(program);
        self.verify_ecdsa(
            index,
            |ty| segwit_v0_sighash(tx, index, &script_code, amount, ty),
            sig,
            &public_key,
        )
    }

    /// Checks input `index` against the output it spends.
    pub fn verify_input(&self, tx: &Transaction, index: usize, prevouts: &PrevOutputIndex) -> Result<()> {
        let input = tx.inputs.get(index).ok_or(TxError::InputOutOfRange {
            index,
            inputs: tx.inputs.len(),
        })?;
        let prev = prevouts.require(&input.previous_output)?;
        let kind = SpendKind::classify(&prev.script_pubkey)
            .ok_or(TxError::UnsupportedScript { input: index })?;

        match kind {
            SpendKind::P2pkh => {
                if !input.witness.is_empty() {
                    return Err(invalid(index, "unexpected witness"));
                }
                let pushes = parse_pushes(&input.script_sig)
                    .ok_or_else(|| invalid(index, "scriptSig is not push-only"))?;
                let [sig, key] = pushes.as_slice() else {
                    return Err(invalid(index, "p2pkh scriptSig must hold a signature and a key"));
                };
                if script::as_p2pkh(&prev.script_pubkey) != Some(hash160(key)) {
                    return Err(invalid(index, "key does not match the pubkey hash"));
                }
                let public_key =
                    PublicKey::from_slice(key).map_err(|e| invalid(index, e.to_string()))?;
                self.verify_ecdsa(
                    index,
                    |ty| legacy_sighash(tx, index, &prev.script_pubkey, ty),
                    sig,
                    &public_key,
                )
            }
            SpendKind::P2shP2wpkh => {
                let pushes = parse_pushes(&input.script_sig)
                    .ok_or_else(|| invalid(index, "scriptSig is not push-only"))?;
                let [redeem] = pushes.as_slice() else {
                    return Err(invalid(index, "scriptSig must push only the redeem script"));
                };
                if script::as_p2sh(&prev.script_pubkey) != Some(hash160(redeem)) {
                    return Err(invalid(index, "redeem script does not match the script hash"));
                }
                let program = script::as_p2wpkh(redeem)
                    .ok_or(TxError::UnsupportedScript { input: index })?;
                self.verify_p2wpkh_witness(tx, index, &program, prev.value)
            }
            SpendKind::P2wpkh => {
                if !input.script_sig.is_empty() {
                    return Err(invalid(index, "native segwit input with a scriptSig"));
                }
                let program = script::as_p2wpkh(&prev.script_pubkey)
                    .ok_or(TxError::UnsupportedScript { input: index })?;
                self.verify_p2wpkh_witness(tx, index, &program, prev.value)
            }
            SpendKind::P2tr => {
                if !input.script_sig.is_empty() {
                    return Err(invalid(index, "taproot input with a scriptSig"));
                }
                let [sig] = input.witness.as_slice() else {
                    return Err(invalid(index, "key-path witness must hold one signature"));
                };
                let (sig, sighash) = match sig.len() {
                    64 => (&sig[..], SighashType::Default),
                    65 if sig[64] != 0 => (&sig[..64], SighashType::from_u8(sig[64])?),
                    _ => return Err(invalid(index, "bad schnorr signature length")),
                };
                let output_key = script::as_p2tr(&prev.script_pubkey)
                    .ok_or(TxError::UnsupportedScript { input: index })?;
                let output_key = XOnlyPublicKey::from_slice(&output_key)
                    .map_err(|e| invalid(index, e.to_string()))?;
                let sig = schnorr::Signature::from_slice(sig)
                    .map_err(|e| invalid(index, e.to_string()))?;
                let msg = message(taproot_key_spend_sighash(tx, index, prevouts, sighash)?)?;
                self.secp
                    .verify_schnorr(&sig, &msg, &output_key)
                    .map_err(|e| invalid(index, e.to_string()))
            }
        }
    }

    pub fn verify_transaction(&self, tx: &Transaction, prevouts: &PrevOutputIndex) -> Result<()> {
        prevouts.check_covers(tx)?;
        for index in 0..tx.inputs.len() {
            self.verify_input(tx, index, prevouts)?;
        }
        Ok(())
    }
}
