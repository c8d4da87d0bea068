//! End-to-end flows: build, sign, verify and serialize; and the full send
//! pipeline over the external collaborators.

use crate::builder::{Payment, build_unsigned_with};
use crate::config::TxConfig;
use crate::encode::serialize_hex;
use crate::error::{Result, TxError};
use crate::external::Collaborators;
use crate::signer::Signer;
use crate::types::{Transaction, TransactionSummary, Txid, Utxo};
use anyhow::Context;
use hdwallet::{Address, Network};
use secp256k1::SecretKey;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub hex: String,
    pub txid: Txid,
    pub fee: u64,
    pub change: u64,
}

fn check_network(address: &Address, network: Network) -> Result<()> {
    if address.network() != network {
        return Err(TxError::NetworkMismatch {
            expected: network,
            found: address.network(),
        });
    }
    Ok(())
}

fn upstream(err: anyhow::Error) -> TxError {
    warn!("collaborator failed: {err:#}");
    TxError::Upstream(err)
}

/// Builds a transaction paying `payments` from `utxos`, signs it and checks
/// every signature before serializing.
///
/// `keys` holds either one key for every UTXO or a single key that controls
/// all of them. Only keys for the selected UTXOs are used.
pub fn build_and_sign_transaction(
    utxos: &[Utxo],
    keys: &[SecretKey],
    payments: &[Payment],
    fee_rate: u64,
    change_address: &Address,
    network: Network,
    config: &TxConfig,
) -> Result<SignedTransaction> {
    check_network(change_address, network)?;
    for payment in payments {
        check_network(&payment.address, network)?;
    }
    if keys.len() != 1 && keys.len() != utxos.len() {
        return Err(TxError::KeyCountMismatch {
            keys: keys.len(),
            inputs: utxos.len(),
        });
    }

    let estimator = config.estimator(change_address.kind());
    let built = build_unsigned_with(
        utxos,
        payments,
        change_address,
        fee_rate,
        estimator.as_ref(),
        config.template(),
    )?;

    let input_keys: Vec<SecretKey> = match keys {
        [key] => vec![*key; built.tx.inputs.len()],
        keys => keys[..built.tx.inputs.len()].to_vec(),
    };

    let signer = Signer::new();
    let mut tx = built.tx;
    signer.sign_with_keys(&mut tx, &built.prev_outputs, &input_keys, config.sighash)?;
    signer.verify_transaction(&tx, &built.prev_outputs)?;

    let summary = TransactionSummary::new(&tx, &built.prev_outputs)?;
    info!(%summary, "signed transaction");

    Ok(SignedTransaction {
        hex: serialize_hex(&tx),
        txid: summary.txid,
        fee: built.fee,
        change: built.change,
        tx,
    })
}

/// Sends `payments` from the address `key` controls under
/// `config.spend_kind`, returning change to that same address.
pub fn send_payment(
    config: &TxConfig,
    key: &SecretKey,
    payments: &[Payment],
    collaborators: Collaborators<'_>,
) -> Result<Txid> {
    let signer = Signer::new();
    let public_key = key.public_key(signer.secp());
    let from = Address::from_public_key(signer.secp(), config.spend_kind, &public_key, config.network)?;
    debug!(address = %from, "spending from");

    let utxos = collaborators
        .utxos
        .utxos(&from)
        .with_context(|| format!("fetching utxos for {from}"))
        .map_err(upstream)?;
    let fee_rate = collaborators
        .fees
        .fee_rate(config.fee_tier)
        .with_context(|| format!("fetching {} fee rate", config.fee_tier))
        .map_err(upstream)?;
    debug!(utxos = utxos.len(), fee_rate, tier = %config.fee_tier, "inputs for payment");

    let signed = build_and_sign_transaction(
        &utxos,
        &[*key],
        payments,
        fee_rate,
        &from,
        config.network,
        config,
    )?;

    let txid = collaborators
        .broadcaster
        .broadcast(&signed.hex)
        .context("broadcasting transaction")
        .map_err(upstream)?;
    if txid != signed.txid {
        warn!(reported = %txid, computed = %signed.txid, "broadcaster reported a different txid");
    }
    info!(%txid, fee = signed.fee, "transaction broadcast");
    Ok(txid)
}
