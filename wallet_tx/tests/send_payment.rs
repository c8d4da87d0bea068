use anyhow::anyhow;
use hdwallet::{Address, AddressKind, Network};
use secp256k1::{Secp256k1, SecretKey};
use std::cell::RefCell;
use wallet_tx::{
    Broadcaster, Collaborators, FeeTier, OutPoint, Payment, PrevOutputIndex, RecommendedFees,
    Signer, TxConfig, TxError, Txid, Utxo, UtxoSource, deserialize_hex, send_payment,
};

struct FixedUtxos(Vec<Utxo>);

impl UtxoSource for FixedUtxos {
    fn utxos(&self, address: &Address) -> anyhow::Result<Vec<Utxo>> {
        Ok(self
            .0
            .iter()
            .filter(|u| u.script_pubkey == address.script_pubkey())
            .cloned()
            .collect())
    }
}

struct Unreachable;

impl UtxoSource for Unreachable {
    fn utxos(&self, _address: &Address) -> anyhow::Result<Vec<Utxo>> {
        Err(anyhow!("connection refused"))
    }
}

/// Records what it was asked to broadcast and echoes the computed txid.
#[derive(Default)]
struct Recorder {
    sent: RefCell<Vec<String>>,
}

impl Broadcaster for Recorder {
    fn broadcast(&self, raw_tx_hex: &str) -> anyhow::Result<Txid> {
        self.sent.borrow_mut().push(raw_tx_hex.to_owned());
        Ok(deserialize_hex(raw_tx_hex)?.txid())
    }
}

struct Rejecting;

impl Broadcaster for Rejecting {
    fn broadcast(&self, _raw_tx_hex: &str) -> anyhow::Result<Txid> {
        Err(anyhow!("sendrawtransaction RPC error: min relay fee not met"))
    }
}

const FEES: RecommendedFees = RecommendedFees {
    fastest_fee: 12,
    half_hour_fee: 8,
    hour_fee: 1,
    economy_fee: 1,
    minimum_fee: 1,
};

fn fixture() -> (SecretKey, Address, Vec<Utxo>) {
    let secp = Secp256k1::new();
    let key = SecretKey::from_slice(&[0x5a; 32]).unwrap();
    let from = Address::from_public_key(
        &secp,
        AddressKind::Taproot,
        &key.public_key(&secp),
        Network::Testnet,
    )
    .unwrap();
    let utxos = vec![Utxo {
        outpoint: OutPoint::new(Txid([0x33; 32]), 0),
        value: 100_000,
        script_pubkey: from.script_pubkey().to_vec(),
    }];
    (key, from, utxos)
}

fn payee() -> Address {
    let secp = Secp256k1::new();
    let key = SecretKey::from_slice(&[0x6b; 32]).unwrap();
    Address::from_public_key(&secp, AddressKind::SegwitV0, &key.public_key(&secp), Network::Testnet)
        .unwrap()
}

#[test]
fn sends_a_verified_transaction() {
    let (key, from, utxos) = fixture();
    let source = FixedUtxos(utxos.clone());
    let broadcaster = Recorder::default();
    let collaborators = Collaborators {
        fees: &FEES,
        utxos: &source,
        broadcaster: &broadcaster,
    };

    let txid = send_payment(
        &TxConfig::default(),
        &key,
        &[Payment::new(payee(), 1_000)],
        collaborators,
    )
    .unwrap();

    let sent = broadcaster.sent.borrow();
    assert_eq!(sent.len(), 1);
    let tx = deserialize_hex(&sent[0]).unwrap();
    assert_eq!(tx.txid(), txid);
    // hour tier at 1 sat/vB: fee 258, change back to the spending address
    assert_eq!(tx.outputs[1].value, 98_742);
    assert_eq!(tx.outputs[1].script_pubkey, from.script_pubkey());

    let prevouts: PrevOutputIndex = utxos.iter().collect();
    Signer::new().verify_transaction(&tx, &prevouts).unwrap();
}

#[test]
fn fee_tier_comes_from_config() {
    let (key, _, utxos) = fixture();
    let source = FixedUtxos(utxos);
    let broadcaster = Recorder::default();
    let config = TxConfig {
        fee_tier: FeeTier::Fastest,
        ..TxConfig::default()
    };
    send_payment(
        &config,
        &key,
        &[Payment::new(payee(), 1_000)],
        Collaborators {
            fees: &FEES,
            utxos: &source,
            broadcaster: &broadcaster,
        },
    )
    .unwrap();
    let tx = deserialize_hex(&broadcaster.sent.borrow()[0]).unwrap();
    assert_eq!(tx.outputs[1].value, 100_000 - 1_000 - 258 * 12);
}

#[test]
fn collaborator_failures_are_upstream_errors() {
    let (key, _, utxos) = fixture();
    let broadcaster = Recorder::default();

    let err = send_payment(
        &TxConfig::default(),
        &key,
        &[Payment::new(payee(), 1_000)],
        Collaborators {
            fees: &FEES,
            utxos: &Unreachable,
            broadcaster: &broadcaster,
        },
    )
    .unwrap_err();
    assert!(matches!(err, TxError::Upstream(_)));
    assert!(err.to_string().contains("connection refused"), "{err}");
    assert!(broadcaster.sent.borrow().is_empty());

    let source = FixedUtxos(utxos);
    let err = send_payment(
        &TxConfig::default(),
        &key,
        &[Payment::new(payee(), 1_000)],
        Collaborators {
            fees: &FEES,
            utxos: &source,
            broadcaster: &Rejecting,
        },
    )
    .unwrap_err();
    assert!(matches!(err, TxError::Upstream(_)));
    assert!(err.to_string().contains("min relay fee"), "{err}");
}

#[test]
fn empty_wallet_is_insufficient_funds() {
    let (key, _, _) = fixture();
    let source = FixedUtxos(Vec::new());
    let broadcaster = Recorder::default();
    let err = send_payment(
        &TxConfig::default(),
        &key,
        &[Payment::new(payee(), 1_000)],
        Collaborators {
            fees: &FEES,
            utxos: &source,
            broadcaster: &broadcaster,
        },
    )
    .unwrap_err();
    assert!(matches!(err, TxError::InsufficientFunds { available: 0, .. }));
    assert!(broadcaster.sent.borrow().is_empty());
}
