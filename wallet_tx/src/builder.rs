//! Input selection and unsigned transaction assembly.

use crate::error::{Result, TxError};
use crate::types::{MAX_MONEY, PrevOutputIndex, Transaction, TxIn, TxOut, Utxo};
use hdwallet::{Address, AddressKind};
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_VERSION: i32 = 1;
pub const DEFAULT_LOCK_TIME: u32 = 0;
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Estimated transaction size for a given input and output count. Fees are
/// `estimate_size × fee_rate`. `None` when the size does not fit in a `u64`.
pub trait SizeEstimator {
    fn estimate_size(&self, inputs: usize, outputs: usize) -> Option<u64>;
}

/// `per_input·inputs + per_output·outputs + overhead`; 180/34/10 by default.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinearSizeEstimator {
    pub per_input: u64,
    pub per_output: u64,
    pub overhead: u64,
}

impl Default for LinearSizeEstimator {
    fn default() -> Self {
        LinearSizeEstimator {
            per_input: 180,
            per_output: 34,
            overhead: 10,
        }
    }
}

impl SizeEstimator for LinearSizeEstimator {
    fn estimate_size(&self, inputs: usize, outputs: usize) -> Option<u64> {
        self.per_input
            .checked_mul(inputs as u64)?
            .checked_add(self.per_output.checked_mul(outputs as u64)?)?
            .checked_add(self.overhead)
    }
}

/// Virtual size from BIP-141 weights, assuming every input spends `input`
/// and every output pays to `output`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VirtualSizeEstimator {
    pub input: AddressKind,
    pub output: AddressKind,
}

impl VirtualSizeEstimator {
    pub fn new(input: AddressKind, output: AddressKind) -> Self {
        VirtualSizeEstimator { input, output }
    }

    /// Spending and paying the same kind, as a single-address wallet does.
    pub fn uniform(kind: AddressKind) -> Self {
        Self::new(kind, kind)
    }

    // outpoint, sequence and scriptSig length are non-witness (41 bytes × 4)
    fn input_weight(kind: AddressKind) -> u64 {
        match kind {
            // 107-byte scriptSig
            AddressKind::Legacy => (41 + 107) * 4,
            // 23-byte redeem push + 108-byte witness
            AddressKind::P2shSegwit => (41 + 23) * 4 + 108,
            AddressKind::SegwitV0 => 41 * 4 + 108,
            // one 64-byte signature
            AddressKind::Taproot => 41 * 4 + 66,
        }
    }

    fn output_weight(kind: AddressKind) -> u64 {
        let script_len = match kind {
            AddressKind::Legacy => 25,
            AddressKind::P2shSegwit => 23,
            AddressKind::SegwitV0 => 22,
            AddressKind::Taproot => 34,
        };
        (8 + 1 + script_len) * 4
    }
}

impl SizeEstimator for VirtualSizeEstimator {
    fn estimate_size(&self, inputs: usize, outputs: usize) -> Option<u64> {
        // version, locktime and two one-byte counts
        let mut weight: u64 = (4 + 4 + 1 + 1) * 4;
        if self.input != AddressKind::Legacy && inputs > 0 {
            // marker and flag
            weight += 2;
        }
        weight = weight.checked_add(Self::input_weight(self.input).checked_mul(inputs as u64)?)?;
        weight = weight.checked_add(Self::output_weight(self.output).checked_mul(outputs as u64)?)?;
        Some(weight.div_ceil(4))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payment {
    pub address: Address,
    pub value: u64,
}

impl Payment {
    pub fn new(address: Address, value: u64) -> Self {
        Payment { address, value }
    }

    fn txout(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.address.script_pubkey().to_vec(),
        }
    }
}

/// Fields of the transaction that do not come from selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TxTemplate {
    pub version: i32,
    pub lock_time: u32,
    pub sequence: u32,
}

impl Default for TxTemplate {
    fn default() -> Self {
        TxTemplate {
            version: DEFAULT_VERSION,
            lock_time: DEFAULT_LOCK_TIME,
            sequence: SEQUENCE_FINAL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BuiltTransaction {
    pub tx: Transaction,
    /// Outputs spent by `tx`, in the shape the signer expects.
    pub prev_outputs: PrevOutputIndex,
    pub fee: u64,
    pub change: u64,
    /// The selected UTXOs, in input order.
    pub selected: Vec<Utxo>,
}

fn fee_for(
    estimator: &dyn SizeEstimator,
    inputs: usize,
    outputs: usize,
    fee_rate: u64,
) -> Result<u64> {
    estimator
        .estimate_size(inputs, outputs)
        .and_then(|size| size.checked_mul(fee_rate))
        .ok_or(TxError::AmountOverflow)
}

fn check_amount(value: u64) -> Result<u64> {
    if value > MAX_MONEY {
        return Err(TxError::AmountOutOfRange(value));
    }
    Ok(value)
}

/// Every outpoint may appear once and every amount must fit the money range.
fn check_utxos(utxos: &[Utxo]) -> Result<()> {
    let mut seen = HashSet::with_capacity(utxos.len());
    for utxo in utxos {
        check_amount(utxo.value)?;
        if !seen.insert(utxo.outpoint) {
            return Err(TxError::DuplicateOutpoint(utxo.outpoint));
        }
    }
    Ok(())
}

/// [`build_unsigned_with`] using version 1, locktime 0 and final sequences.
pub fn build_unsigned(
    utxos: &[Utxo],
    payments: &[Payment],
    change_address: &Address,
    fee_rate: u64,
    estimator: &dyn SizeEstimator,
) -> Result<BuiltTransaction> {
    build_unsigned_with(
        utxos,
        payments,
        change_address,
        fee_rate,
        estimator,
        TxTemplate::default(),
    )
}

/// Selects UTXOs in the order given until they cover the payments plus the
/// fee, then lays out payments followed by an optional change output.
///
/// The fee always budgets for a change output, whether or not one ends up
/// being added.
pub fn build_unsigned_with(
    utxos: &[Utxo],
    payments: &[Payment],
    change_address: &Address,
    fee_rate: u64,
    estimator: &dyn SizeEstimator,
    template: TxTemplate,
) -> Result<BuiltTransaction> {
    if payments.is_empty() {
        return Err(TxError::NoPayments);
    }
    check_utxos(utxos)?;
    let target = payments.iter().try_fold(0u64, |acc, p| {
        acc.checked_add(check_amount(p.value)?)
            .ok_or(TxError::AmountOverflow)
    })?;
    check_amount(target)?;
    let outputs = payments.len() + 1;

    let mut selected_value = 0u64;
    let mut count = 0;
    let mut fee = fee_for(estimator, 0, outputs, fee_rate)?;
    let mut covered = false;
    for utxo in utxos {
        selected_value = selected_value
            .checked_add(utxo.value)
            .ok_or(TxError::AmountOverflow)?;
        count += 1;
        fee = fee_for(estimator, count, outputs, fee_rate)?;
        let required = target.checked_add(fee).ok_or(TxError::AmountOverflow)?;
        if selected_value >= required {
            covered = true;
            break;
        }
    }

    if !covered {
        let required = target.checked_add(fee).ok_or(TxError::AmountOverflow)?;
        debug!(available = selected_value, required, "not enough funds");
        return Err(TxError::InsufficientFunds {
            available: selected_value,
            required,
        });
    }

    let selected = utxos[..count].to_vec();
    let change = selected_value - target - fee;
    debug!(inputs = count, selected_value, fee, change, "selected inputs");

    let inputs = selected
        .iter()
        .map(|utxo| TxIn {
            previous_output: utxo.outpoint,
            script_sig: Vec::new(),
            sequence: template.sequence,
            witness: Vec::new(),
        })
        .collect();
    let mut tx_outputs: Vec<TxOut> = payments.iter().map(Payment::txout).collect();
    if change > 0 {
        tx_outputs.push(TxOut {
            value: change,
            script_pubkey: change_address.script_pubkey().to_vec(),
        });
    } else {
        debug!("exact match, change output omitted");
    }

    Ok(BuiltTransaction {
        tx: Transaction {
            version: template.version,
            inputs,
            outputs: tx_outputs,
            lock_time: template.lock_time,
        },
        prev_outputs: selected.iter().collect(),
        fee,
        change,
        selected,
    })
}
