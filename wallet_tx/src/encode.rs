//! Consensus wire format: CompactSize lengths, legacy and BIP-144 segwit
//! serialization, txid/wtxid and BIP-141 weight.

use crate::error::{Result, TxError};
use crate::types::{OutPoint, Transaction, TxIn, TxOut, Txid};
use crypto_utils::hash::sha256d;

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;
const WITNESS_SCALE_FACTOR: u64 = 4;

fn fail(msg: impl Into<String>) -> TxError {
    TxError::SerializationFailure(msg.into())
}

pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

pub(crate) fn write_outpoint(buf: &mut Vec<u8>, outpoint: &OutPoint) {
    buf.extend_from_slice(outpoint.txid.as_bytes());
    buf.extend_from_slice(&outpoint.vout.to_le_bytes());
}

pub(crate) fn write_txout(buf: &mut Vec<u8>, out: &TxOut) {
    buf.extend_from_slice(&out.value.to_le_bytes());
    write_var_bytes(buf, &out.script_pubkey);
}

fn write_txin(buf: &mut Vec<u8>, input: &TxIn) {
    write_outpoint(buf, &input.previous_output);
    write_var_bytes(buf, &input.script_sig);
    buf.extend_from_slice(&input.sequence.to_le_bytes());
}

fn write_tx(buf: &mut Vec<u8>, tx: &Transaction, with_witness: bool) {
    buf.extend_from_slice(&tx.version.to_le_bytes());
    if with_witness {
        buf.extend([SEGWIT_MARKER, SEGWIT_FLAG]);
    }
    write_compact_size(buf, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_txin(buf, input);
    }
    write_compact_size(buf, tx.outputs.len() as u64);
    for out in &tx.outputs {
        write_txout(buf, out);
    }
    if with_witness {
        for input in &tx.inputs {
            write_compact_size(buf, input.witness.len() as u64);
            for item in &input.witness {
                write_var_bytes(buf, item);
            }
        }
    }
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
}

/// Full serialization; uses the segwit layout when any input has a witness.
pub fn serialize(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    write_tx(&mut buf, tx, tx.has_witness());
    buf
}

/// Serialization without marker, flag and witnesses (the txid preimage).
pub fn serialize_legacy(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    write_tx(&mut buf, tx, false);
    buf
}

pub fn serialize_hex(tx: &Transaction) -> String {
    hex::encode(serialize(tx))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(fail(format!(
                "truncated: need {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn compact_size(&mut self) -> Result<u64> {
        let (n, min) = match self.u8()? {
            0xfd => (u16::from_le_bytes(self.array()?) as u64, 0xfd),
            0xfe => (u32::from_le_bytes(self.array()?) as u64, 0x1_0000),
            0xff => (self.u64()?, 0x1_0000_0000),
            small => return Ok(small as u64),
        };
        if n < min {
            return Err(fail(format!("non-canonical CompactSize {n}")));
        }
        Ok(n)
    }

    /// A length that must fit in what is left of the buffer, given that each
    /// element occupies at least `min_size` bytes.
    fn length(&mut self, min_size: usize) -> Result<usize> {
        let n = self.compact_size()?;
        if n > (self.remaining() / min_size.max(1)) as u64 {
            return Err(fail(format!("length {n} exceeds remaining data")));
        }
        Ok(n as usize)
    }

    fn var_bytes(&mut self) -> Result<Vec<u8>> {
        let n = self.length(1)?;
        Ok(self.take(n)?.to_vec())
    }
}

// outpoint + empty script + sequence
const MIN_TXIN_SIZE: usize = 41;
// value + empty script
const MIN_TXOUT_SIZE: usize = 9;

fn read_txin(r: &mut Reader<'_>) -> Result<TxIn> {
    let txid = Txid(r.array()?);
    let vout = r.u32()?;
    let script_sig = r.var_bytes()?;
    let sequence = r.u32()?;
    Ok(TxIn {
        previous_output: OutPoint::new(txid, vout),
        script_sig,
        sequence,
        witness: Vec::new(),
    })
}

fn read_txout(r: &mut Reader<'_>) -> Result<TxOut> {
    let value = r.u64()?;
    let script_pubkey = r.var_bytes()?;
    Ok(TxOut {
        value,
        script_pubkey,
    })
}

/// Inverse of [`serialize`]. Rejects truncation, trailing bytes, an unknown
/// segwit flag, an all-empty witness section and non-canonical CompactSize.
pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
    let mut r = Reader::new(bytes);
    let version = i32::from_le_bytes(r.array()?);

    let segwit = r.peek(0) == Some(SEGWIT_MARKER);
    if segwit {
        r.u8()?;
        let flag = r.u8()?;
        if flag != SEGWIT_FLAG {
            return Err(fail(format!("unknown segwit flag {flag:#04x}")));
        }
    }

    let n_inputs = r.length(MIN_TXIN_SIZE)?;
    let mut inputs = Vec::with_capacity(n_inputs);
    for _ in 0..n_inputs {
        inputs.push(read_txin(&mut r)?);
    }
    let n_outputs = r.length(MIN_TXOUT_SIZE)?;
    let mut outputs = Vec::with_capacity(n_outputs);
    for _ in 0..n_outputs {
        outputs.push(read_txout(&mut r)?);
    }

    if segwit {
        for input in inputs.iter_mut() {
            let items = r.length(1)?;
            let mut witness = Vec::with_capacity(items);
            for _ in 0..items {
                witness.push(r.var_bytes()?);
            }
            input.witness = witness;
        }
        if inputs.iter().all(|input| input.witness.is_empty()) {
            return Err(fail("segwit marker with empty witnesses"));
        }
    }

    let lock_time = r.u32()?;
    if r.remaining() != 0 {
        return Err(fail(format!("{} trailing bytes", r.remaining())));
    }
    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

pub fn deserialize_hex(s: &str) -> Result<Transaction> {
    let bytes = hex::decode(s).map_err(|e| fail(format!("hex: {e}")))?;
    deserialize(&bytes)
}

impl Transaction {
    pub fn txid(&self) -> Txid {
        Txid(sha256d(&serialize_legacy(self)))
    }

    /// Equals the txid for transactions without witnesses.
    pub fn wtxid(&self) -> Txid {
        Txid(sha256d(&serialize(self)))
    }

    pub fn base_size(&self) -> usize {
        serialize_legacy(self).len()
    }

    pub fn total_size(&self) -> usize {
        serialize(self).len()
    }

    /// BIP-141 weight: base size × 3 + total size.
    pub fn weight(&self) -> u64 {
        self.base_size() as u64 * (WITNESS_SCALE_FACTOR - 1) + self.total_size() as u64
    }

    pub fn vsize(&self) -> u64 {
        self.weight().div_ceil(WITNESS_SCALE_FACTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // First spend ever: block 170, f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16.
    const BLOCK_170_TX: &str = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee0000000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";

    fn sample_segwit() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TxIn {
                previous_output: OutPoint::new(Txid([7u8; 32]), 1),
                script_sig: Vec::new(),
                sequence: 0xffff_fffd,
                witness: vec![vec![0x30; 71], vec![0x02; 33]],
            }],
            outputs: vec![TxOut {
                value: 50_000,
                script_pubkey: hex!("0014751e76e8199196d454941c45d1b3a323f1433bd6").to_vec(),
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn compact_size_boundaries() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (0xfc, &[0xfc]),
            (0xfd, &[0xfd, 0xfd, 0x00]),
            (0x1_0000, &[0xfe, 0x00, 0x00, 0x01, 0x00]),
            (0x1_0000_0000, &[0xff, 0, 0, 0, 0, 1, 0, 0, 0]),
        ];
        for (n, expected) in cases {
            let mut buf = Vec::new();
            write_compact_size(&mut buf, n);
            assert_eq!(buf, expected, "{n:#x}");
            assert_eq!(Reader::new(&buf).compact_size().unwrap(), n);
        }
    }

    #[test]
    fn non_canonical_compact_size_is_rejected() {
        assert!(Reader::new(&[0xfd, 0x10, 0x00]).compact_size().is_err());
        assert!(Reader::new(&[0xfe, 0xff, 0x00, 0x00, 0x00]).compact_size().is_err());
    }

    #[test]
    fn legacy_transaction_round_trip_and_txid() {
        let tx = deserialize_hex(BLOCK_170_TX).unwrap();
        assert_eq!(tx.version, 1);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 1_000_000_000);
        assert_eq!(serialize_hex(&tx), BLOCK_170_TX);
        assert_eq!(
            tx.txid().to_string(),
            "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16"
        );
        assert_eq!(tx.wtxid(), tx.txid());
        assert_eq!(tx.weight(), tx.base_size() as u64 * 4);
    }

    #[test]
    fn segwit_layout_and_weight() {
        let tx = sample_segwit();
        let bytes = serialize(&tx);
        assert_eq!(&bytes[4..6], &[SEGWIT_MARKER, SEGWIT_FLAG]);
        assert_eq!(deserialize(&bytes).unwrap(), tx);

        let witness_bytes = bytes.len() - tx.base_size();
        assert_eq!(witness_bytes, 2 + 1 + 1 + 71 + 1 + 33);
        assert_eq!(tx.weight(), tx.base_size() as u64 * 4 + witness_bytes as u64);
        assert_eq!(tx.vsize(), tx.weight().div_ceil(4));
        assert_ne!(tx.wtxid(), tx.txid());
    }

    #[test]
    fn malformed_encodings_fail() {
        let good = serialize(&sample_segwit());

        let mut trailing = good.clone();
        trailing.push(0);
        assert!(matches!(deserialize(&trailing), Err(TxError::SerializationFailure(_))));

        assert!(matches!(
            deserialize(&good[..good.len() - 1]),
            Err(TxError::SerializationFailure(_))
        ));

        let mut bad_flag = good.clone();
        bad_flag[5] = 0x02;
        assert!(matches!(deserialize(&bad_flag), Err(TxError::SerializationFailure(_))));

        assert!(deserialize_hex("zz").is_err());
    }

    #[test]
    fn huge_declared_counts_do_not_allocate() {
        // version, then an input count of 2^32 with nothing behind it
        let bytes = hex!("01000000ff0000000001000000");
        assert!(matches!(deserialize(&bytes), Err(TxError::SerializationFailure(_))));
    }
}
