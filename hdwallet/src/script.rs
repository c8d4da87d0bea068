//! Locking-script templates for the four address kinds.

pub const OP_0: u8 = 0x00;
pub const OP_PUSHBYTES_20: u8 = 0x14;
pub const OP_PUSHBYTES_32: u8 = 0x20;
pub const OP_1: u8 = 0x51;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend([OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    script.extend_from_slice(pubkey_hash);
    script.extend([OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// `OP_HASH160 <20> OP_EQUAL`
pub fn p2sh(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.extend([OP_HASH160, OP_PUSHBYTES_20]);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    script
}

/// `OP_0 <20>`; also the redeem script of P2SH-wrapped P2WPKH.
pub fn p2wpkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.extend([OP_0, OP_PUSHBYTES_20]);
    script.extend_from_slice(pubkey_hash);
    script
}

/// `OP_1 <32>`
pub fn p2tr(output_key: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(34);
    script.extend([OP_1, OP_PUSHBYTES_32]);
    script.extend_from_slice(output_key);
    script
}

fn hash20(bytes: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(bytes);
    out
}

pub fn as_p2pkh(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
            if hash.len() == 20 =>
        {
            Some(hash20(hash))
        }
        _ => None,
    }
}

pub fn as_p2sh(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            Some(hash20(hash))
        }
        _ => None,
    }
}

pub fn as_p2wpkh(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_0, OP_PUSHBYTES_20, hash @ ..] if hash.len() == 20 => Some(hash20(hash)),
        _ => None,
    }
}

pub fn as_p2tr(script: &[u8]) -> Option<[u8; 32]> {
    match script {
        [OP_1, OP_PUSHBYTES_32, key @ ..] if key.len() == 32 => {
            let mut out = [0u8; 32];
            out.copy_from_slice(key);
            Some(out)
        }
        _ => None,
    }
}
