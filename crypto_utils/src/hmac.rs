use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA512 over the concatenation of `parts`.
///
/// BIP-32 feeds the MAC from several fields (`0x00 || k || ser32(i)`), so the
/// parts are streamed in instead of being copied into one buffer first.
pub fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    // HMAC accepts keys of any length; the error branch is unreachable.
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC key of any length is valid");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}
