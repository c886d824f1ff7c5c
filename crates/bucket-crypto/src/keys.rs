use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use anyhow::{Result, bail};

pub const KEY_LEN: usize = 32;

/// Generate a random 256-bit key.
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Interpret a configured secret as a raw 32-byte key.
///
/// The value is taken byte-for-byte; anything other than exactly 32 bytes is
/// rejected so a truncated or padded secret never reaches the signer or cipher.
pub fn key_from_str(raw: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = raw.as_bytes();
    if bytes.len() != KEY_LEN {
        bail!("Key must be exactly {} bytes (got {})", KEY_LEN, bytes.len());
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(bytes);
    Ok(key)
}
