use aes_gcm::{
    AesGcm, Key, KeyInit, Nonce,
    aead::{Aead, OsRng, consts::U16, rand_core::RngCore},
    aes::Aes256,
};
use anyhow::{Result, anyhow, bail};

use crate::keys::KEY_LEN;

/// AES-256-GCM with a 16-byte IV.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub const IV_SIZE: usize = 16;
pub const TAG_SIZE: usize = 16;

/// Reversible encryption for provider tokens stored on the user record.
///
/// Output is `hex(iv || ciphertext || tag)` with a fresh random IV per call.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm16,
}

impl TokenCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(key)),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let sealed = self
            .cipher
            .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut out = Vec::with_capacity(IV_SIZE + sealed.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&sealed);
        Ok(hex::encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let raw = hex::decode(encoded)?;
        if raw.len() < IV_SIZE + TAG_SIZE {
            bail!("Encrypted token too short");
        }

        let (iv, sealed) = raw.split_at(IV_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::<U16>::from_slice(iv), sealed)
            .map_err(|e| anyhow!("Decryption failed: {}", e))?;

        Ok(String::from_utf8(plaintext)?)
    }
}
