use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use anyhow::Result;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64URL};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// 32 random bytes, base64url without padding (43 chars).
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let verifier = B64URL.encode(bytes);
        let challenge = code_challenge(&verifier);
        Self { verifier, challenge }
    }
}

/// `base64url(sha256(verifier))`, no padding.
pub fn code_challenge(verifier: &str) -> String {
    B64URL.encode(Sha256::digest(verifier.as_bytes()))
}

/// Random CSRF nonce, hex encoded.
pub fn generate_csrf() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Payload carried through the provider in the `state` parameter.
///
/// Only a carrier: trust comes from comparing `csrf` with the server-side copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub csrf: String,
}

pub fn encode_state(payload: &StatePayload) -> Result<String> {
    Ok(B64URL.encode(serde_json::to_vec(payload)?))
}

pub fn decode_state(state: &str) -> Result<StatePayload> {
    let raw = B64URL.decode(state)?;
    Ok(serde_json::from_slice(&raw)?)
}
