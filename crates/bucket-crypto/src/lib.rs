/// Bucket Crypto Library
///
/// Two kinds of protection live here and must not be confused:
/// - `cipher`: reversible AES-256-GCM encryption for provider tokens at rest.
/// - `secrets`: one-way Argon2id hashing for passwords, OTPs and magic-link secrets.
///
/// `pkce` holds the OAuth authorization-code helpers (verifier, challenge, CSRF state).
pub mod cipher;
pub mod keys;
pub mod pkce;
pub mod secrets;
