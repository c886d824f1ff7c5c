//! Row types read straight from SQLite, separate from the wire DTOs in
//! `bucket-types`.
use bucket_types::models::VerificationPurpose;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    /// Absent for accounts created through OTP, magic link or PayID.
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub pay_tag: Option<String>,
    pub referred_by: Option<String>,
    pub role: String,
    pub payid: Option<PayIdLinkRow>,
    pub created_at: String,
}

/// PayID identity attached to a user. Token fields hold ciphertext only.
#[derive(Debug, Clone, Default)]
pub struct PayIdLinkRow {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub sub: Option<String>,
    pub pay_tag: Option<String>,
    pub kyc_verified: bool,
    pub verification_level: Option<String>,
    pub session_id: Option<String>,
    pub provider: Option<String>,
    pub updated_at: String,
}

/// Fields for a freshly registered account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub referred_by: Option<String>,
}

/// Everything the PayID callback learned about a user, ready to persist.
#[derive(Debug, Clone)]
pub struct PayIdUpsert {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<String>,
    pub phone: Option<String>,
    pub pay_tag: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub sub: String,
    pub kyc_verified: bool,
    pub verification_level: Option<String>,
    /// Referrer carried through the OAuth round trip.
    pub referral_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VerificationTokenRow {
    pub id: i64,
    pub identifier: String,
    pub token_hash: String,
    pub purpose: VerificationPurpose,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct OAuthSessionRow {
    pub state: String,
    pub code_verifier: String,
    pub csrf: String,
    pub referral_id: Option<String>,
    pub return_url: Option<String>,
    /// Unix seconds.
    pub expires_at: i64,
}
