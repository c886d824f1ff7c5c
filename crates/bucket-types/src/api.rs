use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::KycStatus;

// -- Envelope --

/// Every JSON endpoint answers with this envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

// -- Session --

/// Claims inside the signed session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<String>,
    pub pay_tag: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub kyc_verified: bool,
}

// -- Password auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// -- OTP / magic link --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub should_create: bool,
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkQuery {
    pub email: Option<String>,
    pub token: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectData {
    pub redirect_url: String,
}

// -- OAuth --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthInitiateRequest {
    /// Referrer's pay tag.
    #[serde(rename = "ref")]
    pub referral: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthInitiateResponse {
    pub authorization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMagicLinkRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub should_create: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// -- PayID account --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayIdUserInfo {
    pub payid_sub: String,
    pub pay_tag: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub phone: Option<String>,
    pub phone_verified: bool,
    pub kyc_verified: bool,
    pub verification_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycAddressInput {
    #[serde(default)]
    pub street: String,
    pub street2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdentityNumbers {
    #[serde(rename = "NIN")]
    pub nin: Option<String>,
    #[serde(rename = "BVN")]
    pub bvn: Option<String>,
    #[serde(rename = "SSN")]
    pub ssn: Option<String>,
    #[serde(rename = "idNumber")]
    pub id_number: Option<String>,
    #[serde(rename = "idNumberType")]
    pub id_number_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycVerifyBody {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub country: String,
    pub address: Option<KycAddressInput>,
    #[serde(default)]
    pub identity_numbers: IdentityNumbers,
    pub gender: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSessionData {
    pub session_id: String,
    pub provider: String,
    pub kyc_status: KycStatus,
    pub kyc_verified: bool,
    pub verification_level: Option<String>,
    pub shareable_url: Option<String>,
    pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycStatusData {
    pub has_session: bool,
    pub is_connected: bool,
    pub kyc_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyc_status: Option<KycStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shareable_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// -- Referrals --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSubmitRequest {
    #[serde(default)]
    pub referral_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralApplied {
    pub referred_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferredUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub pay_tag: Option<String>,
    pub picture: Option<String>,
    pub created_at: String,
}

// -- System --

#[derive(Debug, Default, Deserialize)]
pub struct ErrorReport {
    pub digest: Option<String>,
    pub message: Option<String>,
    pub stack: Option<String>,
    pub path: Option<String>,
}
