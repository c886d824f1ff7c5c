use chrono::Duration;
use serde::{Deserialize, Serialize};

/// What a verification token proves once redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationPurpose {
    /// Six-digit code typed back by the user.
    Otp,
    /// High-entropy secret embedded in an emailed link.
    MagicLink,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Otp => "OTP",
            Self::MagicLink => "MAGIC_LINK",
        }
    }

    /// How long an issued token stays redeemable.
    pub fn ttl(&self) -> Duration {
        match self {
            Self::Otp => Duration::minutes(15),
            Self::MagicLink => Duration::minutes(60),
        }
    }
}

/// Account roles carried in the session credential.
pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Outcome of a KYC session as reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Verified,
    Failed,
}
