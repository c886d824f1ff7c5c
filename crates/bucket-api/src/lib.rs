//! HTTP layer for Bucket accounts: password, OTP and magic-link sign-in,
//! PayID OAuth and KYC, referrals, and client error reports.

pub mod account;
pub mod auth;
pub mod email;
pub mod error;
pub mod kyc;
pub mod middleware;
pub mod oauth;
pub mod payid;
pub mod rate_limit;
pub mod redirect;
pub mod referrals;
pub mod report;
pub mod routes;
pub mod session;
pub mod state;
pub mod verification;

pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};
