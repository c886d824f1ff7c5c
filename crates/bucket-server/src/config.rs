use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bucket_api::payid::PayIdConfig;
use bucket_crypto::keys::{KEY_LEN, key_from_str};

/// Values that ship in `.env.example` and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-32-byte-secret!!!",
    "dev-secret-change-me-0123456789a",
];

pub enum MailConfig {
    Log,
    Resend { api_key: String, from: String },
}

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub app_url: String,
    pub session_secret: [u8; KEY_LEN],
    pub token_key: [u8; KEY_LEN],
    /// `None` leaves the PayID routes answering 502.
    pub payid: Option<PayIdConfig>,
    pub mail: MailConfig,
    pub purge_interval: Duration,
    pub report_limit: u32,
    pub report_window: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let host = or("BUCKET_HOST", "0.0.0.0");
        let port: u16 = or("BUCKET_PORT", "3000")
            .parse()
            .context("BUCKET_PORT is not a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let session_secret = required_key(&get, "BUCKET_SESSION_SECRET")?;
        let token_key = required_key(&get, "BUCKET_TOKEN_KEY")?;
        if session_secret == token_key {
            bail!("BUCKET_SESSION_SECRET and BUCKET_TOKEN_KEY must differ");
        }

        let payid = match get("PAYID_API_URL") {
            None => None,
            Some(base_url) => {
                let need = |name: &str| {
                    get(name).with_context(|| format!("{} is required when PAYID_API_URL is set", name))
                };
                Some(PayIdConfig {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    client_id: need("OAUTH_CLIENT_ID")?,
                    client_secret: need("OAUTH_CLIENT_SECRET")?,
                    redirect_uri: need("REDIRECT_URL")?,
                    org_id: need("PAYID_ORG_ID")?,
                    timeout: Duration::from_secs(parse_or(&get, "PAYID_TIMEOUT_SECS", 5)?),
                })
            }
        };

        let mail = match or("MAIL_PROVIDER", "log").as_str() {
            "log" => MailConfig::Log,
            "resend" => MailConfig::Resend {
                api_key: get("RESEND_API_KEY").context("RESEND_API_KEY is required for resend")?,
                from: get("MAIL_FROM").context("MAIL_FROM is required for resend")?,
            },
            other => bail!("Unknown MAIL_PROVIDER {:?} (expected log or resend)", other),
        };

        let purge_interval = Duration::from_secs(parse_or(&get, "PURGE_INTERVAL_SECS", 300)?);
        if purge_interval.is_zero() {
            bail!("PURGE_INTERVAL_SECS must be greater than zero");
        }
        let report_limit: u32 = parse_or(&get, "REPORT_RATE_LIMIT", 5)?;
        let report_window = Duration::from_secs(parse_or(&get, "REPORT_RATE_WINDOW_SECS", 60)?);
        if report_limit == 0 || report_window.is_zero() {
            bail!("REPORT_RATE_LIMIT and REPORT_RATE_WINDOW_SECS must be greater than zero");
        }

        Ok(Self {
            addr,
            db_path: or("BUCKET_DB_PATH", "bucket.db").into(),
            app_url: or("BUCKET_APP_URL", "http://localhost:3000"),
            session_secret,
            token_key,
            payid,
            mail,
            purge_interval,
            report_limit,
            report_window,
        })
    }
}

fn required_key(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<[u8; KEY_LEN]> {
    let raw = get(name).with_context(|| format!("{} is unset", name))?;
    if PLACEHOLDER_SECRETS.contains(&raw.as_str()) {
        bail!("{} is still a placeholder", name);
    }
    key_from_str(&raw).with_context(|| format!("{} is malformed", name))
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match get(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value {:?}", name, raw)),
        None => Ok(default),
    }
}
