#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, header};
use bucket_api::email::{EmailSender, OutgoingEmail};
use bucket_api::payid::{
    ExternalProfile, IdentityProvider, KycRequest, KycResult, MagicLinkDispatch, ProviderError,
    TokenSet,
};
use bucket_api::rate_limit::KeyedLimiter;
use bucket_api::session::SessionIssuer;
use bucket_api::{AppState, AppStateInner, Settings, router};
use bucket_crypto::{cipher::TokenCipher, secrets::SecretHasher};
use bucket_db::Database;
use bucket_db::models::NewUser;
use bucket_types::models::KycStatus;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const APP_URL: &str = "http://localhost:3000";

// -- Fake mailer --

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl EmailSender for FakeMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mailbox unavailable");
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

// -- Fake PayID --

pub struct FakeProvider {
    pub profile: Mutex<ExternalProfile>,
    pub fail_exchange: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub exchanges: Mutex<Vec<(String, String)>>,
    pub kyc_requests: Mutex<Vec<KycRequest>>,
    pub kyc_status: Mutex<KycStatus>,
    pub status_queries: Mutex<Vec<Option<String>>>,
    pub magic_links: Mutex<Vec<MagicLinkDispatch>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            profile: Mutex::new(profile("payid@example.com", Some("payer"))),
            fail_exchange: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            exchanges: Mutex::new(Vec::new()),
            kyc_requests: Mutex::new(Vec::new()),
            kyc_status: Mutex::new(KycStatus::Pending),
            status_queries: Mutex::new(Vec::new()),
            magic_links: Mutex::new(Vec::new()),
        }
    }
}

pub fn profile(email: &str, pay_tag: Option<&str>) -> ExternalProfile {
    ExternalProfile {
        sub: format!("payid|{}", email),
        email: email.to_string(),
        email_verified: true,
        name: Some("Ada Obi".into()),
        given_name: Some("Ada".into()),
        family_name: Some("Obi".into()),
        picture: None,
        phone: Some("+2348000000000".into()),
        phone_verified: false,
        pay_tag: pay_tag.map(str::to_string),
        kyc_verified: false,
        verification_level: Some("basic".into()),
    }
}

impl FakeProvider {
    fn kyc_result(&self, provider: &str) -> KycResult {
        let status = *self.kyc_status.lock().unwrap();
        KycResult {
            session_id: "kyc-session-1".into(),
            status,
            provider: provider.to_string(),
            verification_level: (status == KycStatus::Verified).then(|| "full".to_string()),
            shareable_url: (status == KycStatus::Pending)
                .then(|| "https://kyc.example.com/s/1".to_string()),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, code_challenge: &str, state: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "https://payid.test/oauth/authorize?code_challenge={}&state={}",
            code_challenge, state
        ))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ProviderError> {
        self.exchanges
            .lock()
            .unwrap()
            .push((code.to_string(), code_verifier.to_string()));
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected {
                status: 400,
                message: "invalid_grant".into(),
            });
        }
        Ok(TokenSet {
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            id_token: Some("id-1".into()),
        })
    }

    async fn user_info(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        if !access_token.starts_with("access-") {
            return Err(ProviderError::Rejected {
                status: 401,
                message: "bad token".into(),
            });
        }
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        if self.fail_refresh.load(Ordering::SeqCst) || refresh_token != "refresh-1" {
            return Err(ProviderError::Rejected {
                status: 400,
                message: "invalid_grant".into(),
            });
        }
        Ok(TokenSet {
            access_token: "access-2".into(),
            refresh_token: None,
            id_token: Some("id-2".into()),
        })
    }

    async fn start_kyc(
        &self,
        _access_token: &str,
        request: &KycRequest,
    ) -> Result<KycResult, ProviderError> {
        self.kyc_requests.lock().unwrap().push(request.clone());
        Ok(self.kyc_result(&request.provider))
    }

    async fn kyc_status(
        &self,
        _access_token: &str,
        session_id: Option<&str>,
    ) -> Result<KycResult, ProviderError> {
        self.status_queries
            .lock()
            .unwrap()
            .push(session_id.map(str::to_string));
        Ok(self.kyc_result("qoreid"))
    }

    async fn retry_kyc(
        &self,
        _access_token: &str,
        _session_id: &str,
    ) -> Result<KycResult, ProviderError> {
        Ok(self.kyc_result("qoreid"))
    }

    async fn request_magic_link(&self, request: &MagicLinkDispatch) -> Result<Value, ProviderError> {
        self.magic_links.lock().unwrap().push(request.clone());
        Ok(serde_json::json!({ "sent": true }))
    }
}

// -- Harness --

pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<FakeMailer>,
    pub provider: Arc<FakeProvider>,
}

pub fn test_app() -> TestApp {
    let mailer = Arc::new(FakeMailer::default());
    let provider = Arc::new(FakeProvider::default());
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        sessions: SessionIssuer::new(&[1u8; 32]),
        cipher: TokenCipher::new(&[2u8; 32]),
        hasher: SecretHasher::with_params(8, 1).unwrap(),
        email: mailer.clone(),
        payid: provider.clone(),
        report_limiter: Arc::new(KeyedLimiter::new(5, Duration::from_secs(60))),
        settings: Settings::new(APP_URL),
    });
    TestApp {
        state,
        mailer,
        provider,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        router(self.state.clone()).oneshot(req).await.unwrap()
    }

    pub fn emails(&self) -> Vec<OutgoingEmail> {
        self.mailer.sent.lock().unwrap().clone()
    }

    pub fn last_email(&self) -> OutgoingEmail {
        self.emails().pop().expect("no email sent")
    }

    /// The six-digit code in the most recent OTP email.
    pub fn last_otp(&self) -> String {
        let body = self.last_email().html_body;
        let end = body.find("</h2>").expect("no OTP in email body");
        let code = body[end - 6..end].to_string();
        assert!(code.chars().all(|c| c.is_ascii_digit()), "bad OTP {code}");
        code
    }

    /// The secret embedded in the most recent magic-link email.
    pub fn last_link_token(&self) -> String {
        let body = self.last_email().html_body;
        let start = body.find("token=").expect("no token in email") + "token=".len();
        body[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect()
    }

    /// Insert a user directly, returning its id.
    pub fn add_user(&self, email: &str, pay_tag: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string();
        self.state
            .db
            .create_user(
                &id,
                &NewUser {
                    email: email.to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        if let Some(tag) = pay_tag {
            self.state
                .db
                .with_conn(|conn| {
                    conn.execute("UPDATE users SET pay_tag = ?2 WHERE id = ?1", (&id, tag))?;
                    Ok(())
                })
                .unwrap();
        }
        id
    }

    pub fn make_admin(&self, id: &str) {
        self.state
            .db
            .with_conn(|conn| {
                conn.execute("UPDATE users SET role = 'admin' WHERE id = ?1", [id])?;
                Ok(())
            })
            .unwrap();
    }

    /// Session cookie header value for a stored user.
    pub fn session_cookie_for(&self, id: &str) -> String {
        let user = self.state.db.get_user_by_id(id).unwrap().unwrap();
        let token = self.state.issue_session(&user).unwrap();
        format!("auth-token={}", token)
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request_with_cookie(method: &str, uri: &str, cookie: &str, body: Value) -> Request<Body> {
    let mut req = json_request(method, uri, body);
    req.headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    req
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

pub fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` for the first Set-Cookie named `name`.
pub fn cookie_pair(resp: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(resp)
        .into_iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next().map(str::to_string))
}

pub fn location(resp: &Response<Body>) -> String {
    resp.headers()[header::LOCATION].to_str().unwrap().to_string()
}
