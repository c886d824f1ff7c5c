mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use bucket_types::models::VerificationPurpose;
use chrono::Utc;
use common::*;
use serde_json::json;

async fn request_otp(app: &TestApp, email: &str, should_create: bool) -> StatusCode {
    app.send(json_request(
        "POST",
        "/api/v1/auth/otp/request",
        json!({ "email": email, "shouldCreate": should_create }),
    ))
    .await
    .status()
}

async fn verify_otp(app: &TestApp, email: &str, otp: &str) -> axum::http::Response<axum::body::Body> {
    app.send(json_request(
        "POST",
        "/api/v1/auth/otp/verify",
        json!({ "email": email, "otp": otp, "returnUrl": "/wallet" }),
    ))
    .await
}

#[tokio::test]
async fn otp_sign_up_creates_verified_user_and_session() {
    let app = test_app();

    assert_eq!(request_otp(&app, "New@Example.com", true).await, StatusCode::OK);
    let mail = app.last_email();
    assert_eq!(mail.to, "new@example.com");
    let otp = app.last_otp();

    let resp = verify_otp(&app, "new@example.com", &otp).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let session = cookie_pair(&resp, "auth-token").expect("session cookie");
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["redirectUrl"], "/wallet");

    let user = app
        .state
        .db
        .get_user_by_email("new@example.com")
        .unwrap()
        .unwrap();
    assert!(user.email_verified);
    assert!(user.password.is_none());

    let resp = app.send(get_request("/api/v1/auth/session", Some(&session))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["email"], "new@example.com");
    assert_eq!(body["data"]["emailVerified"], true);
}

#[tokio::test]
async fn otp_cannot_be_replayed() {
    let app = test_app();
    request_otp(&app, "ada@example.com", true).await;
    let otp = app.last_otp();

    assert_eq!(verify_otp(&app, "ada@example.com", &otp).await.status(), StatusCode::OK);

    let resp = verify_otp(&app, "ada@example.com", &otp).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Invalid or expired code");
}

#[tokio::test]
async fn expired_otp_is_rejected() {
    let app = test_app();
    request_otp(&app, "ada@example.com", true).await;
    let otp = app.last_otp();

    app.state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE verification_tokens SET expires_at = ?1",
                [Utc::now().timestamp() - 1],
            )?;
            Ok(())
        })
        .unwrap();

    let resp = verify_otp(&app, "ada@example.com", &otp).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.db.get_user_by_email("ada@example.com").unwrap().is_none());
}

#[tokio::test]
async fn new_request_supersedes_earlier_code() {
    let app = test_app();
    request_otp(&app, "ada@example.com", true).await;
    let first = app.last_otp();
    request_otp(&app, "ada@example.com", true).await;
    let second = app.last_otp();

    let live = app
        .state
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM verification_tokens WHERE identifier = 'ada@example.com'",
                [],
                |row| row.get::<_, i64>(0),
            )?)
        })
        .unwrap();
    assert_eq!(live, 1);

    if first != second {
        assert_eq!(
            verify_otp(&app, "ada@example.com", &first).await.status(),
            StatusCode::BAD_REQUEST
        );
    }
    assert_eq!(
        verify_otp(&app, "ada@example.com", &second).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn wrong_code_leaves_the_token_redeemable() {
    let app = test_app();
    request_otp(&app, "ada@example.com", true).await;
    let otp = app.last_otp();
    let wrong = if otp == "000000" { "111111" } else { "000000" };

    let resp = verify_otp(&app, "ada@example.com", wrong).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(cookie_pair(&resp, "auth-token").is_none());

    assert_eq!(verify_otp(&app, "ada@example.com", &otp).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_email_without_create_is_not_found() {
    let app = test_app();
    assert_eq!(
        request_otp(&app, "ghost@example.com", false).await,
        StatusCode::NOT_FOUND
    );
    assert!(app.emails().is_empty());
}

#[tokio::test]
async fn existing_user_can_request_without_create() {
    let app = test_app();
    app.add_user("ada@example.com", None);
    assert_eq!(request_otp(&app, "ada@example.com", false).await, StatusCode::OK);
}

#[tokio::test]
async fn failed_dispatch_withdraws_the_token() {
    let app = test_app();
    app.mailer.fail.store(true, Ordering::SeqCst);

    let resp = app
        .send(json_request(
            "POST",
            "/api/v1/auth/otp/request",
            json!({ "email": "ada@example.com", "shouldCreate": true }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["message"], "Failed to send verification email");

    let token = app
        .state
        .db
        .find_live_verification_token("ada@example.com", VerificationPurpose::Otp, Utc::now().timestamp())
        .unwrap();
    assert!(token.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemption_has_one_winner() {
    let app = test_app();
    request_otp(&app, "race@example.com", true).await;
    let otp = app.last_otp();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let router = bucket_api::router(app.state.clone());
        let otp = otp.clone();
        handles.push(tokio::spawn(async move {
            use tower::ServiceExt;
            router
                .oneshot(json_request(
                    "POST",
                    "/api/v1/auth/otp/verify",
                    json!({ "email": "race@example.com", "otp": otp }),
                ))
                .await
                .unwrap()
                .status()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn magic_link_signs_in_with_redirect() {
    let app = test_app();
    let resp = app
        .send(json_request(
            "POST",
            "/api/v1/auth/magic-link/request",
            json!({ "email": "link@example.com", "shouldCreate": true, "returnUrl": "/settings" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mail = app.last_email();
    assert!(mail.html_body.contains("/api/v1/auth/magic-link/verify?email=link%40example.com"));
    let token = app.last_link_token();
    assert_eq!(token.len(), 64);

    let uri = format!(
        "/api/v1/auth/magic-link/verify?email=link%40example.com&token={}&returnUrl=%2Fsettings",
        token
    );
    let resp = app.send(get_request(&uri, None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("{}/settings", APP_URL));
    assert!(cookie_pair(&resp, "auth-token").is_some());

    let resp = app.send(get_request(&uri, None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp),
        format!("{}/auth/error?message=Magic+link+expired+or+invalid", APP_URL)
    );
}

#[tokio::test]
async fn magic_link_missing_parameters_redirects_to_error_page() {
    let app = test_app();
    let resp = app
        .send(get_request("/api/v1/auth/magic-link/verify?email=a%40b.com", None))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp),
        format!("{}/auth/error?message=Missing+magic+link+parameters", APP_URL)
    );
}

#[tokio::test]
async fn magic_link_rejects_offsite_return_url() {
    let app = test_app();
    app.send(json_request(
        "POST",
        "/api/v1/auth/magic-link/request",
        json!({ "email": "link@example.com", "shouldCreate": true }),
    ))
    .await;
    let token = app.last_link_token();

    let uri = format!(
        "/api/v1/auth/magic-link/verify?email=link%40example.com&token={}&returnUrl=https%3A%2F%2Fevil.example.com",
        token
    );
    let resp = app.send(get_request(&uri, None)).await;
    assert_eq!(location(&resp), format!("{}/dashboard", APP_URL));
}

#[tokio::test]
async fn magic_link_with_control_chars_in_return_url_still_signs_in() {
    let app = test_app();
    app.send(json_request(
        "POST",
        "/api/v1/auth/magic-link/request",
        json!({ "email": "link@example.com", "shouldCreate": true }),
    ))
    .await;
    let token = app.last_link_token();

    let uri = format!(
        "/api/v1/auth/magic-link/verify?email=link%40example.com&token={}&returnUrl=%2Fx%0Ay",
        token
    );
    let resp = app.send(get_request(&uri, None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("{}/dashboard", APP_URL));
    assert!(cookie_pair(&resp, "auth-token").is_some());
}

#[tokio::test]
async fn otp_sign_in_consumes_referral_cookie() {
    let app = test_app();
    let referrer = app.add_user("ref@example.com", Some("referrer"));
    request_otp(&app, "friend@example.com", true).await;
    let otp = app.last_otp();

    let resp = app
        .send(json_request_with_cookie(
            "POST",
            "/api/v1/auth/otp/verify",
            &format!("bucket-referral={}", referrer),
            json!({ "email": "friend@example.com", "otp": otp }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = set_cookies(&resp)
        .into_iter()
        .find(|c| c.starts_with("bucket-referral="))
        .expect("referral cookie cleared");
    assert!(cleared.contains("Max-Age=0"));

    let friend = app
        .state
        .db
        .get_user_by_email("friend@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(friend.referred_by.as_deref(), Some(referrer.as_str()));
}
