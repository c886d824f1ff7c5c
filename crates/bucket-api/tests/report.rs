mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::*;
use serde_json::json;

fn report_from(client: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/system/report-error")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn report_without_admins_is_accepted() {
    let app = test_app();
    let resp = app
        .send(report_from("198.51.100.1", json!({ "message": "boom" })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Error reported internally.");
    assert!(app.emails().is_empty());
}

#[tokio::test]
async fn admins_are_mailed_escaped_reports() {
    let app = test_app();
    let admin = app.add_user("admin@example.com", None);
    app.make_admin(&admin);
    app.add_user("user@example.com", None);

    let resp = app
        .send(report_from(
            "198.51.100.1",
            json!({
                "message": "<script>alert(1)</script>",
                "digest": "abc123",
                "stack": "at render",
                "path": "/wallet"
            }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await["message"],
        "Error reported and admins notified."
    );

    let sent = app.emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.com");
    assert!(sent[0].subject.starts_with("[CRITICAL] Bucket Error Report:"));
    assert!(!sent[0].html_body.contains("<script>"));
    assert!(sent[0].html_body.contains("/wallet"));
}

#[tokio::test]
async fn sixth_report_in_a_window_is_limited() {
    let app = test_app();
    for _ in 0..5 {
        let resp = app
            .send(report_from("203.0.113.7", json!({ "digest": "d1" })))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .send(report_from("203.0.113.7", json!({ "digest": "d1" })))
        .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other clients have their own budget.
    let resp = app
        .send(report_from("203.0.113.8", json!({ "digest": "d1" })))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn empty_or_malformed_reports_are_rejected() {
    let app = test_app();
    let resp = app.send(report_from("198.51.100.2", json!({}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Empty error report");

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/system/report-error")
        .body(Body::from("not json"))
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Invalid error report");
}
