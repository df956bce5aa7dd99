mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{TestApp, SELLER_EMAIL, SELLER_PASSWORD};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn login_sets_cookie_that_opens_the_seller_routes() {
    let app = TestApp::new().await;

    let login = app
        .request_json(
            Method::POST,
            "/api/seller/login",
            Some(json!({"email": SELLER_EMAIL, "password": SELLER_PASSWORD})),
            false,
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["message"], "Logged In");
    let cookie = login.set_cookie.expect("session cookie");
    assert!(cookie.starts_with("sellerToken="));
    assert!(cookie.contains("HttpOnly"));

    let pair = cookie.split(';').next().unwrap().to_string();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/seller/is-auth")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::new().await;
    let login = app
        .request_json(
            Method::POST,
            "/api/seller/login",
            Some(json!({"email": SELLER_EMAIL, "password": "guess"})),
            false,
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(login.body["message"], "Invalid Credentials");
    assert!(login.set_cookie.is_none());
}

#[tokio::test]
async fn is_auth_needs_a_valid_token() {
    let app = TestApp::new().await;

    let anonymous = app.get("/api/seller/is-auth").await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["message"], "Not Authorized");

    let forged = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/seller/is-auth")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let authed = app
        .request_json(Method::GET, "/api/seller/is-auth", None, true)
        .await;
    assert_eq!(authed.status, StatusCode::OK);
    assert_eq!(authed.body["success"], true);
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = TestApp::new().await;
    let response = app.get("/api/seller/logout").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Logged Out");
    assert!(response.set_cookie.unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"success": true, "status": "ok"}));
}
