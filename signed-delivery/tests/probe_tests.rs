mod common;

use common::*;

use axum::{
    http::{header::COOKIE, HeaderMap, StatusCode},
    routing::get,
    Router,
};
use cdn_signer::{AccessPolicy, CookieOptions, SignedCookieSet};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use signed_delivery::probe::{AccessProbe, HttpCookieProbe, ProbeError};
use tokio::net::TcpListener;

/// Serves the received `Cookie` header back, or 403 without one
async fn echo_cookies(headers: HeaderMap) -> (StatusCode, String) {
    match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
        Some(cookie) => (StatusCode::OK, cookie.to_string()),
        None => (StatusCode::FORBIDDEN, "missing cookies".to_string()),
    }
}

async fn start_echo_server() -> String {
    let app = Router::new()
        .route("/mysubpath/hello.txt", get(echo_cookies))
        .route("/denied", get(|| async { (StatusCode::FORBIDDEN, "AccessDenied") }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn signed_cookies() -> SignedCookieSet {
    let policy = AccessPolicy::for_resource(
        "https://d111111abcdef8.cloudfront.net/mysubpath/*",
        Utc::now() + Duration::hours(1),
    );
    let options = CookieOptions {
        domain: Some("localhost".to_string()),
        ..CookieOptions::default()
    };
    test_signer().sign_cookies(&policy, &options).unwrap()
}

#[tokio::test]
async fn test_probe_sends_only_name_value_pairs() {
    let base = start_echo_server().await;
    let cookies = signed_cookies();

    let response = HttpCookieProbe::new()
        .fetch(&format!("{base}/mysubpath/hello.txt"), &cookies)
        .await
        .expect("probe should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, cookies.to_cookie_header());
    for attribute in ["Path=", "Domain=", "Expires=", "HttpOnly", "Secure"] {
        assert!(
            !response.body.contains(&format!("; {attribute}")),
            "attribute {attribute} leaked into Cookie header"
        );
    }
}

#[tokio::test]
async fn test_probe_returns_denied_responses() {
    let base = start_echo_server().await;

    let response = HttpCookieProbe::new()
        .fetch(&format!("{base}/denied"), &signed_cookies())
        .await
        .expect("non-2xx is not a transport error");

    assert_eq!(response.status, 403);
    assert_eq!(response.body, "AccessDenied");
}

#[tokio::test]
async fn test_probe_reports_unreachable_host() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}/mysubpath/hello.txt");
    let err = HttpCookieProbe::new()
        .fetch(&url, &signed_cookies())
        .await
        .expect_err("connection should be refused");

    match err {
        ProbeError::Transport { url: failed, .. } => assert_eq!(failed, url),
    }
}
