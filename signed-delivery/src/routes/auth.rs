use std::sync::Arc;

use axum::{
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use cdn_signer::SignedCookieSet;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    message: &'static str,
}

/// Hands out the signed cookies.
///
/// Every caller receives the same cookie set, signed once at startup, so all of them share the
/// same expiry.
pub async fn handler(Extension(cookies): Extension<Arc<SignedCookieSet>>) -> impl IntoResponse {
    let set_cookies: Vec<_> = cookies
        .iter()
        .map(|cookie| (SET_COOKIE, cookie.to_set_cookie()))
        .collect();

    (
        AppendHeaders(set_cookies),
        Json(AuthResponse { message: "ok" }),
    )
}
