mod auth;
mod health;

use axum::{routing::get, Router};

/// Creates the router with all handler routes
pub fn handler() -> Router {
    Router::new()
        .route("/auth", get(auth::handler))
        .route("/health", get(health::handler))
}
