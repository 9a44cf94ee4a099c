//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! A small local HTTP surface over the process's auth coordinator: actions
//! as JSON endpoints, state changes as a server-sent event stream, and the
//! navigation guard as a query endpoint.

pub mod auth;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/events", get(auth::events))
        .route("/api/profile", patch(auth::update_profile))
        .route("/api/navigate", get(auth::navigate))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
