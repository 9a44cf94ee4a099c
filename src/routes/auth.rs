//! Auth routes — actions, current state, change stream, navigation guard.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::backend::ProviderError;
use crate::error::ErrorCode;
use crate::services::coordinator::AuthError;
use crate::services::guard;
use crate::services::registry::Subscription;
use crate::state::AppState;
use crate::user::{ProfileUpdate, UserState};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

/// An [`AuthError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(error = %self.0, code = self.0.error_code(), "auth action failed upstream");
        }
        let body = ErrorBody {
            code: self.0.error_code().to_owned(),
            message: self.0.to_string(),
            retryable: self.0.retryable(),
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials(ProviderError::Rejected { .. }) | AuthError::NotAuthenticated => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::UserNotFound(_) => StatusCode::NOT_FOUND,
        AuthError::InvalidCredentials(source)
        | AuthError::RegistrationFailed { source, .. }
        | AuthError::SignOutFailed(source)
        | AuthError::ProfileFetchFailed(source)
        | AuthError::ProfileUpdateFailed(source) => upstream_status(source),
    }
}

fn upstream_status(source: &ProviderError) -> StatusCode {
    match source {
        ProviderError::Rejected { status: 400..=499, .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ProviderError::NoSession => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/auth/me` — current user state (all-null when anonymous).
pub async fn me(State(state): State<AppState>) -> Json<UserState> {
    Json(state.auth.get_state())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// `POST /api/auth/register` — create account and profile, sign in.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<UserState>, ApiError> {
    state
        .auth
        .register(body.email.trim(), &body.password, body.display_name.trim())
        .await?;
    Ok(Json(state.auth.get_state()))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address, or display name when it contains no `@`.
    pub identifier: String,
    pub password: String,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<UserState>, ApiError> {
    state.auth.login(body.identifier.trim(), &body.password).await?;
    Ok(Json(state.auth.get_state()))
}

/// `POST /api/auth/logout`
pub async fn logout(State(state): State<AppState>) -> Result<Json<UserState>, ApiError> {
    state.auth.logout().await?;
    Ok(Json(state.auth.get_state()))
}

/// `PATCH /api/profile` — update editable profile fields of the signed-in user.
pub async fn update_profile(
    State(state): State<AppState>,
    Json(fields): Json<ProfileUpdate>,
) -> Result<Json<UserState>, ApiError> {
    state.auth.update_profile(fields).await?;
    Ok(Json(state.auth.get_state()))
}

/// Cancels the subscription when the event stream is dropped.
struct Unsubscribe(Subscription);

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

/// `GET /api/auth/events` — one `user` event per state notification,
/// starting with the current state.
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<UserState>();
    let subscription = state.auth.subscribe(move |user| {
        // Receiver gone means the client disconnected; the stream drop unsubscribes.
        let _ = tx.send(user);
    });
    tracing::debug!(
        subscription = subscription.id(),
        subscribers = state.auth.subscriber_count(),
        "auth event stream opened"
    );

    let guard = Unsubscribe(subscription);
    let stream = UnboundedReceiverStream::new(rx).map(move |user| {
        let _keep = &guard;
        Event::default().event("user").json_data(user)
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigateResponse {
    pub path: String,
    /// Where to go instead, or `null` to proceed.
    pub redirect: Option<String>,
}

/// `GET /api/navigate?path=` — guard decision for the current user.
pub async fn navigate(State(state): State<AppState>, Query(query): Query<NavigateQuery>) -> Json<NavigateResponse> {
    let redirect = guard::redirect_for(&query.path, &state.auth.get_state()).map(str::to_owned);
    Json(NavigateResponse { path: query.path, redirect })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
