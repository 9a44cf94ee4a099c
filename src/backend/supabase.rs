//! Supabase client — auth endpoints plus the profile table over REST.
//!
//! DESIGN
//! ======
//! One `SupabaseClient` implements both provider traits so the profile
//! calls can reuse the access token obtained at sign-in. Tokens live in a
//! `SessionStore`, optionally mirrored to a JSON file so a restart picks
//! the previous session back up. Response parsing is kept in pure functions
//! for testability.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx answers become `ProviderError::Rejected` with the message pulled
//! out of the backend's error body. An expired access token during session
//! lookup triggers one refresh attempt; if that fails the stored session is
//! dropped and the lookup reports "no session" rather than an error.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{NewProfile, ProfileProvider, ProviderError, Session, SessionProvider};
use crate::config::BackendConfig;
use crate::user::{ProfileUpdate, UserPatch};

const PGRST_SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

// =============================================================================
// SESSION STORE
// =============================================================================

/// Tokens of the signed-in user, as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl StoredSession {
    fn session(&self) -> Session {
        Session { user_id: self.user_id, email: self.email.clone() }
    }
}

struct SessionStore {
    current: RwLock<Option<StoredSession>>,
    file: Option<PathBuf>,
}

impl SessionStore {
    async fn open(file: Option<PathBuf>) -> Self {
        let current = match &file {
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => match serde_json::from_slice::<StoredSession>(&bytes) {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        warn!(error = %e, path = %path.display(), "ignoring unreadable session file");
                        None
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "session file not readable");
                    None
                }
            },
            None => None,
        };
        Self { current: RwLock::new(current), file }
    }

    async fn get(&self) -> Option<StoredSession> {
        self.current.read().await.clone()
    }

    async fn set(&self, session: Option<StoredSession>) -> Result<(), ProviderError> {
        if let Some(path) = &self.file {
            match &session {
                Some(stored) => {
                    let bytes = serde_json::to_vec(stored).map_err(|e| ProviderError::Store(e.to_string()))?;
                    tokio::fs::write(path, bytes)
                        .await
                        .map_err(|e| ProviderError::Store(e.to_string()))?;
                }
                None => match tokio::fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(ProviderError::Store(e.to_string())),
                },
            }
        }
        *self.current.write().await = session;
        Ok(())
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    profiles_table: String,
    store: SessionStore,
}

impl SupabaseClient {
    /// Build the HTTP client and load any persisted session.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if the HTTP client cannot be built.
    pub async fn connect(config: &BackendConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let store = SessionStore::open(config.session_file.clone()).await;
        Ok(Self {
            http,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            profiles_table: config.profiles_table.clone(),
            store,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.profiles_table)
    }

    /// Attach `apikey` and a bearer token: the user's if signed in, else the anon key.
    async fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self
            .store
            .get()
            .await
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token);
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    /// Execute and require a 2xx status, returning the body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ProviderError> {
        let (status, body) = self.execute(request).await?;
        if !(200..300).contains(&status) {
            return Err(rejected(status, &body));
        }
        Ok(body)
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<StoredSession, ProviderError> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body);
        let text = self.send(request).await?;
        let (_, stored) = parse_auth_response(&text)?;
        stored.ok_or_else(|| ProviderError::Decode("token response without access_token".into()))
    }

    async fn refresh(&self, stored: &StoredSession) -> Option<StoredSession> {
        let refresh_token = stored.refresh_token.as_deref()?;
        match self
            .token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(renewed) => Some(renewed),
            Err(e) => {
                debug!(error = %e, "session refresh failed");
                None
            }
        }
    }

    async fn own_user_id(&self) -> Result<Uuid, ProviderError> {
        self.store
            .get()
            .await
            .map(|s| s.user_id)
            .ok_or(ProviderError::NoSession)
    }
}

#[async_trait::async_trait]
impl SessionProvider for SupabaseClient {
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(stored) = self.store.get().await else {
            return Ok(None);
        };

        let request = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&stored.access_token);
        let (status, body) = self.execute(request).await?;

        if status == 401 || status == 403 {
            let renewed = self.refresh(&stored).await;
            let session = renewed.as_ref().map(StoredSession::session);
            self.store.set(renewed).await?;
            return Ok(session);
        }
        if !(200..300).contains(&status) {
            return Err(rejected(status, &body));
        }

        let user = parse_user(&body)?;
        Ok(Some(Session { user_id: user.id, email: user.email }))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        let request = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }));
        let text = self.send(request).await?;
        let (session, stored) = parse_auth_response(&text)?;
        if stored.is_some() {
            self.store.set(stored).await?;
        }
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        let stored = self
            .token_grant("password", serde_json::json!({ "email": email, "password": password }))
            .await?;
        let session = stored.session();
        self.store.set(Some(stored)).await?;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(stored) = self.store.get().await else {
            return Ok(());
        };

        let request = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&stored.access_token);
        let (status, body) = self.execute(request).await?;
        // An already-expired token means the backend session is gone anyway.
        if !(200..300).contains(&status) && status != 401 {
            return Err(rejected(status, &body));
        }
        self.store.set(None).await
    }
}

#[async_trait::async_trait]
impl ProfileProvider for SupabaseClient {
    async fn fetch_own_profile(&self) -> Result<UserPatch, ProviderError> {
        let id = self.own_user_id().await?;
        let request = self
            .http
            .get(self.table_url())
            .query(&[("select", "*".to_owned()), ("id", format!("eq.{id}"))])
            .header("Accept", PGRST_SINGLE_OBJECT);
        let text = self.send(self.authorized(request).await).await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn find_email_by_display_name(&self, display_name: &str) -> Result<Option<String>, ProviderError> {
        let request = self.http.get(self.table_url()).query(&[
            ("select", "email".to_owned()),
            ("display_name", format!("eq.{display_name}")),
            ("limit", "1".to_owned()),
        ]);
        let text = self.send(self.authorized(request).await).await?;
        parse_email_lookup(&text)
    }

    async fn create(&self, profile: &NewProfile) -> Result<(), ProviderError> {
        let request = self
            .http
            .post(self.table_url())
            .header("Prefer", "return=minimal")
            .json(profile);
        self.send(self.authorized(request).await).await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, fields: &ProfileUpdate) -> Result<(), ProviderError> {
        if fields.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .patch(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(fields);
        self.send(self.authorized(request).await).await?;
        Ok(())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

/// `/signup` and `/token` answer either with a session wrapping a `user`
/// or, when email confirmation is pending, with the bare user object.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthUser>,
    id: Option<Uuid>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailRow {
    email: Option<String>,
}

fn parse_user(text: &str) -> Result<AuthUser, ProviderError> {
    serde_json::from_str(text).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Parse an auth response into the session and, when tokens were issued,
/// the tokens to keep.
fn parse_auth_response(text: &str) -> Result<(Session, Option<StoredSession>), ProviderError> {
    let resp: AuthResponse = serde_json::from_str(text).map_err(|e| ProviderError::Decode(e.to_string()))?;
    let (user_id, email) = match (resp.user, resp.id) {
        (Some(user), _) => (user.id, user.email),
        (None, Some(id)) => (id, resp.email),
        (None, None) => return Err(ProviderError::Decode("auth response without user".into())),
    };

    let session = Session { user_id, email: email.clone() };
    let stored = resp.access_token.map(|access_token| StoredSession {
        access_token,
        refresh_token: resp.refresh_token,
        user_id,
        email,
    });
    Ok((session, stored))
}

fn parse_email_lookup(text: &str) -> Result<Option<String>, ProviderError> {
    let rows: Vec<EmailRow> = serde_json::from_str(text).map_err(|e| ProviderError::Decode(e.to_string()))?;
    Ok(rows.into_iter().find_map(|row| row.email))
}

/// Pull a human-readable message out of an error body. The auth API uses
/// `msg` or `error_description`, the REST API uses `message`.
fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["msg", "error_description", "message", "error"] {
            if let Some(text) = value.get(key).and_then(serde_json::Value::as_str) {
                if !text.trim().is_empty() {
                    return text.to_owned();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() { format!("status {status}") } else { trimmed.to_owned() }
}

fn rejected(status: u16, body: &str) -> ProviderError {
    ProviderError::Rejected { status, message: error_message(status, body) }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
