//! Backend — the hosted auth and profile services the coordinator talks to.
//!
//! DESIGN
//! ======
//! The coordinator only sees the two traits below. `supabase` is the real
//! HTTP implementation; tests swap in doubles. Both traits are object-safe
//! via `async_trait` so they can be held as `Arc<dyn ...>`.

pub mod supabase;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::{ProfileUpdate, UserPatch};

// =============================================================================
// TYPES
// =============================================================================

/// Backend-issued proof of authentication, reduced to what the client needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Row inserted into the profile table when a user registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors reported by a backend provider. Each carries a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response.
    #[error("backend request failed: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected backend response: {0}")]
    Decode(String),

    /// The operation needs a signed-in session and there is none.
    #[error("no active session")]
    NoSession,

    /// Persisting or loading the local session copy failed.
    #[error("session store failed: {0}")]
    Store(String),
}

impl crate::error::ErrorCode for ProviderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "E_BACKEND_REJECTED",
            Self::Transport(_) => "E_BACKEND_TRANSPORT",
            Self::Decode(_) => "E_BACKEND_DECODE",
            Self::NoSession => "E_NO_SESSION",
            Self::Store(_) => "E_SESSION_STORE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rejected { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// PROVIDER TRAITS
// =============================================================================

/// Session lifecycle: lookup, sign-up, sign-in, sign-out.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Return the session that is already active, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the lookup itself fails.
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Create an account and return its session.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the backend refuses the account.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, ProviderError>;

    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the credentials are rejected.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the backend cannot revoke the session.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Extended profile attributes stored apart from the session identity.
#[async_trait::async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Fetch the profile row of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if there is no session or the row cannot be read.
    async fn fetch_own_profile(&self) -> Result<UserPatch, ProviderError>;

    /// Resolve a display name to the email it was registered with.
    /// `Ok(None)` means no profile has that display name.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the lookup fails.
    async fn find_email_by_display_name(&self, display_name: &str) -> Result<Option<String>, ProviderError>;

    /// Insert a new profile row.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the insert is rejected.
    async fn create(&self, profile: &NewProfile) -> Result<(), ProviderError>;

    /// Update the editable fields of the profile with the given id.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the update is rejected.
    async fn update(&self, id: Uuid, fields: &ProfileUpdate) -> Result<(), ProviderError>;
}
