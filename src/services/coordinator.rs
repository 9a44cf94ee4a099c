//! Auth coordinator — single source of truth for "who is logged in".
//!
//! DESIGN
//! ======
//! One `AuthCoordinator` owns one `UserState`, a listener registry, and the
//! two backend providers. Every state change goes through `commit`, which
//! applies the change and then runs exactly one notification round.
//! `subscribe` replays the current state to the new listener immediately.
//!
//! CONCURRENCY
//! ===========
//! - Actions (register/login/logout/update-profile) are serialized by an
//!   async gate: one in-flight action, later callers queue FIFO. Bootstrap
//!   takes the gate at construction, before any caller can.
//! - The full profile is merged by a background task after login and
//!   bootstrap. Each identity change bumps an epoch; a merge started under
//!   an older epoch is discarded instead of painting a stale profile over
//!   a newer identity.
//! - Notification rounds run under a delivery lock so rounds never
//!   interleave across threads. The lock is skipped when re-entered from a
//!   listener on the same thread, so listeners may subscribe, unsubscribe
//!   or read state from inside a callback.
//!
//! ERROR HANDLING
//! ==============
//! Register/login/logout/update-profile failures are returned as
//! `AuthError` and leave state untouched (one exception on register, see
//! there). Session lookup and profile fetch
//! failures during bootstrap/login are logged; the user stays anonymous or
//! keeps the basic (session-only) identity respectively.

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{NewProfile, ProfileProvider, ProviderError, SessionProvider};
use crate::services::registry::{Listener, Registry, Subscription, lock};
use crate::user::{ProfileUpdate, UserPatch, UserState};

// =============================================================================
// ERROR
// =============================================================================

/// Which half of registration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    /// Creating the auth identity.
    Session,
    /// Inserting the profile row for the new identity.
    Profile,
}

impl std::fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::Profile => f.write_str("profile"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(#[source] ProviderError),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("registration failed at {step} step: {source}")]
    RegistrationFailed {
        step: RegistrationStep,
        #[source]
        source: ProviderError,
    },
    #[error("sign out failed: {0}")]
    SignOutFailed(#[source] ProviderError),
    #[error("profile fetch failed: {0}")]
    ProfileFetchFailed(#[source] ProviderError),
    #[error("profile update failed: {0}")]
    ProfileUpdateFailed(#[source] ProviderError),
    #[error("not authenticated")]
    NotAuthenticated,
}

impl crate::error::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials(_) => "E_INVALID_CREDENTIALS",
            Self::UserNotFound(_) => "E_USER_NOT_FOUND",
            Self::RegistrationFailed { step: RegistrationStep::Session, .. } => "E_REGISTRATION_SESSION",
            Self::RegistrationFailed { step: RegistrationStep::Profile, .. } => "E_REGISTRATION_PROFILE",
            Self::SignOutFailed(_) => "E_SIGN_OUT_FAILED",
            Self::ProfileFetchFailed(_) => "E_PROFILE_FETCH_FAILED",
            Self::ProfileUpdateFailed(_) => "E_PROFILE_UPDATE_FAILED",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::InvalidCredentials(source)
            | Self::RegistrationFailed { source, .. }
            | Self::SignOutFailed(source)
            | Self::ProfileFetchFailed(source)
            | Self::ProfileUpdateFailed(source) => crate::error::ErrorCode::retryable(source),
            Self::UserNotFound(_) | Self::NotAuthenticated => false,
        }
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Current state plus the identity epoch it belongs to.
struct Tracked {
    user: UserState,
    epoch: u64,
    /// Bumped by every accepted profile update.
    revision: u64,
    /// Profile updates accepted during the current epoch, latest on top.
    edits: UserPatch,
}

impl Tracked {
    fn anonymous() -> Self {
        Self { user: UserState::anonymous(), epoch: 0, revision: 0, edits: UserPatch::default() }
    }

    /// Drop the identity and everything tied to it.
    fn sign_out(&mut self) {
        self.epoch += 1;
        self.user = UserState::anonymous();
        self.edits = UserPatch::default();
    }
}

struct Inner {
    sessions: Arc<dyn SessionProvider>,
    profiles: Arc<dyn ProfileProvider>,
    state: Mutex<Tracked>,
    registry: Arc<Registry>,
    /// Held for the duration of a commit + notification round.
    delivery: Mutex<()>,
    /// Thread currently inside a notification round, for re-entrant calls.
    delivering: Mutex<Option<ThreadId>>,
    /// One in-flight action at a time.
    actions: Arc<tokio::sync::Mutex<()>>,
    /// Bootstrap and profile-merge tasks not yet awaited by `settled`.
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone; all clones share the same state and listeners.
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

impl AuthCoordinator {
    fn new(sessions: Arc<dyn SessionProvider>, profiles: Arc<dyn ProfileProvider>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions,
                profiles,
                state: Mutex::new(Tracked::anonymous()),
                registry: Arc::new(Registry::new()),
                delivery: Mutex::new(()),
                delivering: Mutex::new(None),
                actions: Arc::new(tokio::sync::Mutex::new(())),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a coordinator and start restoring any existing session.
    ///
    /// Must be called inside a Tokio runtime. The state is anonymous until
    /// the bootstrap finishes; await [`AuthCoordinator::settled`] to wait for it.
    #[must_use]
    pub fn start(sessions: Arc<dyn SessionProvider>, profiles: Arc<dyn ProfileProvider>) -> Self {
        let coordinator = Self::new(sessions, profiles);
        let gate = Arc::clone(&coordinator.inner.actions).try_lock_owned().ok();
        let this = coordinator.clone();
        let handle = tokio::spawn(async move {
            let _gate = gate;
            this.bootstrap().await;
        });
        coordinator.track(handle);
        coordinator
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    /// Current state, as an independent copy.
    #[must_use]
    pub fn get_state(&self) -> UserState {
        lock(&self.inner.state).user.clone()
    }

    /// Register `listener`, call it once with the current state, and keep
    /// calling it on every change until the returned handle is unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(UserState) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.with_delivery(|| {
            let id = self.inner.registry.insert(Arc::clone(&listener));
            listener(self.get_state());
            Subscription::new(id, &self.inner.registry)
        })
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Wait until bootstrap and any pending profile merges have finished.
    pub async fn settled(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.inner.background));
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!(error = %e, "background auth task did not complete");
                }
            }
        }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Create an account, insert its profile row, and sign the user in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RegistrationFailed`] naming the step that failed.
    /// State is unchanged on error, except that a user signed in before the
    /// call is reset to anonymous when the profile step fails, since the
    /// sign-up replaced their backend session.
    pub async fn register(&self, email: &str, password: &str, display_name: &str) -> Result<(), AuthError> {
        let _action = self.inner.actions.lock().await;

        let session = self
            .inner
            .sessions
            .sign_up(email, password)
            .await
            .map_err(|source| AuthError::RegistrationFailed { step: RegistrationStep::Session, source })?;

        let profile =
            NewProfile { id: session.user_id, email: email.to_owned(), display_name: display_name.to_owned() };
        if let Err(source) = self.inner.profiles.create(&profile).await {
            // The auth identity now exists without a profile row. The anon
            // client cannot delete it, so only the backend session is ended.
            warn!(error = %source, user_id = %session.user_id, "profile insert failed after sign-up");
            if let Err(e) = self.inner.sessions.sign_out().await {
                warn!(error = %e, user_id = %session.user_id, "sign-out after failed registration failed");
            }
            // Sign-up replaced any earlier backend session, so a user shown
            // as signed in before this call is not signed in anymore.
            self.commit(|tracked| {
                if !tracked.user.is_authenticated() {
                    return false;
                }
                tracked.sign_out();
                true
            });
            return Err(AuthError::RegistrationFailed { step: RegistrationStep::Profile, source });
        }

        let patch = UserPatch {
            id: Some(Some(session.user_id)),
            email: Some(Some(email.to_owned())),
            display_name: Some(Some(display_name.to_owned())),
            ..UserPatch::default()
        };
        self.set_identity(&patch);
        info!(user_id = %session.user_id, "registered");
        Ok(())
    }

    /// Sign in with an email, or with a display name that is resolved to
    /// its email first. The full profile is merged in the background.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] if a display name does not
    /// resolve, or [`AuthError::InvalidCredentials`] if sign-in fails.
    /// State is unchanged on error.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(), AuthError> {
        let _action = self.inner.actions.lock().await;

        let email = self.resolve_login_email(identifier).await?;
        let session = self
            .inner
            .sessions
            .sign_in(&email, password)
            .await
            .map_err(AuthError::InvalidCredentials)?;

        let epoch = self.set_identity(&UserPatch::from(&session));
        info!(user_id = %session.user_id, "logged in");
        self.spawn_profile_merge(epoch);
        Ok(())
    }

    /// Sign out and reset the state to anonymous.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SignOutFailed`]; state is unchanged on error.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _action = self.inner.actions.lock().await;

        self.inner
            .sessions
            .sign_out()
            .await
            .map_err(AuthError::SignOutFailed)?;

        self.commit(|tracked| {
            tracked.sign_out();
            true
        });
        info!("logged out");
        Ok(())
    }

    /// Persist profile edits and merge them into the state.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when nobody is signed in, or
    /// [`AuthError::ProfileUpdateFailed`] if the backend rejects the update.
    /// State is unchanged on error.
    pub async fn update_profile(&self, fields: ProfileUpdate) -> Result<(), AuthError> {
        let _action = self.inner.actions.lock().await;

        let Some(id) = self.get_state().id else {
            return Err(AuthError::NotAuthenticated);
        };

        if let Err(source) = self.inner.profiles.update(id, &fields).await {
            warn!(error = %source, user_id = %id, "profile update failed");
            return Err(AuthError::ProfileUpdateFailed(source));
        }

        let patch = UserPatch::from(&fields);
        self.commit(|tracked| {
            tracked.revision += 1;
            tracked.edits.absorb(&patch);
            tracked.user.merge(&patch);
            true
        });
        Ok(())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn bootstrap(&self) {
        let session = match self.inner.sessions.get_current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("no existing session; starting anonymous");
                return;
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed; starting anonymous");
                return;
            }
        };

        let epoch = self.set_identity(&UserPatch::from(&session));
        info!(user_id = %session.user_id, "restored session");
        self.spawn_profile_merge(epoch);
    }

    async fn resolve_login_email(&self, identifier: &str) -> Result<String, AuthError> {
        if identifier.contains('@') {
            return Ok(identifier.to_owned());
        }

        match self.inner.profiles.find_email_by_display_name(identifier).await {
            Ok(Some(email)) => Ok(email),
            Ok(None) => Err(AuthError::UserNotFound(identifier.to_owned())),
            Err(e) => {
                debug!(error = %e, display_name = identifier, "display name lookup failed");
                Err(AuthError::UserNotFound(identifier.to_owned()))
            }
        }
    }

    fn spawn_profile_merge(&self, epoch: u64) {
        let revision = lock(&self.inner.state).revision;
        let this = self.clone();
        let handle = tokio::spawn(async move { this.merge_full_profile(epoch, revision).await });
        self.track(handle);
    }

    /// Merge the fetched profile row. Updates accepted after `revision` may
    /// be missing from the row, so they are laid back on top of it.
    async fn merge_full_profile(&self, epoch: u64, revision: u64) {
        let mut profile = match self.inner.profiles.fetch_own_profile().await {
            Ok(profile) => profile,
            Err(source) => {
                let err = AuthError::ProfileFetchFailed(source);
                warn!(error = %err, "keeping session-only identity");
                return;
            }
        };
        // Identity comes from the session, never from the profile row.
        profile.id = None;

        let applied = self.commit(|tracked| {
            if tracked.epoch != epoch {
                return false;
            }
            tracked.user.merge(&profile);
            if tracked.revision != revision {
                tracked.user.merge(&tracked.edits);
            }
            true
        });
        if applied.is_none() {
            debug!(epoch, "identity changed while profile loaded; discarding");
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut background = lock(&self.inner.background);
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Move to the identity in `patch` and return the new epoch. Switching
    /// to a different user starts from anonymous so no field of the previous
    /// user survives.
    fn set_identity(&self, patch: &UserPatch) -> u64 {
        let epoch = self.commit(|tracked| {
            if tracked.user.id.is_some() && tracked.user.id != patch.id.flatten() {
                tracked.sign_out();
            } else {
                tracked.epoch += 1;
                tracked.edits = UserPatch::default();
            }
            tracked.user.merge(patch);
            true
        });
        epoch.unwrap_or_default()
    }

    /// Apply `change` and run one notification round. `change` returns
    /// `false` to abandon the commit; nothing is delivered then.
    fn commit(&self, change: impl FnOnce(&mut Tracked) -> bool) -> Option<u64> {
        self.with_delivery(|| {
            let (snapshot, epoch) = {
                let mut tracked = lock(&self.inner.state);
                if !change(&mut tracked) {
                    return None;
                }
                (tracked.user.clone(), tracked.epoch)
            };
            self.inner.registry.notify(&snapshot);
            Some(epoch)
        })
    }

    fn with_delivery<T>(&self, f: impl FnOnce() -> T) -> T {
        let current = thread::current().id();
        if *lock(&self.inner.delivering) == Some(current) {
            return f();
        }

        let _delivery = lock(&self.inner.delivery);
        *lock(&self.inner.delivering) = Some(current);
        let _reset = DeliveringReset(&self.inner.delivering);
        f()
    }

    #[cfg(test)]
    fn current_epoch(&self) -> u64 {
        lock(&self.inner.state).epoch
    }
}

/// Clears the delivering marker even if a listener panics.
struct DeliveringReset<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for DeliveringReset<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
