//! User state — the single "who is logged in" value and its partial updates.
//!
//! DESIGN
//! ======
//! `UserState` is a plain value: subscribers always receive a clone, so
//! nothing outside the coordinator can reach the canonical copy. Changes are
//! expressed as a `UserPatch` whose `None` fields mean "not present" and keep
//! the previous value (shallow merge, not replace).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::Session;

// =============================================================================
// USER STATE
// =============================================================================

/// Current authentication state. `id == None` is the anonymous user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub id: Option<Uuid>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub elo: Option<i32>,
    pub country: Option<String>,
    pub title: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl UserState {
    /// The anonymous value: every field null.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    /// Shallow merge: every field present in `patch` overwrites, including
    /// with null; absent fields are kept.
    pub fn merge(&mut self, patch: &UserPatch) {
        overwrite(&mut self.id, &patch.id);
        overwrite(&mut self.email, &patch.email);
        overwrite(&mut self.display_name, &patch.display_name);
        overwrite(&mut self.bio, &patch.bio);
        overwrite(&mut self.elo, &patch.elo);
        overwrite(&mut self.country, &patch.country);
        overwrite(&mut self.title, &patch.title);
        overwrite(&mut self.avatar_url, &patch.avatar_url);
        overwrite(&mut self.created_at, &patch.created_at);
        overwrite(&mut self.updated_at, &patch.updated_at);
    }
}

fn overwrite<T: Clone>(slot: &mut Option<T>, patch: &Option<Option<T>>) {
    if let Some(value) = patch {
        slot.clone_from(value);
    }
}

fn layer<T: Clone>(slot: &mut Option<Option<T>>, later: &Option<Option<T>>) {
    if later.is_some() {
        slot.clone_from(later);
    }
}

// =============================================================================
// PATCHES
// =============================================================================

/// Partial user data. Also the shape of a profile row as the backend returns it.
///
/// Each field is tri-state: `None` is absent (keep), `Some(None)` is an
/// explicit null (clear), `Some(Some(v))` sets a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub elo: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub country: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Option<String>>,
}

impl UserPatch {
    /// Stack `later` on top: its present fields win.
    pub fn absorb(&mut self, later: &UserPatch) {
        layer(&mut self.id, &later.id);
        layer(&mut self.email, &later.email);
        layer(&mut self.display_name, &later.display_name);
        layer(&mut self.bio, &later.bio);
        layer(&mut self.elo, &later.elo);
        layer(&mut self.country, &later.country);
        layer(&mut self.title, &later.title);
        layer(&mut self.avatar_url, &later.avatar_url);
        layer(&mut self.created_at, &later.created_at);
        layer(&mut self.updated_at, &later.updated_at);
    }
}

impl From<&Session> for UserPatch {
    fn from(session: &Session) -> Self {
        Self { id: Some(Some(session.user_id)), email: session.email.clone().map(Some), ..Self::default() }
    }
}

/// User-editable profile fields. Identity fields (`id`, `email`) are not
/// editable here. An explicit null clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub elo: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub country: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
}

impl ProfileUpdate {
    /// No field present at all. A field set to null still counts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&ProfileUpdate> for UserPatch {
    fn from(update: &ProfileUpdate) -> Self {
        Self {
            display_name: update.display_name.clone(),
            bio: update.bio.clone(),
            elo: update.elo,
            country: update.country.clone(),
            title: update.title.clone(),
            avatar_url: update.avatar_url.clone(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
