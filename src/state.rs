//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the one auth coordinator of the process; every handler reads
//! and changes the same user state through it.

use crate::services::coordinator::AuthCoordinator;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; the coordinator is a cheap `Arc` handle.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthCoordinator,
}

impl AppState {
    #[must_use]
    pub fn new(auth: AuthCoordinator) -> Self {
        Self { auth }
    }
}


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
