use std::sync::Arc;

use super::test_helpers::{MemoryBackend, test_app_state};

#[tokio::test]
async fn clones_share_one_coordinator() {
    let backend = MemoryBackend::with_member("ana@club.cl", "secret", "Ana");
    let state = test_app_state(Arc::clone(&backend)).await;
    let clone = state.clone();

    state.auth.login("Ana", "secret").await.unwrap();
    clone.auth.settled().await;

    assert_eq!(clone.auth.get_state().display_name.as_deref(), Some("Ana"));
    assert!(backend.has_session());
}

#[tokio::test]
async fn fresh_state_is_anonymous() {
    let state = test_app_state(Arc::new(MemoryBackend::default())).await;
    assert_eq!(state.auth.get_state(), crate::user::UserState::anonymous());
}
