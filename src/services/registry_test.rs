use std::sync::OnceLock;

use super::*;
use uuid::Uuid;

fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Listener {
    let log = Arc::clone(log);
    let tag = tag.to_owned();
    Arc::new(move |_user: UserState| lock(&log).push(tag.clone()))
}

// =============================================================================
// insert / remove
// =============================================================================

#[test]
fn new_registry_is_empty() {
    let registry = Registry::new();
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.notify(&UserState::anonymous()), 0);
}

#[test]
fn ids_are_unique_and_increasing() {
    let registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = registry.insert(recording(&log, "a"));
    let b = registry.insert(recording(&log, "b"));
    assert!(b > a);
    assert_eq!(registry.len(), 2);
}

#[test]
fn remove_twice_is_a_no_op() {
    let registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = registry.insert(recording(&log, "a"));
    assert!(registry.remove(id));
    assert!(!registry.remove(id));
    assert_eq!(registry.len(), 0);
}

// =============================================================================
// notify
// =============================================================================

#[test]
fn notify_runs_in_subscription_order() {
    let registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        registry.insert(recording(&log, tag));
    }

    assert_eq!(registry.notify(&UserState::anonymous()), 3);
    assert_eq!(*lock(&log), vec!["first", "second", "third"]);
}

#[test]
fn same_listener_registered_twice_gets_two_entries() {
    let registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = recording(&log, "dup");
    let a = registry.insert(Arc::clone(&listener));
    let _b = registry.insert(listener);

    registry.notify(&UserState::anonymous());
    assert_eq!(lock(&log).len(), 2);

    registry.remove(a);
    registry.notify(&UserState::anonymous());
    assert_eq!(lock(&log).len(), 3);
}

#[test]
fn listeners_receive_independent_copies() {
    let registry = Registry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    registry.insert(Arc::new(|mut user: UserState| {
        user.display_name = Some("tampered".into());
    }));
    let sink = Arc::clone(&seen);
    registry.insert(Arc::new(move |user: UserState| lock(&sink).push(user)));

    let user = UserState { id: Some(Uuid::new_v4()), display_name: Some("Ana".into()), ..UserState::default() };
    registry.notify(&user);

    assert_eq!(lock(&seen)[0].display_name.as_deref(), Some("Ana"));
}

#[test]
fn listener_can_remove_itself_mid_round() {
    let registry = Arc::new(Registry::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let own_id: Arc<OnceLock<u64>> = Arc::new(OnceLock::new());

    let reg = Arc::clone(&registry);
    let id_cell = Arc::clone(&own_id);
    let sink = Arc::clone(&log);
    let id = registry.insert(Arc::new(move |_user: UserState| {
        lock(&sink).push("self-removing".to_owned());
        if let Some(id) = id_cell.get() {
            reg.remove(*id);
        }
    }));
    own_id.set(id).unwrap();
    registry.insert(recording(&log, "after"));

    registry.notify(&UserState::anonymous());
    registry.notify(&UserState::anonymous());

    assert_eq!(*lock(&log), vec!["self-removing", "after", "after"]);
}

#[test]
fn listener_removed_earlier_in_round_is_skipped() {
    let registry = Arc::new(Registry::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let victim: Arc<OnceLock<u64>> = Arc::new(OnceLock::new());

    let reg = Arc::clone(&registry);
    let victim_cell = Arc::clone(&victim);
    registry.insert(Arc::new(move |_user: UserState| {
        if let Some(id) = victim_cell.get() {
            reg.remove(*id);
        }
    }));
    let id = registry.insert(recording(&log, "victim"));
    victim.set(id).unwrap();

    assert_eq!(registry.notify(&UserState::anonymous()), 1);
    assert!(lock(&log).is_empty());
}

#[test]
fn listener_added_mid_round_waits_for_next_round() {
    let registry = Arc::new(Registry::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let reg = Arc::clone(&registry);
    let late_log = Arc::clone(&log);
    let added = Arc::new(OnceLock::new());
    registry.insert(Arc::new(move |_user: UserState| {
        if added.set(()).is_ok() {
            reg.insert(recording(&late_log, "late"));
        }
    }));

    assert_eq!(registry.notify(&UserState::anonymous()), 1);
    assert!(lock(&log).is_empty());
    assert_eq!(registry.notify(&UserState::anonymous()), 2);
    assert_eq!(*lock(&log), vec!["late"]);
}

// =============================================================================
// Subscription
// =============================================================================

#[test]
fn subscription_unsubscribe_is_idempotent() {
    let registry = Arc::new(Registry::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = registry.insert(recording(&log, "a"));
    let sub = Subscription::new(id, &registry);

    assert!(sub.is_active());
    sub.unsubscribe();
    sub.unsubscribe();
    assert!(!sub.is_active());
    assert_eq!(registry.len(), 0);
}

#[test]
fn subscription_outliving_registry_is_inert() {
    let registry = Arc::new(Registry::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = registry.insert(recording(&log, "a"));
    let sub = Subscription::new(id, &registry);
    drop(registry);

    assert!(!sub.is_active());
    sub.unsubscribe();
    assert!(format!("{sub:?}").contains("active: false"));
}
