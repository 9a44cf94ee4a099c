use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

const REQUIRED: [(&str, &str); 2] = [("SUPABASE_URL", "https://club.supabase.co"), ("SUPABASE_ANON_KEY", "anon-key")];

// =============================================================================
// BackendConfig
// =============================================================================

#[test]
fn backend_defaults() {
    let cfg = BackendConfig::from_lookup(lookup(&REQUIRED)).unwrap();
    assert_eq!(cfg.url, "https://club.supabase.co");
    assert_eq!(cfg.anon_key, "anon-key");
    assert_eq!(cfg.profiles_table, DEFAULT_PROFILES_TABLE);
    assert_eq!(cfg.session_file, None);
    assert_eq!(
        cfg.timeouts,
        Timeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
}

#[test]
fn backend_overrides() {
    let cfg = BackendConfig::from_lookup(lookup(&[
        ("SUPABASE_URL", "http://localhost:54321/"),
        ("SUPABASE_ANON_KEY", "k"),
        ("GAMBITO_PROFILES_TABLE", "user_profiles"),
        ("GAMBITO_SESSION_FILE", "/tmp/gambito-session.json"),
        ("GAMBITO_REQUEST_TIMEOUT_SECS", "5"),
        ("GAMBITO_CONNECT_TIMEOUT_SECS", "2"),
    ]))
    .unwrap();
    assert_eq!(cfg.url, "http://localhost:54321");
    assert_eq!(cfg.profiles_table, "user_profiles");
    assert_eq!(cfg.session_file, Some(PathBuf::from("/tmp/gambito-session.json")));
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 5, connect_secs: 2 });
}

#[test]
fn backend_missing_url() {
    let err = BackendConfig::from_lookup(lookup(&[("SUPABASE_ANON_KEY", "k")])).unwrap_err();
    assert_eq!(err, ConfigError::Missing("SUPABASE_URL"));
}

#[test]
fn backend_blank_key_counts_as_missing() {
    let err = BackendConfig::from_lookup(lookup(&[("SUPABASE_URL", "https://x.co"), ("SUPABASE_ANON_KEY", "  ")]))
        .unwrap_err();
    assert_eq!(err, ConfigError::Missing("SUPABASE_ANON_KEY"));
}

#[test]
fn backend_rejects_url_without_scheme() {
    let err = BackendConfig::from_lookup(lookup(&[("SUPABASE_URL", "club.supabase.co"), ("SUPABASE_ANON_KEY", "k")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "SUPABASE_URL", .. }));
}

#[test]
fn backend_rejects_bad_timeout() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("GAMBITO_REQUEST_TIMEOUT_SECS", "soon"));
    let err = BackendConfig::from_lookup(lookup(&pairs)).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "GAMBITO_REQUEST_TIMEOUT_SECS", value: "soon".into() });
}

#[test]
fn backend_blank_table_uses_default() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("GAMBITO_PROFILES_TABLE", ""));
    let cfg = BackendConfig::from_lookup(lookup(&pairs)).unwrap();
    assert_eq!(cfg.profiles_table, DEFAULT_PROFILES_TABLE);
}

// =============================================================================
// ServerConfig
// =============================================================================

#[test]
fn server_defaults() {
    let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
}

#[test]
fn server_overrides() {
    let cfg = ServerConfig::from_lookup(lookup(&[("PORT", "8080"), ("BIND_ADDR", "0.0.0.0")])).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0");
}

#[test]
fn server_rejects_bad_port() {
    let err = ServerConfig::from_lookup(lookup(&[("PORT", "70000")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
}
