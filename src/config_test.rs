use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn from_lookup_defaults_when_unset() {
    let cfg = ChatConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg, ChatConfig::default());
    assert_eq!(cfg.typing_idle, Duration::from_millis(1000));
    assert_eq!(cfg.join_timeout, Duration::from_secs(10));
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = ChatConfig::from_lookup(lookup_from(&[
        ("ROOMCHAT_BACKEND_URL", "https://chat.example.test/"),
        ("ROOMCHAT_SOCKET_PATH", "/rt/"),
        ("ROOMCHAT_TYPING_IDLE_MS", "250"),
        ("ROOMCHAT_JOIN_TIMEOUT_SECS", " 3 "),
    ]))
    .unwrap();
    assert_eq!(cfg.backend_url, "https://chat.example.test");
    assert_eq!(cfg.socket_path, "/rt/");
    assert_eq!(cfg.typing_idle, Duration::from_millis(250));
    assert_eq!(cfg.join_timeout, Duration::from_secs(3));
}

#[test]
fn from_lookup_rejects_non_numeric_interval() {
    let err = ChatConfig::from_lookup(lookup_from(&[("ROOMCHAT_TYPING_IDLE_MS", "soon")])).unwrap_err();
    assert!(matches!(err, ChatError::Config(_)));
    assert!(err.to_string().contains("ROOMCHAT_TYPING_IDLE_MS"));
}

#[test]
fn socket_url_maps_http_to_ws() {
    let cfg = ChatConfig::default().with_backend_url("http://localhost:5000");
    assert_eq!(
        cfg.socket_url().unwrap().as_str(),
        "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
    );
}

#[test]
fn socket_url_maps_https_to_wss() {
    let cfg = ChatConfig::default().with_backend_url("https://chat.example.test/");
    assert_eq!(
        cfg.socket_url().unwrap().as_str(),
        "wss://chat.example.test/socket.io/?EIO=4&transport=websocket"
    );
}

#[test]
fn socket_url_keeps_ws_scheme_and_replaces_query() {
    let cfg = ChatConfig::default().with_backend_url("ws://127.0.0.1:9000/ignored?x=1");
    assert_eq!(
        cfg.socket_url().unwrap().as_str(),
        "ws://127.0.0.1:9000/socket.io/?EIO=4&transport=websocket"
    );
}

#[test]
fn socket_url_rejects_unknown_scheme() {
    let cfg = ChatConfig::default().with_backend_url("ftp://example.test");
    assert!(matches!(cfg.socket_url(), Err(ChatError::InvalidEndpoint(_))));
}

#[test]
fn env_value_rejects_non_utf8() {
    let raw = VarError::NotUnicode(std::ffi::OsString::from("1000"));
    let err = env_value("ROOMCHAT_TYPING_IDLE_MS", Err(raw)).unwrap_err();
    assert!(matches!(err, ChatError::Config(ref msg) if msg.contains("ROOMCHAT_TYPING_IDLE_MS")));
}

#[test]
fn env_value_unset_is_none() {
    assert_eq!(env_value("ROOMCHAT_SOCKET_PATH", Err(VarError::NotPresent)).unwrap(), None);
    assert_eq!(env_value("ROOMCHAT_SOCKET_PATH", Ok("/io/".to_owned())).unwrap().as_deref(), Some("/io/"));
}
