use bodhi_chat::config::ServerConfig;
use bodhi_chat::storage::SqliteStore;
use serde_json::json;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_store() -> (SqliteStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("chats.db");
    let store = SqliteStore::new_with_path(db_path).expect("failed to create sqlite store with path");
    (store, tmp)
}

/// Server settings pointing at a mock server
#[allow(dead_code)]
pub fn server_config(base_url: &str) -> ServerConfig {
    ServerConfig {
        base_url: base_url.to_string(),
        request_timeout_seconds: Some(5),
        connect_timeout_seconds: 1,
        ..ServerConfig::default()
    }
}

/// One `data:` event line carrying a content delta
#[allow(dead_code)]
pub fn delta_line(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "choices": [{ "delta": { "content": content } }] })
    )
}

/// A complete event-stream body: one event per delta plus the terminator
#[allow(dead_code)]
pub fn sse_body(deltas: &[&str]) -> Vec<u8> {
    let mut body: String = deltas.iter().map(|d| delta_line(d)).collect();
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}
