//! Binary-level tests of the `bodhi-chat` command line.
//!
//! Every invocation gets its own database through `--store-path` and a
//! config path that does not exist, so defaults apply.

mod common;

use assert_cmd::Command;
use bodhi_chat::storage::SqliteStore;
use bodhi_chat::store::{ChatStore, StoreOptions};
use common::sse_body;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bodhi_chat(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bodhi-chat").expect("binary built");
    cmd.env_remove("RUST_LOG")
        .env_remove("BODHI_CHAT_STORE_DB")
        .env_remove("BODHI_CHAT_BASE_URL")
        .env_remove("BODHI_CHAT_MODEL")
        .arg("--config")
        .arg(dir.path().join("missing.yaml"))
        .arg("--store-path")
        .arg(dir.path().join("chats.db"));
    cmd
}

#[test]
fn test_chats_list_empty() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["chats", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No chats found."));
}

#[test]
fn test_chats_new_then_list_shows_default_title() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["chats", "new"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current chat is now"));

    bodhi_chat(&dir)
        .args(["chats", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New Chat"));
}

#[test]
fn test_chats_switch_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["chats", "switch", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_settings_set_and_show() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["settings", "set", "temperature", "0.5"])
        .assert()
        .success();

    bodhi_chat(&dir)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("temperature").and(predicate::str::contains("0.5")));
}

#[test]
fn test_settings_set_out_of_range_fails() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["settings", "set", "temperature", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("temperature must be between"));
}

#[test]
fn test_invalid_base_url_fails_validation() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["--base-url", "not a url", "chats", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("server.base_url"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_streams_reply_to_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hello", " from", " mock"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["--base-url", uri.as_str(), "ask", "hi", "--model", "m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from mock"));

    bodhi_chat(&dir)
        .args(["chats", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hi"));
}

#[test]
fn test_ask_without_model_fails() {
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["ask", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No model configured"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deleting_only_chat_reports_reset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    bodhi_chat(&dir)
        .args(["--base-url", uri.as_str(), "ask", "hello", "--model", "m"])
        .assert()
        .success();

    let backend = SqliteStore::new_with_path(dir.path().join("chats.db")).unwrap();
    let store = ChatStore::load(backend, StoreOptions::default()).await;
    let id = store.current_chat_id().expect("current chat").to_string();
    drop(store);

    bodhi_chat(&dir)
        .args(["chats", "delete", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Reset current chat {}", id)));
}
