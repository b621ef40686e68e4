//! Chat session tests: messages flow from the mock server into the SQLite-backed store.

mod common;

use bodhi_chat::completion::{ChatClient, Role, StreamErrorPolicy};
use bodhi_chat::error::ChatError;
use bodhi_chat::session::ChatSession;
use bodhi_chat::settings::ChatSettings;
use bodhi_chat::storage::SqliteStore;
use bodhi_chat::store::{ChatStore, StoreOptions};
use common::{create_temp_store, server_config, sse_body};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn session_for(
    server: &MockServer,
    backend: SqliteStore,
    settings: ChatSettings,
) -> ChatSession<SqliteStore> {
    let store = ChatStore::load(backend, StoreOptions::default()).await;
    let client = ChatClient::new(&server_config(&server.uri()), StreamErrorPolicy::Abort).unwrap();
    ChatSession::new(store, client, settings)
}

fn settings(model: &str) -> ChatSettings {
    ChatSettings {
        model: model.to_string(),
        ..ChatSettings::default()
    }
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("json request body"))
        .collect()
}

#[tokio::test]
async fn test_send_message_persists_both_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Paris", " is the capital."]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (backend, dir) = create_temp_store();
    let mut session = session_for(&server, backend, settings("llama3:instruct")).await;

    let reply = session
        .send_message(
            "What is the capital of France?",
            None,
            &CancellationToken::new(),
        )
        .await
        .expect("send_message");
    assert_eq!(reply.content, "Paris is the capital.");

    let chat = session.store().current_chat().expect("current chat").clone();
    assert_eq!(chat.messages.len(), 2);
    assert_eq!(chat.messages[0].role, Role::User);
    assert_eq!(chat.messages[1].role, Role::Assistant);
    assert_eq!(chat.title, "What is the capital");

    // reopen the database and check the same conversation comes back
    let reopened = SqliteStore::new_with_path(dir.path().join("chats.db")).unwrap();
    let store = ChatStore::load(reopened, StoreOptions::default()).await;
    assert_eq!(store.current_chat_id(), Some(chat.id.as_str()));
    assert_eq!(store.get_chat(&chat.id).await, Some(chat));
}

#[tokio::test]
async fn test_history_and_system_prompt_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"))
        .mount(&server)
        .await;

    let (backend, _dir) = create_temp_store();
    let mut session_settings = settings("m");
    session_settings.system_prompt = Some("Answer in one word.".to_string());
    session_settings.temperature = Some(0.1);
    let mut session = session_for(&server, backend, session_settings).await;

    let cancel = CancellationToken::new();
    session.send_message("first", None, &cancel).await.unwrap();
    session.send_message("second", None, &cancel).await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    let second = &bodies[1];
    assert_eq!(second["model"], "m");
    assert_eq!(second["stream"], true);
    let roles: Vec<&str> = second["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(second["messages"][3]["content"], "second");
    assert!(second.get("top_p").is_none());

    assert_eq!(session.store().len(), 1);
    assert_eq!(session.store().chats()[0].messages.len(), 4);
}

#[tokio::test]
async fn test_failed_completion_keeps_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "model crashed" }
        })))
        .mount(&server)
        .await;

    let (backend, _dir) = create_temp_store();
    let mut session = session_for(&server, backend, settings("m")).await;

    let err = session
        .send_message("hello?", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model crashed"));

    let chat = session.store().current_chat().expect("current chat");
    assert_eq!(chat.messages.len(), 1);
    assert_eq!(chat.messages[0].content, "hello?");
}

#[tokio::test]
async fn test_cancel_while_waiting_returns_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["late"]), "text/event-stream")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let (backend, _dir) = create_temp_store();
    let mut session = session_for(&server, backend, settings("m")).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = session
        .send_message("slow question", None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ChatError>(),
        Some(ChatError::Cancelled { .. })
    ));
    let chat = session.store().current_chat().expect("current chat");
    assert_eq!(chat.messages.len(), 1);
}

#[tokio::test]
async fn test_new_chat_after_reply_starts_fresh_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["hi"]), "text/event-stream"))
        .mount(&server)
        .await;

    let (backend, _dir) = create_temp_store();
    let mut session = session_for(&server, backend, settings("m")).await;
    let cancel = CancellationToken::new();

    session.send_message("one", None, &cancel).await.unwrap();
    let first_id = session.store().current_chat_id().unwrap().to_string();

    let fresh = session.new_chat().await;
    assert_ne!(fresh.id, first_id);
    session.send_message("two", None, &cancel).await.unwrap();

    let chats = session.store().chats();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].id, fresh.id);
    assert_eq!(chats[0].title, "two");
    assert_eq!(chats[1].id, first_id);
}
