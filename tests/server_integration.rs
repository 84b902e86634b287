//! Integration tests for the HTTP surface over a loopback socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grounded_chat::ai::{ChatModel, ChatRequest, GenerationError, TokenStream};
use grounded_chat::config::{RetrievalConfig, ServerConfig};
use grounded_chat::document::InMemoryDocumentStore;
use grounded_chat::history::InMemoryStore;
use grounded_chat::knowledge::KnowledgeIndex;
use grounded_chat::pipeline::ChatCore;
use grounded_chat::server::{AppState, ChatServer, UploadResponse};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Replies with the prompt split into two chunks.
struct Parrot;

#[async_trait]
impl ChatModel for Parrot {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        let chunks: Vec<Result<String, GenerationError>> =
            vec![Ok("复述：".to_string()), Ok(request.prompt)];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

struct Running {
    base: String,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

async fn start() -> Running {
    let core = ChatCore::new(
        Arc::new(KnowledgeIndex::builtin()),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryStore::new()),
        RetrievalConfig::default(),
    );
    let server = ChatServer::new(AppState::new(Arc::new(core), Arc::new(Parrot))).with_config(
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        },
    );
    let cancel = server.cancel_token();
    let listener = server.bind().await.expect("Failed to bind");
    let addr: SocketAddr = listener.local_addr().expect("Failed to get address");
    let handle = tokio::spawn(server.serve(listener));

    Running {
        base: format!("http://{addr}"),
        cancel,
        handle,
    }
}

async fn stop(running: Running) {
    running.cancel.cancel();
    let result = timeout(Duration::from_secs(2), running.handle).await;
    assert!(result.is_ok(), "Server should shut down within timeout");
}

/// Poll until the assistant reply has been recorded.
async fn wait_for_messages(
    client: &reqwest::Client,
    url: &str,
    count: usize,
) -> serde_json::Value {
    for _ in 0..50 {
        let response = client.get(url).send().await.unwrap();
        let messages: serde_json::Value = response.json().await.unwrap();
        if messages.as_array().map_or(0, Vec::len) >= count {
            return messages;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("history at {url} never reached {count} messages");
}

#[tokio::test]
async fn test_service_chat_streams_and_records_history() {
    let running = start().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/ai/service", running.base))
        .query(&[("prompt", "学习路线"), ("chatId", "s-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.text().await.unwrap(), "复述：学习路线");

    let messages = wait_for_messages(
        &client,
        &format!("{}/ai/history/service/s-1", running.base),
        2,
    )
    .await;
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["text"], "复述：学习路线");

    let ids: Vec<String> = client
        .get(format!("{}/ai/history/service", running.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids, vec!["s-1"]);

    stop(running).await;
}

#[tokio::test]
async fn test_document_upload_then_chat() {
    let running = start().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/ai/pdf/chat", running.base))
        .query(&[("prompt", "付款"), ("chatId", "d-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let uploaded: UploadResponse = client
        .post(format!("{}/ai/pdf/upload/d-1", running.base))
        .json(&serde_json::json!({ "fileName": "合同.pdf", "text": "第三条 付款方式：季度结算" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(uploaded.chat_id, "d-1");
    assert_eq!(uploaded.file_name, "合同.pdf");
    assert_eq!(uploaded.text_length, 13);

    let reply = client
        .get(format!("{}/ai/pdf/chat", running.base))
        .query(&[("prompt", "付款"), ("chatId", "d-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(reply.status(), 200);
    assert_eq!(reply.text().await.unwrap(), "复述：付款");

    stop(running).await;
}

#[tokio::test]
async fn test_blank_prompt_is_rejected() {
    let running = start().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/ai/service", running.base))
        .query(&[("prompt", " "), ("chatId", "s-2")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("prompt"));

    stop(running).await;
}
