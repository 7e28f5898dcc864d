//! Integration tests for the HTTP API over an in-memory bus and store.

use busrelay_core::batch::MessageBatcher;
use busrelay_core::bus::InMemoryBus;
use busrelay_core::server::RelayServer;
use busrelay_core::store::{KvConfigStore, MemoryKvStore};
use busrelay_core::RelayService;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    bus: InMemoryBus,
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn start(max_batch: usize, max_request_size: u64) -> Self {
        let bus = InMemoryBus::new(max_batch);
        let service = Arc::new(RelayService::new(
            Arc::new(KvConfigStore::new(MemoryKvStore::new())),
            Arc::new(bus.clone()),
            MessageBatcher::new(max_batch),
        ));
        let server = RelayServer::new("127.0.0.1".to_string(), 0, max_request_size, service);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, serve) = server
            .bind(async {
                let _ = shutdown_rx.await;
            })
            .unwrap();
        let handle = tokio::spawn(serve);

        Self {
            addr,
            bus,
            shutdown_tx,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

#[tokio::test]
async fn envelope_operations_map_to_http_status() {
    let server = TestServer::start(262_144, 1_048_576);
    let client = Client::new();

    let res = client
        .post(server.url("/api/v1/relay"))
        .json(&json!({
            "operation": "saveConfig",
            "connectorConfig": {"connectionString": "sb://ns", "topicName": "events"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(server.url("/api/v1/relay"))
        .json(&json!({"operation": "getConfig"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let config: Value =
        serde_json::from_str(body["connectorConfig"].as_str().unwrap()).unwrap();
    assert_eq!(
        config,
        json!({"connectionString": "sb://ns", "topicName": "events"})
    );

    let res = client
        .post(server.url("/api/v1/relay"))
        .json(&json!({"operation": "sendMessage", "message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Events without an operation are forwarded whole
    let res = client
        .post(server.url("/api/v1/relay"))
        .json(&json!({"type": "asset_created", "id": 7}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let delivered = server.bus.messages("events");
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0], "hello");
    let forwarded: Value = serde_json::from_str(&delivered[1]).unwrap();
    assert_eq!(forwarded, json!({"type": "asset_created", "id": 7}));

    server.stop().await;
}

#[tokio::test]
async fn failures_carry_status_and_message() {
    let server = TestServer::start(256, 1_048_576);
    let client = Client::new();

    // Unconfigured
    let res = client
        .post(server.url("/api/v1/messages"))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "connection_error");

    let res = client
        .put(server.url("/api/v1/config"))
        .json(&json!({"connectionString": "sb://ns", "topicName": "events"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // Oversized
    let res = client
        .post(server.url("/api/v1/messages"))
        .json(&json!({"message": "x".repeat(1000)}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "message_too_large");
    assert!(body["error"].as_str().unwrap().contains("too big"));
    assert_eq!(server.bus.send_count(), 0);
    assert_eq!(server.bus.open_handles(), 0);

    // Malformed JSON
    let res = client
        .post(server.url("/api/v1/relay"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn rest_config_and_health() {
    let server = TestServer::start(262_144, 1_048_576);
    let client = Client::new();

    let res = client.get(server.url("/api/v1/config")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"connectionString": "", "topicName": ""}));

    let res = client.get(server.url("/api/v1/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    let res = client.get(server.url("/api/v1/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");

    let res = client.delete(server.url("/api/v1/relay")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "method_not_allowed");

    server.stop().await;
}

#[tokio::test]
async fn request_body_limit_is_enforced() {
    let server = TestServer::start(262_144, 128);
    let client = Client::new();

    let res = client
        .post(server.url("/api/v1/relay"))
        .json(&json!({"operation": "sendMessage", "message": "z".repeat(512)}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "payload_too_large");

    server.stop().await;
}

/// POST a body with chunked transfer encoding and no Content-Length.
/// Returns the status code and the raw response text.
async fn post_chunked(addr: SocketAddr, path: &str, chunks: &[&str]) -> (u16, String) {
    let mut request = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        path, addr
    );
    for chunk in chunks {
        request.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), chunk));
    }
    request.push_str("0\r\n\r\n");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    // The server may reset the connection after an early rejection; keep what arrived
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while let Ok(n) = stream.read(&mut buf).await {
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
    }
    let response = String::from_utf8_lossy(&raw).to_string();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    (status, response)
}

#[tokio::test]
async fn chunked_event_is_forwarded() {
    let server = TestServer::start(262_144, 1_048_576);
    let client = Client::new();

    let res = client
        .post(server.url("/api/v1/relay"))
        .json(&json!({
            "operation": "saveConfig",
            "connectorConfig": {"connectionString": "sb://ns.example.net/", "topicName": "events"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, _) = post_chunked(
        server.addr,
        "/api/v1/relay",
        &[r#"{"eventType":"#, r#""created","id":7}"#],
    )
    .await;
    assert_eq!(status, 200);

    let delivered = server.bus.messages("events");
    assert_eq!(delivered.len(), 1);
    let event: Value = serde_json::from_str(&delivered[0]).unwrap();
    assert_eq!(event, json!({"eventType": "created", "id": 7}));

    server.stop().await;
}

#[tokio::test]
async fn chunked_body_over_limit_is_rejected() {
    let server = TestServer::start(262_144, 128);
    let filler = "z".repeat(100);

    let (status, response) = post_chunked(
        server.addr,
        "/api/v1/relay",
        &[r#"{"message":""#, &filler, &filler, r#""}"#],
    )
    .await;
    assert_eq!(status, 413);
    assert!(response.contains("payload_too_large"));
    assert!(server.bus.messages("events").is_empty());

    server.stop().await;
}
