/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use async_trait::async_trait;
use awscm_proxy::codec::decode_completion;
use awscm_proxy::config::RelayMode;
use awscm_proxy::dispatch::LocalDispatcher;
use awscm_proxy::notifier::{CompletionNotifier, TaskTokenService};
use awscm_proxy::relay::{QueueService, QueuedMessage, Relay, RelaySettings};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

type SeenLog = Arc<Mutex<Vec<Seen>>>;

async fn record(
    State(seen): State<SeenLog>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    seen.lock().unwrap().push(Seen {
        method,
        uri: uri.to_string(),
        headers,
        body: body.to_vec(),
    });
    (StatusCode::CREATED, [("X-tra", "header")], "echo")
}

async fn local_server() -> (String, SeenLog) {
    let seen: SeenLog = Arc::default();
    let app = Router::new().fallback(record).with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), seen)
}

enum Batch {
    Messages(Vec<QueuedMessage>),
    Fail,
}

/// Scripted queue: hands out batches in order, then flips `stop` and returns
/// nothing.
struct ScriptedQueue {
    batches: Mutex<VecDeque<Batch>>,
    deleted: Mutex<Vec<String>>,
    receives: Mutex<u32>,
    stop: watch::Sender<bool>,
}

impl ScriptedQueue {
    fn new(batches: Vec<Batch>) -> (Arc<Self>, watch::Receiver<bool>) {
        let (stop, rx) = watch::channel(false);
        let queue = Arc::new(Self {
            batches: Mutex::new(batches.into()),
            deleted: Mutex::default(),
            receives: Mutex::new(0),
            stop,
        });
        (queue, rx)
    }
}

#[async_trait]
impl QueueService for ScriptedQueue {
    async fn receive(&self, queue_url: &str, max_messages: i32, wait_secs: i32) -> Result<Vec<QueuedMessage>> {
        assert_eq!(queue_url, "https://sqs.example/1/q");
        assert_eq!((max_messages, wait_secs), (10, 20));
        *self.receives.lock().unwrap() += 1;
        match self.batches.lock().unwrap().pop_front() {
            Some(Batch::Messages(messages)) => Ok(messages),
            Some(Batch::Fail) => anyhow::bail!("queue transport error"),
            None => {
                let _ = self.stop.send(true);
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTasks {
    completed: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl TaskTokenService for RecordingTasks {
    async fn complete_success(&self, token: &str, output: &str) -> Result<()> {
        self.completed.lock().unwrap().push((token.to_string(), output.to_string()));
        Ok(())
    }
}

fn message(n: u32, body: String) -> QueuedMessage {
    QueuedMessage {
        id: format!("m{n}"),
        receipt_handle: format!("rh{n}"),
        body,
    }
}

fn relay(queue: Arc<ScriptedQueue>, mode: RelayMode, target: &str, tasks: Option<Arc<RecordingTasks>>) -> Relay {
    let notifier = tasks.map(|t| CompletionNotifier::new(t as Arc<dyn TaskTokenService>));
    Relay::new(
        queue,
        "https://sqs.example/1/q",
        mode,
        LocalDispatcher::new(target).unwrap(),
        notifier,
    )
    .with_settings(RelaySettings {
        error_backoff: Duration::from_millis(10),
        ..RelaySettings::default()
    })
}

#[tokio::test]
async fn unidirectional_message_reaches_local_server() {
    let (target, seen) = local_server().await;
    let body = json!({
        "method": "GET",
        "path": "/hello",
        "headers": B64.encode("X-Test=1"),
        "querystring": B64.encode("q=1"),
    });
    let (queue, stop) = ScriptedQueue::new(vec![Batch::Messages(vec![message(1, body.to_string())])]);

    let handled = relay(queue.clone(), RelayMode::Unidirectional, &target, None)
        .poll_once(&stop)
        .await
        .unwrap();

    assert_eq!(handled, 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::GET);
    assert_eq!(seen[0].uri, "/hello?q=1");
    assert_eq!(seen[0].headers.get("x-test").unwrap(), "1");
    assert!(seen[0].body.is_empty());
    assert_eq!(*queue.deleted.lock().unwrap(), vec!["rh1".to_string()]);
}

#[tokio::test]
async fn unidirectional_post_body_is_forwarded_as_bytes() {
    let (target, seen) = local_server().await;
    let body = json!({
        "method": "POST",
        "path": "/upload",
        "body": B64.encode([0u8, 1, 2, 255]),
    });
    let (queue, stop) = ScriptedQueue::new(vec![Batch::Messages(vec![message(1, body.to_string())])]);
    relay(queue, RelayMode::Unidirectional, &target, None)
        .poll_once(&stop)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].uri, "/upload");
    assert_eq!(seen[0].body, vec![0u8, 1, 2, 255]);
}

#[tokio::test]
async fn bidirectional_message_completes_token_once() {
    let (target, seen) = local_server().await;
    let body = r#"{"Input":{"rawPath":"/a","rawQueryString":"x=1","requestContext":{"http":{"method":"POST"}},"headers":{},"body":"hi"},"Token":"tok1"}"#;
    let (queue, stop) = ScriptedQueue::new(vec![Batch::Messages(vec![message(1, body.to_string())])]);
    let tasks = Arc::new(RecordingTasks::default());

    relay(queue.clone(), RelayMode::Bidirectional, &target, Some(tasks.clone()))
        .poll_once(&stop)
        .await
        .unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].uri, "/a?x=1");
        assert_eq!(seen[0].body, b"hi");
    }
    let completed = tasks.completed.lock().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].0, "tok1");
    let response = decode_completion(&completed[0].1).unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.body, "echo");
    assert_eq!(response.headers.get("x-tra").map(String::as_str), Some("header"));
    assert_eq!(*queue.deleted.lock().unwrap(), vec!["rh1".to_string()]);
}

#[tokio::test]
async fn undecodable_message_is_deleted_once_and_relay_keeps_going() {
    let (target, seen) = local_server().await;
    let good = json!({"path": "/after"}).to_string();
    let (queue, stop) = ScriptedQueue::new(vec![
        Batch::Messages(vec![message(1, "{not json".to_string()), message(2, good)]),
        Batch::Fail,
        Batch::Messages(vec![message(3, r#"{"headers":"***"}"#.to_string())]),
    ]);

    tokio::time::timeout(
        Duration::from_secs(10),
        relay(queue.clone(), RelayMode::Unidirectional, &target, None).run(stop),
    )
    .await
    .expect("relay stops once the queue script is exhausted");

    assert_eq!(
        *queue.deleted.lock().unwrap(),
        vec!["rh1".to_string(), "rh2".to_string(), "rh3".to_string()]
    );
    // three scripted batches plus the empty poll that flips shutdown
    assert_eq!(*queue.receives.lock().unwrap(), 4);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].uri, "/after");
}

#[tokio::test]
async fn unreachable_local_server_is_a_forwarding_failure() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let body = r#"{"Input":{"rawPath":"/a","requestContext":{"http":{"method":"GET"}}},"Token":"tok"}"#;
    let (queue, stop) = ScriptedQueue::new(vec![Batch::Messages(vec![message(1, body.to_string())])]);
    let tasks = Arc::new(RecordingTasks::default());

    let handled = relay(queue.clone(), RelayMode::Bidirectional, &format!("http://{addr}"), Some(tasks.clone()))
        .poll_once(&stop)
        .await
        .unwrap();

    assert_eq!(handled, 1);
    assert!(tasks.completed.lock().unwrap().is_empty());
    assert_eq!(*queue.deleted.lock().unwrap(), vec!["rh1".to_string()]);
}

#[tokio::test]
async fn shutdown_before_poll_skips_the_batch() {
    let (target, seen) = local_server().await;
    let (queue, stop) = ScriptedQueue::new(vec![Batch::Messages(vec![message(1, "{}".to_string())])]);
    queue.stop.send(true).unwrap();

    relay(queue.clone(), RelayMode::Unidirectional, &target, None).run(stop).await;

    assert_eq!(*queue.receives.lock().unwrap(), 0);
    assert!(queue.deleted.lock().unwrap().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}
