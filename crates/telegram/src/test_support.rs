//! In-process stand-in for the Telegram Bot API.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        routing::post,
    },
    serde_json::{Value, json},
    tokio::sync::oneshot,
};

type Responder = dyn Fn(&str, &Value) -> (StatusCode, Value) + Send + Sync;

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    respond: Arc<Responder>,
}

/// Captured API calls as `(method, body)`, method names lowercased
/// (`sendmessage`, `getupdates`, ...).
pub(crate) struct MockTelegramApi {
    pub requests: Arc<Mutex<Vec<(String, Value)>>>,
    pub bot: teloxide::Bot,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockTelegramApi {
    pub async fn start(
        respond: impl Fn(&str, &Value) -> (StatusCode, Value) + Send + Sync + 'static,
    ) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            requests: Arc::clone(&requests),
            respond: Arc::new(respond),
        };
        let app = Router::new()
            .route("/{*path}", post(handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        Self {
            requests,
            bot: teloxide::Bot::new("test-token").set_api_url(api_url),
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn calls(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

impl Drop for MockTelegramApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handler(State(state): State<MockState>, uri: Uri, body: Bytes) -> (StatusCode, Json<Value>) {
    let method = uri
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if method == "getupdates" {
        // Stand-in for the long-poll wait.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    state
        .requests
        .lock()
        .expect("requests lock")
        .push((method.clone(), body.clone()));
    let (status, value) = (state.respond)(&method, &body);
    (status, Json(value))
}

pub(crate) fn ok(result: Value) -> (StatusCode, Value) {
    (StatusCode::OK, json!({ "ok": true, "result": result }))
}

pub(crate) fn api_error(code: u16, description: &str) -> (StatusCode, Value) {
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST),
        json!({ "ok": false, "error_code": code, "description": description }),
    )
}

/// Result payload of a successful `sendMessage`.
pub(crate) fn sent_message(body: &Value) -> Value {
    json!({
        "message_id": 100,
        "date": 1,
        "chat": { "id": body["chat_id"], "type": "private", "first_name": "Alice" },
        "text": body["text"],
    })
}

/// Default responses for every method the relay calls.
pub(crate) fn happy_path(method: &str, body: &Value) -> (StatusCode, Value) {
    match method {
        "getme" => ok(json!({
            "id": 999,
            "is_bot": true,
            "first_name": "Relay",
            "username": "relay_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        })),
        "sendmessage" => ok(sent_message(body)),
        "getupdates" => ok(json!([])),
        _ => ok(json!(true)),
    }
}
