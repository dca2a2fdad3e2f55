//! Shared harness: a mock upstream standing in for Solana RPC, OpenRouter and
//! Jupiter, plus a helper that starts the real gateway against it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use solgate::{ApiServer, AppState, EnvDefaults, GatewaySettings};

pub const MOCK_SIGNATURE: &str = "5igMockSignature111111111111111111111111111";
pub const MOCK_AIRDROP_SIGNATURE: &str = "4irdropMockSignature1111111111111111111111";
pub const MOCK_PRICE: &str = "150.25";
pub const TOOL_REPLY: &str = "Done using tool.";
pub const STRAY_REPLY: &str = "Nothing to run.";

#[derive(Clone, Default)]
pub struct Recorded {
    pub rpc_calls: Arc<Mutex<Vec<Value>>>,
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
    /// Signalled when an endless completion stream is dropped by the server,
    /// i.e. the gateway closed its upstream connection.
    pub stream_closed: Arc<Notify>,
}

struct CloseSignal(Arc<Notify>);

impl Drop for CloseSignal {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

impl Recorded {
    pub fn rpc_methods(&self) -> Vec<String> {
        self.rpc_calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn chat_request(&self, index: usize) -> Value {
        self.chat_requests.lock().unwrap()[index].clone()
    }

    pub fn chat_request_count(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
    }
}

pub struct MockUpstream {
    pub base_url: String,
    pub recorded: Recorded,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/rpc", post(rpc_handler))
            .route("/openrouter/chat/completions", post(chat_completions_handler))
            .route("/openrouter/models", get(models_handler))
            .route("/jupiter/price", get(price_handler))
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            recorded,
        }
    }

    pub fn rpc_url(&self) -> String {
        format!("{}/rpc", self.base_url)
    }

    pub fn settings(&self) -> GatewaySettings {
        GatewaySettings {
            openrouter_base_url: format!("{}/openrouter", self.base_url),
            jupiter_price_url: format!("{}/jupiter/price", self.base_url),
            jupiter_quote_url: format!("{}/jupiter", self.base_url),
            ..GatewaySettings::default()
        }
    }
}

pub struct Gateway {
    pub base_url: String,
    pub state: Arc<AppState>,
    pub http: reqwest::Client,
}

impl Gateway {
    pub async fn start(env: EnvDefaults, settings: GatewaySettings) -> Self {
        Self::start_inner(env, settings, None).await
    }

    /// Start with a built web client served for non-API paths.
    pub async fn start_with_static_dir(
        env: EnvDefaults,
        settings: GatewaySettings,
        dir: PathBuf,
    ) -> Self {
        Self::start_inner(env, settings, Some(dir)).await
    }

    async fn start_inner(
        env: EnvDefaults,
        settings: GatewaySettings,
        static_dir: Option<PathBuf>,
    ) -> Self {
        let state = Arc::new(AppState::new(env, settings));
        let mut server = ApiServer::new(Arc::clone(&state));
        if let Some(dir) = static_dir {
            server = server.with_static_dir(dir);
        }
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let bound = server.spawn(addr).await.unwrap();

        Self {
            base_url: format!("http://{}", bound),
            state,
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.http.get(self.url(path)).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self.http.post(self.url(path)).json(&body).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    /// Push a complete configuration pointing at `upstream`.
    pub async fn configure(&self, upstream: &MockUpstream) -> Value {
        let (status, body) = self
            .post(
                "/api/config",
                json!({
                    "openRouterApiKey": "sk-or-test",
                    "rpcUrl": upstream.rpc_url(),
                    "solanaPrivateKey": test_secret(),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    /// POST a chat message and collect the whole event stream.
    pub async fn chat(&self, body: Value) -> (Option<String>, Vec<Value>) {
        let response = self
            .http
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let session_header = response
            .headers()
            .get("x-session-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap();
        (session_header, parse_events(&text))
    }
}

pub fn test_signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

pub fn test_secret() -> String {
    bs58::encode(test_signing_key().to_keypair_bytes()).into_string()
}

pub fn test_address() -> String {
    bs58::encode(test_signing_key().verifying_key().as_bytes()).into_string()
}

pub fn parse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

pub fn streamed_text(events: &[Value]) -> String {
    events
        .iter()
        .filter_map(|event| event["text"].as_str())
        .collect()
}

async fn rpc_handler(State(recorded): State<Recorded>, Json(call): Json<Value>) -> Json<Value> {
    recorded.rpc_calls.lock().unwrap().push(call.clone());

    let result = match call["method"].as_str().unwrap_or_default() {
        "getBalance" => json!({"context": {"slot": 1}, "value": 1_500_000_000u64}),
        "getLatestBlockhash" => json!({
            "context": {"slot": 1},
            "value": {
                "blockhash": bs58::encode([1u8; 32]).into_string(),
                "lastValidBlockHeight": 100
            }
        }),
        "sendTransaction" => json!(MOCK_SIGNATURE),
        "requestAirdrop" => json!(MOCK_AIRDROP_SIGNATURE),
        "getRecentPerformanceSamples" => json!([
            {"slot": 500, "numTransactions": 1200, "numSlots": 150, "samplePeriodSecs": 60}
        ]),
        "getAssetsByCreator" => json!({"total": 1, "limit": 10, "page": 1, "items": [{"id": "asset1"}]}),
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "error": {"code": -32601, "message": format!("Method not found: {}", other)}
            }))
        }
    };

    Json(json!({"jsonrpc": "2.0", "id": call["id"], "result": result}))
}

async fn models_handler() -> Json<Value> {
    Json(json!({"data": [{"id": "openai/gpt-4o", "name": "GPT-4o"}]}))
}

async fn price_handler(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let id = query.get("ids").cloned().unwrap_or_default();
    Json(json!({"data": {id.clone(): {"id": id, "type": "derivedPrice", "price": MOCK_PRICE}}}))
}

/// Scripted completion endpoint:
/// - after a tool result, answers with `TOOL_REPLY`
/// - a user message mentioning "address" triggers a `WALLET_ADDRESS` tool call
/// - a user message of "fail" gets an HTTP 500
/// - a user message of "hang" streams text forever until the connection drops
/// - a user message mentioning "stray" sends a tool call but finishes with `stop`
/// - anything else is echoed back as `Echo: <message>`
async fn chat_completions_handler(
    State(recorded): State<Recorded>,
    Json(body): Json<Value>,
) -> Response {
    recorded.chat_requests.lock().unwrap().push(body.clone());

    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let last = messages.last().cloned().unwrap_or_default();
    let last_content = last["content"].as_str().unwrap_or_default().to_string();

    let chunks: Vec<Value> = if last["role"] == "tool" {
        vec![text_chunk(TOOL_REPLY), finish_chunk("stop")]
    } else if last_content == "fail" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    } else if last_content == "hang" {
        let closed = CloseSignal(Arc::clone(&recorded.stream_closed));
        let body = Body::from_stream(async_stream::stream! {
            let _closed = closed;
            loop {
                yield Ok::<String, Infallible>(format!("data: {}\n\n", text_chunk("tick ")));
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });
        return ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response();
    } else if last_content.contains("stray") {
        vec![
            text_chunk(STRAY_REPLY),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "call_stray", "type": "function", "function": {"name": "GET_TPS", "arguments": "{}"}}
            ]}, "finish_reason": null}]}),
            finish_chunk("stop"),
        ]
    } else if last_content.contains("address") {
        vec![
            json!({"choices": [{"index": 0, "delta": {"role": "assistant", "tool_calls": [
                {"index": 0, "id": "call_1", "type": "function", "function": {"name": "WALLET_ADDRESS", "arguments": ""}}
            ]}, "finish_reason": null}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "{}"}}
            ]}, "finish_reason": null}]}),
            finish_chunk("tool_calls"),
        ]
    } else {
        vec![
            text_chunk("Echo: "),
            text_chunk(&last_content),
            finish_chunk("stop"),
        ]
    };

    let mut sse = String::new();
    for chunk in chunks {
        sse.push_str(&format!("data: {}\n\n", chunk));
    }
    sse.push_str("data: [DONE]\n\n");

    ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

fn text_chunk(text: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]})
}

fn finish_chunk(reason: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]})
}
