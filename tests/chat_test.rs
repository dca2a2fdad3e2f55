mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{streamed_text, test_address, Gateway, MockUpstream, STRAY_REPLY, TOOL_REPLY};
use solgate::session::Role;
use solgate::streaming::SYSTEM_PROMPT;
use solgate::EnvDefaults;

async fn configured() -> (MockUpstream, Gateway) {
    let upstream = MockUpstream::start().await;
    let gateway = Gateway::start(EnvDefaults::default(), upstream.settings()).await;
    gateway.configure(&upstream).await;
    (upstream, gateway)
}

fn roles_and_contents(request: &Value) -> Vec<(String, String)> {
    request["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["role"].as_str().unwrap().to_string(),
                m["content"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn streams_text_then_done() {
    let (upstream, gateway) = configured().await;

    let (header, events) = gateway
        .chat(json!({"message": "hello", "sessionId": "s-1"}))
        .await;
    assert_eq!(header.as_deref(), Some("s-1"));
    assert_eq!(streamed_text(&events), "Echo: hello");
    assert_eq!(events.last().unwrap(), &json!({"done": true, "sessionId": "s-1"}));

    let request = upstream.recorded.chat_request(0);
    assert_eq!(request["model"], "openai/gpt-4o");
    assert_eq!(request["stream"], true);
    assert_eq!(request["tools"].as_array().unwrap().len(), 8);
    assert_eq!(request["tools"][0]["function"]["name"], "TRANSFER");
}

#[tokio::test]
async fn history_accumulates_across_turns() {
    let (upstream, gateway) = configured().await;

    for message in ["first", "second", "third"] {
        let (_, events) = gateway
            .chat(json!({"message": message, "sessionId": "s-history"}))
            .await;
        assert_eq!(events.last().unwrap()["done"], true);
    }

    assert_eq!(upstream.recorded.chat_request_count(), 3);
    let third = upstream.recorded.chat_request(2);
    let expected: Vec<(String, String)> = [
        ("system", SYSTEM_PROMPT),
        ("user", "first"),
        ("assistant", "Echo: first"),
        ("user", "second"),
        ("assistant", "Echo: second"),
        ("user", "third"),
    ]
    .iter()
    .map(|(role, content)| (role.to_string(), content.to_string()))
    .collect();
    assert_eq!(roles_and_contents(&third), expected);

    let history = gateway.state.sessions().history("s-history").await;
    assert_eq!(history.len(), 6);
    assert_eq!(history[5].content, "Echo: third");
}

#[tokio::test]
async fn sessions_are_isolated() {
    let (upstream, gateway) = configured().await;

    gateway.chat(json!({"message": "alpha", "sessionId": "a"})).await;
    gateway.chat(json!({"message": "beta", "sessionId": "b"})).await;

    let second = upstream.recorded.chat_request(1);
    assert_eq!(
        roles_and_contents(&second)[1..].to_vec(),
        vec![("user".to_string(), "beta".to_string())]
    );
}

#[tokio::test]
async fn missing_session_id_gets_a_fresh_uuid() {
    let (_upstream, gateway) = configured().await;

    let (header, events) = gateway.chat(json!({"message": "hi"})).await;
    let header = header.expect("session header");
    assert!(uuid::Uuid::parse_str(&header).is_ok());
    assert_eq!(events.last().unwrap()["sessionId"], header);
}

#[tokio::test]
async fn tool_calls_run_actions_and_feed_results_back() {
    let (upstream, gateway) = configured().await;

    let (_, events) = gateway
        .chat(json!({"message": "what is my address?", "sessionId": "tools"}))
        .await;
    assert_eq!(streamed_text(&events), TOOL_REPLY);
    assert_eq!(events.last().unwrap()["done"], true);

    assert_eq!(upstream.recorded.chat_request_count(), 2);
    let follow_up = upstream.recorded.chat_request(1);
    let messages = follow_up["messages"].as_array().unwrap();

    let assistant = &messages[messages.len() - 2];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
    assert_eq!(assistant["tool_calls"][0]["function"]["name"], "WALLET_ADDRESS");
    assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{}");

    let tool = &messages[messages.len() - 1];
    assert_eq!(tool["role"], "tool");
    assert_eq!(tool["tool_call_id"], "call_1");
    let output: Value = serde_json::from_str(tool["content"].as_str().unwrap()).unwrap();
    assert_eq!(output["address"], test_address());

    let history = gateway.state.sessions().history("tools").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, TOOL_REPLY);
}

#[tokio::test]
async fn tool_calls_are_ignored_unless_the_step_asks_for_them() {
    let (upstream, gateway) = configured().await;

    let (_, events) = gateway
        .chat(json!({"message": "a stray call", "sessionId": "stray"}))
        .await;
    assert_eq!(streamed_text(&events), STRAY_REPLY);
    assert_eq!(events.last().unwrap()["done"], true);

    assert_eq!(upstream.recorded.chat_request_count(), 1);
    assert!(upstream.recorded.rpc_methods().is_empty());
}

#[tokio::test]
async fn client_disconnect_aborts_the_turn() {
    let (upstream, gateway) = configured().await;

    let mut response = gateway
        .http
        .post(gateway.url("/api/chat"))
        .json(&json!({"message": "hang", "sessionId": "gone"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let mut received = String::new();
    while !received.contains("tick") {
        let chunk = response.chunk().await.unwrap().expect("stream ended early");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    drop(response);

    tokio::time::timeout(
        Duration::from_secs(10),
        upstream.recorded.stream_closed.notified(),
    )
    .await
    .expect("upstream completion was not closed");

    let history = gateway.state.sessions().history("gone").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hang");
}

#[tokio::test]
async fn upstream_failure_becomes_error_event() {
    let (_upstream, gateway) = configured().await;

    let (_, events) = gateway
        .chat(json!({"message": "fail", "sessionId": "broken"}))
        .await;
    assert_eq!(events.len(), 1);
    let error = events[0]["error"].as_str().unwrap();
    assert!(error.contains("upstream exploded"), "{}", error);
}

#[tokio::test]
async fn chat_rejects_bad_requests() {
    let upstream = MockUpstream::start().await;
    let gateway = Gateway::start(EnvDefaults::default(), upstream.settings()).await;

    let (status, _) = gateway.post("/api/chat", json!({"message": "hi"})).await;
    assert_eq!(status.as_u16(), 503);

    gateway.configure(&upstream).await;
    let (status, body) = gateway.post("/api/chat", json!({"message": "  "})).await;
    assert_eq!(status.as_u16(), 400);
    assert_eq!(body["error"], "Message is required");

    let (status, _) = gateway.post("/api/chat", json!({})).await;
    assert_eq!(status.as_u16(), 400);
    assert_eq!(upstream.recorded.chat_request_count(), 0);
}
