use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions;
use crate::agent::AgentHandle;
use crate::error::{GateError, GateResult};
use crate::providers::{
    CompletionDelta, CompletionMessage, CompletionRequest, FunctionCall, OpenRouterClient, ToolCall,
    ToolDefinition,
};
use crate::session::{Role, SessionStore};

pub const SYSTEM_PROMPT: &str = "You are a helpful Solana blockchain assistant. You can interact with the Solana blockchain using your available tools.

Available capabilities:
- Token Operations: Check balances, transfer SOL, swap tokens via Jupiter, fetch prices
- NFT Operations: Search assets by creator
- Trading: Use the TRADE action for Jupiter swaps between tokens
- Wallet Management: Get the wallet address, request faucet funds, check network TPS

When a user asks about blockchain operations, use the appropriate tools. Be concise and helpful.
If you encounter errors, explain them clearly and suggest alternatives.
Always confirm transaction details before executing them.";

/// One Server-Sent-Events payload of the chat stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatEvent {
    Text {
        text: String,
    },
    Done {
        done: bool,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Error {
        error: String,
    },
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Everything one chat turn needs, captured when the request arrives so a
/// concurrent config change cannot swap the agent out from under it.
pub struct ChatTurn {
    pub session_id: String,
    pub model: String,
    pub client: OpenRouterClient,
    pub agent: Arc<AgentHandle>,
    pub sessions: Arc<SessionStore>,
    pub max_steps: usize,
    pub idle_timeout: Duration,
}

/// Run `turn` on a background task and expose its events as a stream.
///
/// Dropping the returned stream (the client went away) cancels the task,
/// which drops the in-flight upstream request and any running tool call.
pub fn start_turn(turn: ChatTurn, user_message: String) -> ChatEventStream {
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let session_id = turn.session_id.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Chat turn for session {} cancelled by client disconnect", session_id);
            }
            _ = turn.run(user_message, tx) => {}
        }
    });

    Box::pin(stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield event;
        }
    })
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ChatTurn {
    async fn run(self, user_message: String, tx: mpsc::Sender<ChatEvent>) {
        let terminal = match self.converse(user_message, &tx).await {
            Ok(()) => ChatEvent::Done {
                done: true,
                session_id: self.session_id.clone(),
            },
            Err(e) => {
                warn!("Chat error in session {}: {}", self.session_id, e);
                ChatEvent::Error {
                    error: e.to_string(),
                }
            }
        };
        let _ = tx.send(terminal).await;
    }

    async fn converse(&self, user_message: String, tx: &mpsc::Sender<ChatEvent>) -> GateResult<()> {
        let history = self
            .sessions
            .append(&self.session_id, Role::User, user_message)
            .await;

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(CompletionMessage::system(SYSTEM_PROMPT));
        messages.extend(history.into_iter().map(|m| match m.role {
            Role::User => CompletionMessage::user(m.content),
            Role::Assistant => CompletionMessage::assistant(m.content),
        }));

        let tools: Vec<ToolDefinition> = self
            .agent
            .actions()
            .iter()
            .copied()
            .map(ToolDefinition::from)
            .collect();

        let mut full_response = String::new();

        for step in 0..self.max_steps {
            let request = CompletionRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                stream: true,
            };

            let mut deltas = self.client.stream_chat(&request).await?;
            let mut step_text = String::new();
            let mut calls: Vec<PendingToolCall> = Vec::new();
            let mut finish_reason: Option<String> = None;

            loop {
                let next = tokio::time::timeout(self.idle_timeout, deltas.next())
                    .await
                    .map_err(|_| GateError::upstream("Completion stream timed out"))?;
                let Some(delta) = next else { break };

                match delta? {
                    CompletionDelta::Text(text) => {
                        step_text.push_str(&text);
                        full_response.push_str(&text);
                        tx.send(ChatEvent::Text { text })
                            .await
                            .map_err(|_| GateError::upstream("Chat client disconnected"))?;
                    }
                    CompletionDelta::ToolCall {
                        index,
                        id,
                        name,
                        arguments,
                    } => {
                        if calls.len() <= index {
                            calls.resize_with(index + 1, PendingToolCall::default);
                        }
                        let call = &mut calls[index];
                        if let Some(id) = id {
                            call.id = id;
                        }
                        if let Some(name) = name {
                            call.name.push_str(&name);
                        }
                        call.arguments.push_str(&arguments);
                    }
                    CompletionDelta::Finish(reason) => {
                        debug!("Completion step {} finished: {}", step, reason);
                        finish_reason = Some(reason);
                    }
                }
            }

            if finish_reason.as_deref() != Some("tool_calls") {
                if !calls.is_empty() {
                    warn!(
                        "Ignoring {} tool call fragment(s) in a step that finished with {:?}",
                        calls.len(),
                        finish_reason
                    );
                }
                break;
            }

            calls.retain(|call| !call.name.is_empty());
            if calls.is_empty() {
                break;
            }

            let tool_calls: Vec<ToolCall> = calls
                .iter()
                .enumerate()
                .map(|(i, call)| ToolCall {
                    id: if call.id.is_empty() {
                        format!("call_{}_{}", step, i)
                    } else {
                        call.id.clone()
                    },
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect();

            messages.push(CompletionMessage::assistant_tool_calls(step_text, tool_calls.clone()));
            for call in &tool_calls {
                let output = self.invoke_tool(call).await;
                messages.push(CompletionMessage::tool_result(&call.id, output.to_string()));
            }
        }

        self.sessions
            .append(&self.session_id, Role::Assistant, full_response)
            .await;

        Ok(())
    }

    /// Run a tool call through the action dispatcher. Failures are handed
    /// back to the model as data rather than ending the turn.
    async fn invoke_tool(&self, call: &ToolCall) -> Value {
        let params = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(params) => params,
                Err(e) => {
                    return json!({
                        "status": "error",
                        "message": format!("Tool arguments were not valid JSON: {}", e),
                    })
                }
            }
        };

        info!("Chat tool call {} ({})", call.function.name, call.id);
        match actions::execute(&self.agent, &call.function.name, params).await {
            Ok(result) => result,
            Err(e) => json!({
                "status": "error",
                "message": e.to_string(),
            }),
        }
    }
}
