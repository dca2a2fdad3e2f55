use async_stream::stream;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::{CompletionDelta, CompletionRequest, DeltaStream, SseDecoder};
use crate::error::{GateError, GateResult};

/// Client for OpenRouter's OpenAI-compatible API.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> GateResult<Self> {
        // No overall timeout on the client: streamed completions may run for
        // minutes. Callers bound idle time between chunks instead.
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("solgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Fetch the upstream model catalog as-is.
    pub async fn list_models(&self) -> GateResult<Value> {
        let url = format!("{}/models", self.base_url);
        debug!("Fetching model list from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenRouter model list error: {}", error_text);
            return Err(GateError::upstream(format!("OpenRouter API error: {}", error_text)));
        }

        Ok(response.json().await?)
    }

    /// Start a streamed chat completion and decode it into deltas.
    pub async fn stream_chat(&self, request: &CompletionRequest) -> GateResult<DeltaStream> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "Sending streamed completion to {} (model {}, {} messages)",
            url,
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "solgate")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenRouter API error: {}", error_text);
            return Err(GateError::upstream(format!("OpenRouter API error: {}", error_text)));
        }

        let mut bytes = response.bytes_stream();
        let stream = stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let payloads = match chunk {
                    Ok(chunk) => decoder.push(&chunk),
                    Err(e) => {
                        yield Err(GateError::from(e));
                        return;
                    }
                };
                for payload in payloads {
                    match decode_payload(&payload) {
                        Ok(Some(deltas)) => {
                            for delta in deltas {
                                yield Ok(delta);
                            }
                        }
                        Ok(None) => return,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// `None` marks the `[DONE]` sentinel that ends the stream.
fn decode_payload(payload: &str) -> GateResult<Option<Vec<CompletionDelta>>> {
    if payload == "[DONE]" {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(payload)?;
    parse_chunk(&value).map(Some)
}

/// Decode one `chat.completion.chunk` object.
pub fn parse_chunk(chunk: &Value) -> GateResult<Vec<CompletionDelta>> {
    if let Some(err) = chunk.get("error") {
        let message = err["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(GateError::upstream(message));
    }

    let mut deltas = Vec::new();
    let Some(choice) = chunk["choices"].get(0) else {
        return Ok(deltas);
    };

    let delta = &choice["delta"];
    if let Some(text) = delta["content"].as_str() {
        if !text.is_empty() {
            deltas.push(CompletionDelta::Text(text.to_string()));
        }
    }

    if let Some(calls) = delta["tool_calls"].as_array() {
        for (position, call) in calls.iter().enumerate() {
            deltas.push(CompletionDelta::ToolCall {
                index: call["index"].as_u64().map(|i| i as usize).unwrap_or(position),
                id: call["id"].as_str().map(str::to_string),
                name: call["function"]["name"].as_str().map(str::to_string),
                arguments: call["function"]["arguments"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    if let Some(reason) = choice["finish_reason"].as_str() {
        deltas.push(CompletionDelta::Finish(reason.to_string()));
    }

    Ok(deltas)
}
