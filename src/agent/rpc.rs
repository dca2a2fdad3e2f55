use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::{GateError, GateResult};

/// Minimal Solana JSON-RPC client covering the calls the action catalog needs.
#[derive(Debug)]
pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub slot: u64,
    pub num_transactions: u64,
    pub sample_period_secs: u64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> GateResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| GateError::validation(format!("Invalid RPC URL '{}': {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(GateError::validation(format!(
                "Unsupported RPC URL scheme: {}",
                parsed.scheme()
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one JSON-RPC request and return its `result` member.
    pub async fn call(&self, method: &str, params: Value) -> GateResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("RPC {} -> {}", method, self.url);

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("RPC {} returned HTTP {}: {}", method, status, error_text);
            return Err(GateError::upstream(format!(
                "RPC {} failed with HTTP {}: {}",
                method, status, error_text
            )));
        }

        let mut body: Value = response.json().await?;

        if let Some(err) = body.get("error") {
            let message = err["message"].as_str().unwrap_or("unknown error");
            return Err(GateError::upstream(format!("RPC {} failed: {}", method, message)));
        }

        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(GateError::upstream(format!("RPC {} returned no result", method))),
        }
    }

    pub async fn get_balance(&self, address: &str) -> GateResult<u64> {
        let result = self
            .call("getBalance", json!([address, {"commitment": "confirmed"}]))
            .await?;
        result["value"]
            .as_u64()
            .ok_or_else(|| GateError::upstream("getBalance result was missing a value"))
    }

    pub async fn get_latest_blockhash(&self) -> GateResult<[u8; 32]> {
        let result = self
            .call("getLatestBlockhash", json!([{"commitment": "finalized"}]))
            .await?;
        let encoded = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| GateError::upstream("getLatestBlockhash result was missing a blockhash"))?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| GateError::upstream(format!("Malformed blockhash '{}': {}", encoded, e)))?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| GateError::upstream(format!("Malformed blockhash '{}'", encoded)))
    }

    /// Submit a fully signed wire transaction, returning its signature.
    pub async fn send_transaction(&self, transaction: &[u8]) -> GateResult<String> {
        let encoded = BASE64.encode(transaction);
        let result = self
            .call(
                "sendTransaction",
                json!([encoded, {"encoding": "base64", "preflightCommitment": "confirmed"}]),
            )
            .await?;
        as_string(result, "sendTransaction")
    }

    pub async fn request_airdrop(&self, address: &str, lamports: u64) -> GateResult<String> {
        let result = self
            .call("requestAirdrop", json!([address, lamports]))
            .await?;
        as_string(result, "requestAirdrop")
    }

    pub async fn get_recent_performance_samples(
        &self,
        limit: usize,
    ) -> GateResult<Vec<PerformanceSample>> {
        let result = self
            .call("getRecentPerformanceSamples", json!([limit]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_token_decimals(&self, mint: &str) -> GateResult<u8> {
        let result = self.call("getTokenSupply", json!([mint])).await?;
        result["value"]["decimals"]
            .as_u64()
            .and_then(|d| u8::try_from(d).ok())
            .ok_or_else(|| GateError::upstream(format!("No decimals reported for mint {}", mint)))
    }

    /// Sum of the UI amounts held by every token account `owner` has for `mint`.
    pub async fn get_token_balance(&self, owner: &str, mint: &str) -> GateResult<f64> {
        let result = self
            .call(
                "getTokenAccountsByOwner",
                json!([owner, {"mint": mint}, {"encoding": "jsonParsed"}]),
            )
            .await?;

        let accounts = result["value"].as_array().cloned().unwrap_or_default();
        Ok(accounts
            .iter()
            .filter_map(|account| {
                account["account"]["data"]["parsed"]["info"]["tokenAmount"]["uiAmount"].as_f64()
            })
            .sum())
    }
}

fn as_string(result: Value, method: &str) -> GateResult<String> {
    result
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GateError::upstream(format!("{} returned a non-string result", method)))
}
