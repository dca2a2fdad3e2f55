use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{parse_params, ActionKind};
use crate::agent::transaction::{sign_message, sign_serialized, system_transfer_message};
use crate::agent::wallet::{parse_address, LAMPORTS_PER_SOL};
use crate::agent::AgentHandle;
use crate::error::{GateError, GateResult};

pub const NATIVE_SOL_MINT: &str = "So11111111111111111111111111111111111111112";
const DEFAULT_SLIPPAGE_BPS: u16 = 300;

#[derive(Debug, Deserialize)]
struct TransferParams {
    to: String,
    amount: f64,
    mint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeParams {
    output_mint: String,
    input_amount: f64,
    input_mint: Option<String>,
    slippage_bps: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct PriceParams {
    #[serde(rename = "tokenId", alias = "tokenAddress", alias = "mint")]
    token_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceParams {
    #[serde(alias = "mint")]
    token_address: Option<String>,
}

pub async fn transfer(agent: &AgentHandle, params: Value) -> GateResult<Value> {
    let params: TransferParams = parse_params(ActionKind::Transfer, params)?;

    if params.mint.as_deref().is_some_and(|mint| mint != NATIVE_SOL_MINT) {
        return Err(GateError::validation(
            "SPL token transfers are not supported; omit mint to send SOL",
        ));
    }

    let lamports = to_base_units(params.amount, 9)?;
    let recipient = parse_address(&params.to)?;
    let payer = agent.wallet().public_key();
    if recipient == payer {
        return Err(GateError::validation("Cannot transfer to the agent's own wallet"));
    }

    let blockhash = agent.rpc().get_latest_blockhash().await?;
    let message = system_transfer_message(&payer, &recipient, lamports, &blockhash);
    let transaction = sign_message(agent.wallet(), &message);
    let signature = agent.rpc().send_transaction(&transaction).await?;

    info!("Transferred {} lamports to {}: {}", lamports, params.to, signature);

    Ok(json!({
        "status": "success",
        "message": "Transfer completed successfully",
        "amount": params.amount,
        "recipient": params.to,
        "token": "SOL",
        "transaction": signature,
    }))
}

pub async fn trade(agent: &AgentHandle, params: Value) -> GateResult<Value> {
    let params: TradeParams = parse_params(ActionKind::Trade, params)?;
    let input_mint = params
        .input_mint
        .clone()
        .unwrap_or_else(|| NATIVE_SOL_MINT.to_string());
    parse_address(&input_mint)?;
    parse_address(&params.output_mint)?;

    let decimals = if input_mint == NATIVE_SOL_MINT {
        9
    } else {
        agent.rpc().get_token_decimals(&input_mint).await?
    };
    let amount = to_base_units(params.input_amount, decimals)?.to_string();
    let slippage = params.slippage_bps.unwrap_or(DEFAULT_SLIPPAGE_BPS).to_string();
    let base_url = &agent.endpoints().jupiter_quote_url;

    debug!("Requesting Jupiter quote {} -> {} ({})", input_mint, params.output_mint, amount);

    let quote_response = agent
        .http()
        .get(format!("{}/quote", base_url))
        .query(&[
            ("inputMint", input_mint.as_str()),
            ("outputMint", params.output_mint.as_str()),
            ("amount", amount.as_str()),
            ("slippageBps", slippage.as_str()),
        ])
        .send()
        .await?;
    let quote = json_or_upstream_error(quote_response, "Jupiter quote").await?;

    let swap_response = agent
        .http()
        .post(format!("{}/swap", base_url))
        .json(&json!({
            "quoteResponse": quote,
            "userPublicKey": agent.address(),
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true,
        }))
        .send()
        .await?;
    let swap = json_or_upstream_error(swap_response, "Jupiter swap").await?;

    let encoded = swap["swapTransaction"]
        .as_str()
        .ok_or_else(|| GateError::upstream("Jupiter swap response had no swapTransaction"))?;
    let unsigned = BASE64
        .decode(encoded)
        .map_err(|e| GateError::upstream(format!("Jupiter swap transaction was not base64: {}", e)))?;
    let signed = sign_serialized(agent.wallet(), &unsigned)?;
    let signature = agent.rpc().send_transaction(&signed).await?;

    info!("Swap submitted: {}", signature);

    Ok(json!({
        "status": "success",
        "message": "Trade executed successfully",
        "transaction": signature,
        "inputAmount": params.input_amount,
        "inputToken": input_mint,
        "outputToken": params.output_mint,
    }))
}

pub async fn fetch_price(agent: &AgentHandle, params: Value) -> GateResult<Value> {
    let params: PriceParams = parse_params(ActionKind::FetchPrice, params)?;
    let token = params.token_id.trim();

    let response = agent
        .http()
        .get(&agent.endpoints().jupiter_price_url)
        .query(&[("ids", token)])
        .send()
        .await?;
    let body = json_or_upstream_error(response, "Jupiter price").await?;

    let price = match &body["data"][token]["price"] {
        Value::String(price) => price.clone(),
        Value::Number(price) => price.to_string(),
        _ => {
            return Err(GateError::upstream(format!(
                "Price data not available for token {}",
                token
            )))
        }
    };

    Ok(json!({
        "status": "success",
        "tokenId": token,
        "price": price,
        "message": format!("Current price: ${}", price),
    }))
}

pub async fn balance(agent: &AgentHandle, params: Value) -> GateResult<Value> {
    let params: BalanceParams = parse_params(ActionKind::Balance, params)?;

    match params.token_address {
        Some(mint) if mint != NATIVE_SOL_MINT => {
            parse_address(&mint)?;
            let amount = agent.rpc().get_token_balance(agent.address(), &mint).await?;
            Ok(json!({
                "status": "success",
                "balance": amount,
                "token": mint,
            }))
        }
        _ => {
            let lamports = agent.balance_lamports().await?;
            Ok(json!({
                "status": "success",
                "balance": lamports as f64 / LAMPORTS_PER_SOL as f64,
                "token": "SOL",
            }))
        }
    }
}

/// Convert a UI amount into integer base units for a token with `decimals`.
pub fn to_base_units(amount: f64, decimals: u8) -> GateResult<u64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GateError::validation("Amount must be a positive number"));
    }
    let scaled = (amount * 10f64.powi(i32::from(decimals))).round();
    if scaled < 1.0 || scaled > u64::MAX as f64 {
        return Err(GateError::validation(format!(
            "Amount {} is out of range for a token with {} decimals",
            amount, decimals
        )));
    }
    Ok(scaled as u64)
}

async fn json_or_upstream_error(response: reqwest::Response, service: &str) -> GateResult<Value> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        return Err(GateError::upstream(format!(
            "{} request failed with HTTP {}: {}",
            service, status, error_text
        )));
    }
    Ok(response.json().await?)
}
