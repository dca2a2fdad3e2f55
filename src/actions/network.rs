use serde_json::{json, Value};
use tracing::info;

use crate::agent::wallet::LAMPORTS_PER_SOL;
use crate::agent::AgentHandle;
use crate::error::{GateError, GateResult};

const FAUCET_AMOUNT_SOL: u64 = 5;

pub async fn request_funds(agent: &AgentHandle) -> GateResult<Value> {
    let signature = agent
        .rpc()
        .request_airdrop(agent.address(), FAUCET_AMOUNT_SOL * LAMPORTS_PER_SOL)
        .await?;

    info!("Requested {} SOL airdrop: {}", FAUCET_AMOUNT_SOL, signature);

    Ok(json!({
        "status": "success",
        "message": "Successfully requested faucet funds",
        "amount": FAUCET_AMOUNT_SOL,
        "transaction": signature,
    }))
}

pub async fn get_tps(agent: &AgentHandle) -> GateResult<Value> {
    let samples = agent.rpc().get_recent_performance_samples(1).await?;
    let sample = samples
        .first()
        .ok_or_else(|| GateError::upstream("No performance samples available"))?;

    if sample.sample_period_secs == 0 {
        return Err(GateError::upstream("Performance sample has an empty period"));
    }
    let tps = sample.num_transactions as f64 / sample.sample_period_secs as f64;

    Ok(json!({
        "status": "success",
        "tps": tps,
        "message": format!("Current network TPS: {:.0}", tps),
    }))
}

pub fn wallet_address(agent: &AgentHandle) -> GateResult<Value> {
    Ok(json!({
        "status": "success",
        "address": agent.address(),
    }))
}
