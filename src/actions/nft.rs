// Read-only NFT queries. Collection deployment, minting and marketplace
// listing belong to the Metaplex and Tensor plugins and are not in the catalog.
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_params, ActionKind};
use crate::agent::wallet::parse_address;
use crate::agent::AgentHandle;
use crate::error::GateResult;

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetsByCreatorParams {
    #[serde(alias = "creatorAddress")]
    creator: String,
    #[serde(default)]
    only_verified: bool,
    limit: Option<u32>,
    page: Option<u32>,
}

pub async fn get_assets_by_creator(agent: &AgentHandle, params: Value) -> GateResult<Value> {
    let params: AssetsByCreatorParams = parse_params(ActionKind::GetAssetsByCreator, params)?;
    parse_address(&params.creator)?;

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let result = agent
        .rpc()
        .call(
            "getAssetsByCreator",
            json!({
                "creatorAddress": params.creator,
                "onlyVerified": params.only_verified,
                "page": params.page.unwrap_or(1).max(1),
                "limit": limit,
            }),
        )
        .await?;

    Ok(json!({
        "status": "success",
        "total": result["total"].as_u64().unwrap_or(0),
        "assets": result["items"].clone(),
    }))
}
