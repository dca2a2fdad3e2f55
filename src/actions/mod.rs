use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::agent::AgentHandle;
use crate::error::{GateError, GateResult};

pub mod network;
pub mod nft;
pub mod tokens;

/// Longest prefix of the catalog listing reported back on a failed lookup.
const AVAILABLE_LISTING_LIMIT: usize = 500;

/// External action names accepted by the HTTP surface, mapped onto the
/// canonical catalog names. Several price-style names deliberately collapse
/// onto `FETCH_PRICE`.
pub const ACTION_ALIASES: &[(&str, &str)] = &[
    ("SEND_TRANSFER", "TRANSFER"),
    ("JUPITER_SWAP", "TRADE"),
    ("FETCH_PRICE", "FETCH_PRICE"),
    ("DEPLOY_COLLECTION", "DEPLOY_COLLECTION"),
    ("MINT_NFT", "MINT_NFT"),
    ("LIST_NFT_FOR_SALE", "LIST_NFT_FOR_SALE"),
    ("GET_ASSETS_BY_CREATOR", "GET_ASSETS_BY_CREATOR"),
    ("FETCH_TOKEN_DETAILED_REPORT", "FETCH_PRICE"),
    ("FETCH_PYTH_PRICE", "FETCH_PRICE"),
    ("REQUEST_FAUCET_FUNDS", "REQUEST_FUNDS"),
    ("GET_TPS", "GET_TPS"),
];

/// Actions the gateway can run against the configured wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Transfer,
    Trade,
    FetchPrice,
    GetAssetsByCreator,
    RequestFunds,
    GetTps,
    Balance,
    WalletAddress,
}

/// Read-only description of an action as surfaced by `GET /api/actions`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub similes: Vec<&'static str>,
}

impl ActionKind {
    pub const ALL: &'static [ActionKind] = &[
        ActionKind::Transfer,
        ActionKind::Trade,
        ActionKind::FetchPrice,
        ActionKind::GetAssetsByCreator,
        ActionKind::RequestFunds,
        ActionKind::GetTps,
        ActionKind::Balance,
        ActionKind::WalletAddress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Transfer => "TRANSFER",
            ActionKind::Trade => "TRADE",
            ActionKind::FetchPrice => "FETCH_PRICE",
            ActionKind::GetAssetsByCreator => "GET_ASSETS_BY_CREATOR",
            ActionKind::RequestFunds => "REQUEST_FUNDS",
            ActionKind::GetTps => "GET_TPS",
            ActionKind::Balance => "BALANCE",
            ActionKind::WalletAddress => "WALLET_ADDRESS",
        }
    }

    pub fn similes(self) -> &'static [&'static str] {
        match self {
            ActionKind::Transfer => &["send tokens", "transfer funds", "send money", "send sol"],
            ActionKind::Trade => &["swap tokens", "exchange tokens", "trade tokens", "convert tokens"],
            ActionKind::FetchPrice => &["get token price", "check price", "token value", "price check"],
            ActionKind::GetAssetsByCreator => &["find nfts by creator", "creator assets", "list creator nfts"],
            ActionKind::RequestFunds => &["request sol", "get test tokens", "use faucet", "airdrop"],
            ActionKind::GetTps => &["get transactions per second", "check network speed", "network performance"],
            ActionKind::Balance => &["check balance", "get wallet value", "view balance"],
            ActionKind::WalletAddress => &["wallet address", "address", "my wallet"],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActionKind::Transfer => {
                "Transfer SOL from the agent wallet to another address. Amount is in SOL."
            }
            ActionKind::Trade => {
                "Swap tokens using Jupiter Exchange. Input amount is in units of the input token (SOL by default)."
            }
            ActionKind::FetchPrice => "Fetch the current USD price of a token by its mint address.",
            ActionKind::GetAssetsByCreator => {
                "List digital assets (NFTs) minted by a creator address via the DAS API."
            }
            ActionKind::RequestFunds => "Request 5 SOL from the devnet or testnet faucet.",
            ActionKind::GetTps => "Get the current transactions per second of the Solana network.",
            ActionKind::Balance => {
                "Get the SOL balance of the agent wallet, or its SPL token balance when a token address is given."
            }
            ActionKind::WalletAddress => "Get the address of the agent wallet.",
        }
    }

    /// JSON schema of the parameters object, used for chat tool definitions.
    pub fn parameters(self) -> Value {
        match self {
            ActionKind::Transfer => json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient wallet address"},
                    "amount": {"type": "number", "description": "Amount of SOL to send"}
                },
                "required": ["to", "amount"]
            }),
            ActionKind::Trade => json!({
                "type": "object",
                "properties": {
                    "outputMint": {"type": "string", "description": "Mint address of the token to receive"},
                    "inputAmount": {"type": "number", "description": "Amount of the input token to swap"},
                    "inputMint": {"type": "string", "description": "Mint address of the token to spend (defaults to SOL)"},
                    "slippageBps": {"type": "integer", "description": "Allowed slippage in basis points (default 300)"}
                },
                "required": ["outputMint", "inputAmount"]
            }),
            ActionKind::FetchPrice => json!({
                "type": "object",
                "properties": {
                    "tokenId": {"type": "string", "description": "Mint address of the token"}
                },
                "required": ["tokenId"]
            }),
            ActionKind::GetAssetsByCreator => json!({
                "type": "object",
                "properties": {
                    "creator": {"type": "string", "description": "Creator address"},
                    "onlyVerified": {"type": "boolean", "description": "Only return verified creators"},
                    "limit": {"type": "integer", "description": "Maximum number of assets (default 10)"}
                },
                "required": ["creator"]
            }),
            ActionKind::Balance => json!({
                "type": "object",
                "properties": {
                    "tokenAddress": {"type": "string", "description": "Optional SPL token mint address"}
                }
            }),
            ActionKind::RequestFunds | ActionKind::GetTps | ActionKind::WalletAddress => json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    pub fn descriptor(self) -> ActionDescriptor {
        ActionDescriptor {
            name: self.name(),
            description: self.description(),
            similes: self.similes().to_vec(),
        }
    }

    pub async fn run(self, agent: &AgentHandle, params: Value) -> GateResult<Value> {
        match self {
            ActionKind::Transfer => tokens::transfer(agent, params).await,
            ActionKind::Trade => tokens::trade(agent, params).await,
            ActionKind::FetchPrice => tokens::fetch_price(agent, params).await,
            ActionKind::Balance => tokens::balance(agent, params).await,
            ActionKind::GetAssetsByCreator => nft::get_assets_by_creator(agent, params).await,
            ActionKind::RequestFunds => network::request_funds(agent).await,
            ActionKind::GetTps => network::get_tps(agent).await,
            ActionKind::WalletAddress => network::wallet_address(agent),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Translate an external action name through the alias table. Names without
/// an alias pass through unchanged.
pub fn canonical_name(requested: &str) -> &str {
    ACTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == requested)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(requested)
}

/// Find the action a caller meant, trying the canonical name first and the
/// name as given second, each case-insensitively.
pub fn resolve(actions: &[ActionKind], requested: &str) -> GateResult<ActionKind> {
    let mapped = canonical_name(requested);

    actions
        .iter()
        .copied()
        .find(|action| action.name().eq_ignore_ascii_case(mapped))
        .or_else(|| {
            actions
                .iter()
                .copied()
                .find(|action| action.name().eq_ignore_ascii_case(requested))
        })
        .ok_or_else(|| GateError::ActionNotFound {
            attempted: requested.to_string(),
            mapped: mapped.to_string(),
            available: available_listing(actions),
        })
}

/// Resolve and run an action on behalf of the HTTP surface or a chat tool call.
pub async fn execute(agent: &AgentHandle, requested: &str, params: Value) -> GateResult<Value> {
    let action = resolve(agent.actions(), requested)?;
    let params = if params.is_null() { json!({}) } else { params };

    info!("Executing action {} (requested as {})", action, requested);
    debug!("Action {} params: {}", action, params);

    match action.run(agent, params).await {
        Ok(result) => Ok(result),
        Err(e) => {
            warn!("Action {} failed: {}", action, e);
            Err(e)
        }
    }
}

fn available_listing(actions: &[ActionKind]) -> String {
    let names = actions
        .iter()
        .map(|action| action.name())
        .collect::<Vec<_>>()
        .join(", ");
    let truncated: String = names.chars().take(AVAILABLE_LISTING_LIMIT).collect();
    format!("{}...", truncated)
}

/// Deserialize an action's parameter object, reporting failures as bad input.
pub(crate) fn parse_params<T: DeserializeOwned>(action: ActionKind, params: Value) -> GateResult<T> {
    serde_json::from_value(params)
        .map_err(|e| GateError::validation(format!("Invalid parameters for {}: {}", action, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_alias_pair_resolves_as_listed() {
        let expected = [
            ("SEND_TRANSFER", "TRANSFER"),
            ("JUPITER_SWAP", "TRADE"),
            ("FETCH_PRICE", "FETCH_PRICE"),
            ("DEPLOY_COLLECTION", "DEPLOY_COLLECTION"),
            ("MINT_NFT", "MINT_NFT"),
            ("LIST_NFT_FOR_SALE", "LIST_NFT_FOR_SALE"),
            ("GET_ASSETS_BY_CREATOR", "GET_ASSETS_BY_CREATOR"),
            ("FETCH_TOKEN_DETAILED_REPORT", "FETCH_PRICE"),
            ("FETCH_PYTH_PRICE", "FETCH_PRICE"),
            ("REQUEST_FAUCET_FUNDS", "REQUEST_FUNDS"),
            ("GET_TPS", "GET_TPS"),
        ];
        assert_eq!(ACTION_ALIASES.len(), expected.len());
        for (alias, canonical) in expected {
            assert_eq!(canonical_name(alias), canonical, "alias {}", alias);
        }
    }

    #[test]
    fn alias_targets_in_catalog_resolve_to_actions() {
        let nft_plugin_only = ["DEPLOY_COLLECTION", "MINT_NFT", "LIST_NFT_FOR_SALE"];
        for (alias, canonical) in ACTION_ALIASES {
            let resolved = resolve(ActionKind::ALL, alias);
            if nft_plugin_only.contains(canonical) {
                assert!(resolved.is_err(), "{} should not resolve", alias);
            } else {
                assert_eq!(resolved.unwrap().name(), *canonical);
            }
        }
    }

    #[test]
    fn send_transfer_maps_to_transfer() {
        assert_eq!(resolve(ActionKind::ALL, "SEND_TRANSFER").unwrap(), ActionKind::Transfer);
    }

    #[test]
    fn lookup_is_case_insensitive_on_either_name() {
        assert_eq!(resolve(ActionKind::ALL, "get_tps").unwrap(), ActionKind::GetTps);
        assert_eq!(resolve(ActionKind::ALL, "Balance").unwrap(), ActionKind::Balance);
        // Aliases themselves are exact; the lowercase form falls through to the catalog.
        assert!(resolve(ActionKind::ALL, "send_transfer").is_err());
    }

    #[test]
    fn unknown_action_reports_attempted_and_mapped_names() {
        let err = resolve(ActionKind::ALL, "MINT_NFT").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Action 'MINT_NFT' (mapped to 'MINT_NFT') not found."));
        assert!(message.contains("TRANSFER, TRADE, FETCH_PRICE"));
        assert!(message.ends_with("..."));

        let err = resolve(ActionKind::ALL, "LAUNCH_ROCKET").unwrap_err();
        assert!(err.to_string().contains("'LAUNCH_ROCKET'"));
    }

    #[test]
    fn listing_is_truncated() {
        let many = vec![ActionKind::GetAssetsByCreator; 100];
        let listing = available_listing(&many);
        assert_eq!(listing.chars().count(), AVAILABLE_LISTING_LIMIT + 3);
    }

    #[test]
    fn descriptors_cover_catalog() {
        for action in ActionKind::ALL {
            let descriptor = action.descriptor();
            assert_eq!(descriptor.name, action.name());
            assert!(!descriptor.similes.is_empty());
            assert_eq!(action.parameters()["type"], "object");
        }
    }
}
