// Agent handle: wallet credentials, RPC connection and the action catalog
use reqwest::Client;
use tracing::info;

pub mod rpc;
pub mod transaction;
pub mod wallet;

pub use rpc::RpcClient;
pub use wallet::Wallet;

use crate::actions::ActionKind;
use crate::config::{EffectiveConfig, GatewaySettings};
use crate::error::{GateError, GateResult};

/// HTTP endpoints of the off-chain services some actions call.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub jupiter_price_url: String,
    pub jupiter_quote_url: String,
}

#[derive(Debug)]
pub struct AgentHandle {
    wallet: Wallet,
    rpc: RpcClient,
    http: Client,
    endpoints: ServiceEndpoints,
}

impl AgentHandle {
    /// Build a handle from the effective configuration.
    ///
    /// Fails with `NotConfigured` when any of the three required secrets is
    /// missing, and with `InvalidKey` or `Validation` when they do not parse.
    pub fn initialize(config: &EffectiveConfig, settings: &GatewaySettings) -> GateResult<Self> {
        let (Some(_), Some(rpc_url), Some(secret)) = (
            &config.open_router_api_key,
            &config.rpc_url,
            &config.solana_private_key,
        ) else {
            return Err(GateError::not_configured(config.missing_fields()));
        };

        let wallet = Wallet::from_base58(secret)?;
        let rpc = RpcClient::new(rpc_url, settings.upstream_timeout)?;
        let http = Client::builder()
            .timeout(settings.upstream_timeout)
            .user_agent(concat!("solgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!("Agent initialized for wallet {}", wallet.address());

        Ok(Self {
            wallet,
            rpc,
            http,
            endpoints: ServiceEndpoints {
                jupiter_price_url: settings.jupiter_price_url.trim_end_matches('/').to_string(),
                jupiter_quote_url: settings.jupiter_quote_url.trim_end_matches('/').to_string(),
            },
        })
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn address(&self) -> &str {
        self.wallet.address()
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// The fixed set of actions this handle can run.
    pub fn actions(&self) -> &'static [ActionKind] {
        ActionKind::ALL
    }

    pub async fn balance_lamports(&self) -> GateResult<u64> {
        self.rpc.get_balance(self.wallet.address()).await
    }
}
