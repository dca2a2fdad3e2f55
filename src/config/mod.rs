// Runtime configuration layered over environment defaults
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

pub const OPENROUTER_API_KEY_LABEL: &str = "OpenRouter API Key";
pub const RPC_URL_LABEL: &str = "RPC URL";
pub const PRIVATE_KEY_LABEL: &str = "Solana Private Key";

/// Values read from the process environment once at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvDefaults {
    pub open_router_api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub solana_private_key: Option<String>,
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        Self {
            open_router_api_key: non_empty_var("OPENROUTER_API_KEY")
                .or_else(|| non_empty_var("OPENAI_API_KEY")),
            rpc_url: non_empty_var("RPC_URL"),
            solana_private_key: non_empty_var("SOLANA_PRIVATE_KEY"),
        }
    }
}

/// Secrets supplied at runtime through the settings endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub open_router_api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub solana_private_key: Option<String>,
    pub model: Option<String>,
}

/// Partial update from `POST /api/config`.
///
/// The outer `Option` is field presence; the inner one is the value. An absent
/// field leaves the override alone, `null` or `""` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default, deserialize_with = "present")]
    pub open_router_api_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub rpc_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub solana_private_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub model: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.open_router_api_key.is_none()
            && self.rpc_url.is_none()
            && self.solana_private_key.is_none()
            && self.model.is_none()
    }
}

impl RuntimeConfig {
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(value) = update.open_router_api_key {
            self.open_router_api_key = normalize(value);
        }
        if let Some(value) = update.rpc_url {
            self.rpc_url = normalize(value);
        }
        if let Some(value) = update.solana_private_key {
            self.solana_private_key = normalize(value);
        }
        if let Some(value) = update.model {
            self.model = normalize(value);
        }
    }

    /// Runtime values win over environment defaults whenever they are set.
    pub fn effective(&self, defaults: &EnvDefaults) -> EffectiveConfig {
        EffectiveConfig {
            open_router_api_key: self
                .open_router_api_key
                .clone()
                .or_else(|| defaults.open_router_api_key.clone()),
            rpc_url: self.rpc_url.clone().or_else(|| defaults.rpc_url.clone()),
            solana_private_key: self
                .solana_private_key
                .clone()
                .or_else(|| defaults.solana_private_key.clone()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Clone, Default)]
pub struct EffectiveConfig {
    pub open_router_api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub solana_private_key: Option<String>,
    pub model: String,
}

impl EffectiveConfig {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.open_router_api_key.is_none() {
            missing.push(OPENROUTER_API_KEY_LABEL);
        }
        if self.rpc_url.is_none() {
            missing.push(RPC_URL_LABEL);
        }
        if self.solana_private_key.is_none() {
            missing.push(PRIVATE_KEY_LABEL);
        }
        missing
    }

    pub fn is_fully_configured(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

// Never print the secrets themselves.
impl std::fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("open_router_api_key", &self.open_router_api_key.is_some())
            .field("rpc_url", &self.rpc_url)
            .field("solana_private_key", &self.solana_private_key.is_some())
            .field("model", &self.model)
            .finish()
    }
}

/// Operational knobs for the gateway itself.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub openrouter_base_url: String,
    pub jupiter_price_url: String,
    pub jupiter_quote_url: String,
    pub upstream_timeout: Duration,
    pub max_sessions: usize,
    pub max_history: usize,
    pub session_ttl: Duration,
    pub max_chat_steps: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            openrouter_base_url: "https://openrouter.ai/api/v1".to_string(),
            jupiter_price_url: "https://api.jup.ag/price/v2".to_string(),
            jupiter_quote_url: "https://quote-api.jup.ag/v6".to_string(),
            upstream_timeout: Duration::from_secs(60),
            max_sessions: 256,
            max_history: 100,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            max_chat_steps: 10,
        }
    }
}

impl GatewaySettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openrouter_base_url: non_empty_var("OPENROUTER_BASE_URL")
                .unwrap_or(defaults.openrouter_base_url),
            jupiter_price_url: non_empty_var("JUPITER_PRICE_URL")
                .unwrap_or(defaults.jupiter_price_url),
            jupiter_quote_url: non_empty_var("JUPITER_QUOTE_URL")
                .unwrap_or(defaults.jupiter_quote_url),
            upstream_timeout: Duration::from_secs(parse_var(
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )),
            max_sessions: parse_var("CHAT_MAX_SESSIONS", defaults.max_sessions).max(1),
            max_history: parse_var("CHAT_MAX_HISTORY", defaults.max_history).max(2),
            session_ttl: Duration::from_secs(parse_var(
                "CHAT_SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )),
            max_chat_steps: parse_var("CHAT_MAX_STEPS", defaults.max_chat_steps).max(1),
        }
    }
}

pub fn is_production() -> bool {
    env::var("NODE_ENV").map(|v| v == "production").unwrap_or(false)
}

fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}
