use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Json, Response, Sse};
use axum::routing::{any, get, post};
use axum::Router;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::actions::{self, ActionDescriptor};
use crate::agent::wallet::LAMPORTS_PER_SOL;
use crate::agent::AgentHandle;
use crate::config::{
    ConfigUpdate, EffectiveConfig, EnvDefaults, GatewaySettings, RuntimeConfig,
    OPENROUTER_API_KEY_LABEL,
};
use crate::error::{GateError, GateResult};
use crate::providers::OpenRouterClient;
use crate::session::{SessionLimits, SessionStore};
use crate::streaming::{self, ChatTurn};

const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// Shared state injected into every handler.
pub struct AppState {
    env: EnvDefaults,
    settings: GatewaySettings,
    runtime: RwLock<RuntimeState>,
    sessions: Arc<SessionStore>,
}

/// Runtime overrides and the agent built from them. Swapped together under
/// one write lock so readers never see a config without its agent.
struct RuntimeState {
    config: RuntimeConfig,
    agent: Option<Arc<AgentHandle>>,
    agent_error: Option<String>,
}

impl RuntimeState {
    fn build(config: RuntimeConfig, env: &EnvDefaults, settings: &GatewaySettings) -> Self {
        let effective = config.effective(env);
        match AgentHandle::initialize(&effective, settings) {
            Ok(agent) => Self {
                config,
                agent: Some(Arc::new(agent)),
                agent_error: None,
            },
            Err(GateError::NotConfigured(missing)) => {
                warn!("Missing config: {}", missing.join(", "));
                Self {
                    config,
                    agent: None,
                    agent_error: None,
                }
            }
            Err(e) => {
                error!("Failed to initialize agent: {}", e);
                Self {
                    config,
                    agent: None,
                    agent_error: Some(e.to_string()),
                }
            }
        }
    }
}

impl AppState {
    pub fn new(env: EnvDefaults, settings: GatewaySettings) -> Self {
        let runtime = RuntimeState::build(RuntimeConfig::default(), &env, &settings);
        let sessions = Arc::new(SessionStore::new(SessionLimits {
            max_sessions: settings.max_sessions,
            max_history: settings.max_history,
            ttl: settings.session_ttl,
        }));

        Self {
            env,
            settings,
            runtime: RwLock::new(runtime),
            sessions,
        }
    }

    pub async fn agent(&self) -> Option<Arc<AgentHandle>> {
        self.runtime.read().await.agent.clone()
    }

    pub async fn effective_config(&self) -> EffectiveConfig {
        self.runtime.read().await.config.effective(&self.env)
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Apply a partial update and rebuild the agent in one guarded write.
    pub async fn update_config(&self, update: ConfigUpdate) -> ConfigUpdateResponse {
        let mut runtime = self.runtime.write().await;
        let mut config = runtime.config.clone();
        config.apply(update);
        *runtime = RuntimeState::build(config, &self.env, &self.settings);

        let effective = runtime.config.effective(&self.env);
        ConfigUpdateResponse {
            success: true,
            status: ConfigStatus::from(&effective),
            agent_initialized: runtime.agent.is_some(),
            agent_error: runtime.agent_error.clone(),
        }
    }

    async fn require_agent(&self) -> GateResult<Arc<AgentHandle>> {
        let runtime = self.runtime.read().await;
        match &runtime.agent {
            Some(agent) => Ok(Arc::clone(agent)),
            None => Err(GateError::not_configured(
                runtime.config.effective(&self.env).missing_fields(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub configured: bool,
    pub wallet_address: Option<String>,
    pub available_actions: Vec<ActionSummary>,
}

#[derive(Debug, Serialize)]
pub struct ActionSummary {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub open_router_api_key: bool,
    pub rpc_url: bool,
    pub solana_private_key: bool,
    pub is_fully_configured: bool,
    pub model: String,
}

impl From<&EffectiveConfig> for ConfigStatus {
    fn from(config: &EffectiveConfig) -> Self {
        Self {
            open_router_api_key: config.open_router_api_key.is_some(),
            rpc_url: config.rpc_url.is_some(),
            solana_private_key: config.solana_private_key.is_some(),
            is_fully_configured: config.is_fully_configured(),
            model: config.model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub status: ConfigStatus,
    pub agent_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub address: String,
    pub balance: f64,
}

#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    pub actions: Vec<ActionDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActionRequest {
    pub action_name: Option<String>,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct ExecuteActionResponse {
    pub success: bool,
    pub result: Value,
}

pub struct ApiServer {
    state: Arc<AppState>,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            static_dir: None,
        }
    }

    /// Serve a prebuilt single-page web client for every non-API path.
    pub fn with_static_dir(mut self, dir: PathBuf) -> Self {
        self.static_dir = Some(dir);
        self
    }

    pub async fn start(&self, host: &str, port: u16) -> GateResult<()> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("🚀 solgate listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> GateResult<()> {
        axum::serve(listener, self.create_router()).await?;
        Ok(())
    }

    /// Bind to `addr` and serve in the background, returning the bound address.
    pub async fn spawn(self, addr: SocketAddr) -> GateResult<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = self.serve(listener).await {
                error!("API server stopped: {}", e);
            }
        });
        Ok(bound)
    }

    pub fn create_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/status", get(status_handler))
            .route("/api/config", get(get_config_handler).post(update_config_handler))
            .route("/api/wallet", get(wallet_handler))
            .route("/api/actions", get(actions_handler))
            .route("/api/models", get(models_handler))
            .route("/api/chat", post(chat_handler))
            .route("/api/execute-action", post(execute_action_handler));

        let router = match &self.static_dir {
            Some(dir) => router
                .route("/api/*rest", any(api_not_found_handler))
                .fallback_service(
                    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
                ),
            None => router,
        };

        router
            .layer(CorsLayer::very_permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }
}

async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let response = match state.agent().await {
        Some(agent) => StatusResponse {
            configured: true,
            wallet_address: Some(agent.address().to_string()),
            available_actions: agent
                .actions()
                .iter()
                .map(|action| ActionSummary {
                    name: action.name(),
                    description: action.description(),
                })
                .collect(),
        },
        None => StatusResponse {
            configured: false,
            wallet_address: None,
            available_actions: Vec::new(),
        },
    };
    Json(response)
}

async fn get_config_handler(State(state): State<Arc<AppState>>) -> Json<ConfigStatus> {
    Json(ConfigStatus::from(&state.effective_config().await))
}

async fn update_config_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> GateResult<Json<ConfigUpdateResponse>> {
    let Json(update) = body?;
    if update.is_empty() {
        info!("Config update with no fields; rebuilding agent from current values");
    }
    Ok(Json(state.update_config(update).await))
}

async fn wallet_handler(State(state): State<Arc<AppState>>) -> GateResult<Json<WalletResponse>> {
    let agent = state.require_agent().await?;
    let lamports = agent.balance_lamports().await?;

    Ok(Json(WalletResponse {
        address: agent.address().to_string(),
        balance: lamports as f64 / LAMPORTS_PER_SOL as f64,
    }))
}

async fn actions_handler(State(state): State<Arc<AppState>>) -> GateResult<Json<ActionsResponse>> {
    let agent = state.require_agent().await?;
    Ok(Json(ActionsResponse {
        actions: agent.actions().iter().map(|action| action.descriptor()).collect(),
    }))
}

async fn models_handler(State(state): State<Arc<AppState>>) -> GateResult<Json<Value>> {
    let config = state.effective_config().await;
    let api_key = config
        .open_router_api_key
        .ok_or_else(|| GateError::validation("OpenRouter API key not configured"))?;

    let client = OpenRouterClient::new(
        &state.settings.openrouter_base_url,
        api_key,
        state.settings.upstream_timeout,
    )?;
    Ok(Json(client.list_models().await?))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatApiRequest>, JsonRejection>,
) -> GateResult<Response> {
    let agent = state.require_agent().await?;
    let Json(request) = body?;

    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| GateError::validation("Message is required"))?;

    let config = state.effective_config().await;
    let api_key = config
        .open_router_api_key
        .ok_or_else(|| GateError::not_configured([OPENROUTER_API_KEY_LABEL]))?;

    let session_id = request
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(SessionStore::new_session_id);
    let session_header = HeaderValue::from_str(&session_id)
        .map_err(|_| GateError::validation("sessionId must be a printable ASCII string"))?;

    let turn = ChatTurn {
        session_id,
        model: config.model,
        client: OpenRouterClient::new(
            &state.settings.openrouter_base_url,
            api_key,
            state.settings.upstream_timeout,
        )?,
        agent,
        sessions: Arc::clone(&state.sessions),
        max_steps: state.settings.max_chat_steps,
        idle_timeout: state.settings.upstream_timeout,
    };

    let events = streaming::start_turn(turn, message).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<Event, Infallible>(Event::default().data(data))
    });

    Ok((
        [(SESSION_ID_HEADER, session_header)],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

async fn execute_action_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExecuteActionRequest>, JsonRejection>,
) -> GateResult<Json<ExecuteActionResponse>> {
    let agent = state.require_agent().await?;
    let Json(request) = body?;

    let action_name = request
        .action_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| GateError::validation("Action name is required"))?;

    let result = actions::execute(&agent, &action_name, request.params).await?;
    Ok(Json(ExecuteActionResponse {
        success: true,
        result,
    }))
}

async fn api_not_found_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
