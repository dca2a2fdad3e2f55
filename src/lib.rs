//! # solgate - Solana agent gateway
//!
//! solgate is the backend that web and mobile dashboards talk to. It holds a
//! Solana wallet built from runtime-supplied secrets, exposes a fixed catalog
//! of wallet actions over HTTP, and relays a tool-calling chat with an
//! OpenRouter model as a Server-Sent-Events stream.
//!
//! ## Features
//!
//! - **Runtime configuration**: API key, RPC URL, private key and model can be
//!   set over HTTP, layered over environment defaults
//! - **Action dispatch**: alias-aware lookup into a closed action catalog
//!   (transfers, Jupiter swaps and prices, DAS asset queries, faucet, TPS)
//! - **Streaming chat**: per-session history, catalog actions as model tools,
//!   cancellation on client disconnect
//! - **Bounded sessions**: LRU and idle-time eviction with a per-session cap
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use solgate::{ApiServer, AppState, EnvDefaults, GatewaySettings};
//!
//! #[tokio::main]
//! async fn main() -> solgate::GateResult<()> {
//!     let state = Arc::new(AppState::new(EnvDefaults::from_env(), GatewaySettings::from_env()));
//!     ApiServer::new(state).start("127.0.0.1", 3001).await
//! }
//! ```

pub mod actions;
pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod streaming;

// Re-export commonly used types
pub use actions::{ActionDescriptor, ActionKind};
pub use agent::AgentHandle;
pub use api::{ApiServer, AppState};
pub use config::{ConfigUpdate, EnvDefaults, GatewaySettings, RuntimeConfig};
pub use error::{GateError, GateResult};
pub use session::{ChatMessage, SessionStore};

/// The current version of solgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
