use clap::Parser;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use solgate::api::{ApiServer, AppState};
use solgate::cli::Args;
use solgate::config::{self, EnvDefaults, GatewaySettings};

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.verbose {
        "solgate=debug,tower_http=debug"
    } else {
        "solgate=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!("⚡ solgate v{}", env!("CARGO_PKG_VERSION"));

    let production = config::is_production();
    let state = Arc::new(AppState::new(EnvDefaults::from_env(), GatewaySettings::from_env()));

    info!("Environment: {}", if production { "production" } else { "development" });
    match state.agent().await {
        Some(agent) => {
            info!("Agent configured: true");
            info!("Wallet: {}", agent.address());
            info!("Available actions: {}", agent.actions().len());
        }
        None => info!("Agent configured: false"),
    }

    let mut server = ApiServer::new(state);
    if production {
        if args.static_dir.is_dir() {
            info!("Serving web client from {}", args.static_dir.display());
            server = server.with_static_dir(args.static_dir.clone());
        } else {
            warn!("Static directory {} not found; serving API only", args.static_dir.display());
        }
    }

    server.start(&args.host, args.port(production)).await?;
    Ok(())
}
