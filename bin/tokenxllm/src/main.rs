mod cli;
mod config_loader;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokenxllm_common::utils::logging::init_logging;
use tokenxllm_gateway::{
    build_router, CredentialSource, CredentialStore, GatewayService, SystemClock,
};
use tokenxllm_ledger::{RelaySigner, StarknetRpcClient};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment and CLI
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let args = cli::Cli::parse();

    // 2. Configuration
    let loaded = config_loader::load_gateway_config(&args)?;
    let config = loaded.config;

    // 3. Logging
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting tokenxllm gateway v{}", env!("CARGO_PKG_VERSION"));
    if dotenv_loaded {
        info!("Loaded environment from .env");
    }
    for notice in &loaded.ignored_env {
        warn!("{}", notice);
    }
    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  AIC: {}", config.aic_addr.as_deref().unwrap_or("<unset>"));
    info!("  UM: {}", config.um_addr.as_deref().unwrap_or("<unset>"));
    info!("  Decimals: {}", config.decimals);
    info!("  Faucet: enabled={} amount={} cooldown={}s",
        config.faucet_enabled, config.faucet_amount, config.faucet_cooldown_seconds);

    // 4. Ledger collaborators
    let reader = Arc::new(StarknetRpcClient::new(config.rpc_url.clone(), config.rpc_timeout())?);
    let signer = Arc::new(RelaySigner::new(config.signer_url.clone(), config.rpc_timeout())?);
    match reader.chain_id().await {
        Ok(chain_id) => info!("Connected to chain {:#x}", chain_id),
        Err(e) => warn!("Could not reach RPC endpoint: {}", e),
    }

    let credentials = Arc::new(CredentialStore::new(CredentialSource::from_config(&config)));

    // 5. Service
    let mut service = GatewayService::new(
        &config,
        reader,
        signer,
        credentials.clone(),
        Arc::new(SystemClock),
    )?;
    service.negotiate_units_encoding(config.authorize_encoding).await;

    match credentials.address_hex() {
        Some(address) => info!("Writes enabled for {}", address),
        None => warn!("No signing credentials; running read-only"),
    }

    // 6. Router
    let mut app = build_router(Arc::new(service)).layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors);
        info!("CORS enabled");
    }

    // 7. Serve
    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
