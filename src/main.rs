//! chainpilot HTTP entrypoint.
//!
//! Launches an Axum server in front of one wallet session: actions come in on
//! `POST /action`, status cards and the session are readable over `GET`.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address
//! - `CONFIG_FILE` points at the TOML configuration (default `config.toml`)
//! - `INFURA_API_KEY` fills the built-in RPC endpoints
//! - `WALLET_PRIVATE_KEY` enables the local signer

use axum::http::Method;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::cors;

use chainpilot::chain::evm::RpcChainReader;
use chainpilot::compiler::SolcCompiler;
use chainpilot::config::EngineConfig;
use chainpilot::dispatcher::{ActionDispatcher, EngineParts};
use chainpilot::events::{EventBus, MetricsCollector};
use chainpilot::handlers::{self, AppState};
use chainpilot::market::{CoinGeckoFeed, EtherscanHistory, MarketSources};
use chainpilot::network::Network;
use chainpilot::registry::FileContractRegistry;
use chainpilot::sig_down::SigDown;
use chainpilot::telemetry::Telemetry;
use chainpilot::wallet::{LocalWalletSigner, WalletSigner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = match EngineConfig::from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            tracing::info!("Using default configuration");
            EngineConfig::default()
        }
    };
    let infura_api_key = std::env::var("INFURA_API_KEY").ok();

    // Abort if no network can be reached at all
    let chain = match RpcChainReader::try_new(&config, infura_api_key.as_deref()) {
        Ok(chain) => Arc::new(chain),
        Err(e) => {
            tracing::error!("Failed to create RPC providers: {}", e);
            std::process::exit(1);
        }
    };

    let local_wallet = match LocalWalletSigner::from_env(&config) {
        Ok(Some(wallet)) => {
            tracing::info!(address = %wallet.address(), network = %config.wallet.network, "Local wallet signer loaded");
            Some(Arc::new(wallet))
        }
        Ok(None) => {
            tracing::warn!("WALLET_PRIVATE_KEY not set - signing actions are disabled");
            None
        }
        Err(e) => {
            tracing::error!("Failed to load wallet signer: {}", e);
            std::process::exit(1);
        }
    };

    let market = match (
        CoinGeckoFeed::try_new(&config.market),
        EtherscanHistory::try_new(&config.market, std::env::var("ETHERSCAN_API_KEY").ok()),
    ) {
        (Ok(prices), Ok(history)) => MarketSources {
            prices: Arc::new(prices),
            history: Arc::new(history),
            history_limit: config.market.history_limit,
        },
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to create market data clients: {}", e);
            std::process::exit(1);
        }
    };

    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();

    let events = EventBus::new();
    let metrics = MetricsCollector::new();
    metrics.spawn(&events, shutdown.clone());

    let explorers: HashMap<u64, String> = Network::variants()
        .iter()
        .filter_map(|network| {
            config
                .explorer_url_for(*network)
                .map(|url| (network.chain_id(), url))
        })
        .collect();

    let dispatcher = ActionDispatcher::new(EngineParts {
        chain,
        registry: Arc::new(FileContractRegistry::new(config.registry.path.clone())),
        compiler: Arc::new(SolcCompiler::new(config.compiler.clone())),
        wallet: local_wallet
            .clone()
            .map(|wallet| wallet as Arc<dyn WalletSigner>),
        market,
        events,
        explorers,
        poll_interval: config.rpc.receipt_poll_interval(),
        shutdown: shutdown.clone(),
    });
    if let Err(e) = dispatcher.connect().await {
        tracing::error!(error = %e, "Failed to connect wallet session");
    }

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        metrics,
        local_wallet,
    };

    let cors_layer = if config.cors.allowed_origins.is_empty() {
        tracing::info!("CORS: Allowing all origins (*)");
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(cors::Any)
    } else {
        tracing::info!("CORS: Restricting to {:?}", config.cors.allowed_origins);
        let origins: Vec<_> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors::CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(cors::Any)
    };

    let http_endpoints = handlers::routes()
        .with_state(state)
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            config.request.max_body_size_bytes,
        ))
        .layer(telemetry.http_tracing())
        .layer(cors_layer);

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);
    let ip: IpAddr = match host.parse() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::error!("HOST must be a valid IP address ({}): {}", host, e);
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::new(ip, port);
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    let axum_graceful_shutdown = async move { shutdown.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;

    Ok(())
}
