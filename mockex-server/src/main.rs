use clap::Parser;
use mockex_core::{Executor, Store};
use mockex_exchange::bittrex::BittrexApi;
use mockex_exchange::bittrex::proxy::BittrexProxy;
use mockex_exchange::poloniex::PoloniexApi;
use mockex_exchange::poloniex::proxy::PoloniexProxy;
use mockex_server::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulated Bittrex and Poloniex backend for integration-testing trading bots.
#[derive(Debug, Parser)]
#[command(name = "mockex-server")]
struct Config {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8008")]
    bind: SocketAddr,

    /// Real Bittrex public API base, used for pass-through market data.
    #[arg(long, default_value = mockex_exchange::bittrex::proxy::DEFAULT_BASE_URL)]
    bittrex_upstream: String,

    /// Real Poloniex public API base, used for pass-through market data.
    #[arg(long, default_value = mockex_exchange::poloniex::proxy::DEFAULT_BASE_URL)]
    poloniex_upstream: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let executor = Arc::new(Executor::new(Store::memory()));
    let bittrex = BittrexApi::new(
        Arc::clone(&executor),
        BittrexProxy::new(config.bittrex_upstream.clone()),
    );
    let poloniex = PoloniexApi::new(
        Arc::clone(&executor),
        PoloniexProxy::new(config.poloniex_upstream.clone()),
    );
    let state = AppState::new(executor, bittrex, poloniex);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(address = %config.bind, "mockex listening");
    axum::serve(listener, mockex_server::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
