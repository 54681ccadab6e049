#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Mockex-Server
//! HTTP surface of the mockex simulated exchange backend. Exposes the Bittrex v1.1
//! and Poloniex v1.0 URL trees over one shared engine, plus the documentation page
//! and the deposit test faucet.
//!
//! Every authenticated route runs the same pipeline: processing sweep,
//! authentication, operation dispatch, processing sweep, venue envelope. Business
//! errors render through the venue's envelope with HTTP 200, exactly as the real
//! venues do; internal failures surface as 500s.

use axum::Router;
use axum::response::Redirect;
use mockex_core::Executor;
use mockex_exchange::bittrex::BittrexApi;
use mockex_exchange::poloniex::PoloniexApi;
use std::sync::Arc;

pub mod routes;

/// Shared dependencies injected into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub bittrex: Arc<BittrexApi>,
    pub poloniex: Arc<PoloniexApi>,
}

impl AppState {
    pub fn new(executor: Arc<Executor>, bittrex: BittrexApi, poloniex: PoloniexApi) -> Self {
        Self {
            executor,
            bittrex: Arc::new(bittrex),
            poloniex: Arc::new(poloniex),
        }
    }
}

/// The full URL tree. Unknown paths redirect to the documentation page.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::bittrex::router())
        .merge(routes::poloniex::router())
        .merge(routes::pages::router())
        .fallback(redirect_to_documentation)
        .with_state(state)
}

async fn redirect_to_documentation() -> Redirect {
    Redirect::temporary("/")
}
