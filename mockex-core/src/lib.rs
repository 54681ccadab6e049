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

//! # Mockex-Core
//! Trading engine powering the mockex simulated exchange backend. Owns the lifecycle of
//! orders, trades, transactions and per-currency balances, fills open orders with a
//! stochastic single-step matching pass, and settles every balance movement through
//! double-entry increment batches.
//!
//! Venue adapters plug in via the [`AdapterLogic`](schema::AdapterLogic) capability,
//! supplying their fee model as a pure order extension. Persistence goes through the
//! [`Store`](store::Store) typed layer, which talks to a document [`Engine`](store::Engine)
//! with atomic find-and-modify and increment primitives, retrying transient
//! connection loss with exponential backoff.

pub mod executor;
pub mod schema;
pub mod store;

pub use executor::Executor;
pub use store::Store;
