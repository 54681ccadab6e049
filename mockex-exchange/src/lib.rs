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

//! # Mockex-Exchange
//! Venue dialect adapters for the mockex simulated exchange backend. Each adapter
//! translates its venue's wire conventions - authentication, parameter validation,
//! fee model and response shapes - to and from the common engine schema in
//! `mockex-core`, bit-compatible with the venue it emulates:
//!
//! * [`bittrex`] - Bittrex API v1.1: signed-URL auth, `{success, message, result}`
//!   envelopes, UUID order numbers, 0.25% trade fee reserved up front.
//! * [`poloniex`] - Poloniex API v1.0: signed-body auth with a per-key nonce ladder,
//!   per-command response shapes, 9-digit order numbers, 0.2% taker fee charged on
//!   the filled notional.
//!
//! Public market-data endpoints pass through to the real venues via bounded
//! per-method TTL caches ([`proxy`]).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod address;
pub mod auth;
pub mod bittrex;
pub mod poloniex;
pub mod proxy;

/// Decimal rendered on the wire as a bare JSON number carrying its exact digits.
///
/// Responses from the real venues are JSON numbers, not strings, and trading bots
/// parse them as such - so serialisation must not detour through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Num(#[serde(with = "rust_decimal::serde::arbitrary_precision")] pub Decimal);

impl From<Decimal> for Num {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}
