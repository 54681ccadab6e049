use crate::proxy::UpstreamError;
use mockex_core::store::StoreError;
use thiserror::Error;

/// Poloniex business error. The `Display` output is the exact prose the real API
/// returns inside its `{"error": "..."}` payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoloniexError {
    #[error("Invalid command.")]
    InvalidCommand,
    #[error("Invalid API key/secret pair.")]
    InvalidApiKeySecretPair,
    #[error("Invalid account parameter.")]
    InvalidAccount,
    #[error("Invalid currency parameter.")]
    InvalidCurrency,
    #[error("Invalid start parameter.")]
    InvalidStart,
    #[error("Invalid end parameter.")]
    InvalidEnd,
    #[error("Invalid currencyPair parameter.")]
    InvalidCurrencyPair,
    #[error("Invalid rate parameter.")]
    InvalidRate,
    #[error("Invalid amount parameter.")]
    InvalidAmount,
    #[error("Invalid address parameter.")]
    InvalidAddress,
    #[error("Required parameter missing.")]
    RequiredParameterMissing,
    #[error("Total must be at least 0.0001.")]
    TotalTooSmall,
    #[error("Not enough {0}.")]
    NotEnoughCurrency(String),
    #[error("Invalid nonce parameter.")]
    InvalidNonce,
    #[error("Nonce must be greater than {previous}. You provided {provided}.")]
    NonceNotGreater { previous: u64, provided: u64 },
    #[error("Invalid orderNumber parameter.")]
    InvalidOrderNumber,
    #[error("Invalid order number, or you are not the person who placed the order.")]
    OrderNotFound,
}

/// Failure of one Poloniex adapter operation.
///
/// `Api` and upstream `Venue` failures render as `{"error": "..."}` with HTTP 200;
/// store exhaustion and transport problems surface as internal errors, and
/// `Unsupported` marks venue commands the simulation does not implement.
#[derive(Debug, Error)]
pub enum PoloniexFailure {
    #[error(transparent)]
    Api(#[from] PoloniexError),
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("{0} is not implemented")]
    Unsupported(&'static str),
}

impl PoloniexFailure {
    /// Message to render through the error payload, when this is a business error.
    pub fn envelope_message(&self) -> Option<String> {
        match self {
            PoloniexFailure::Api(error) => Some(error.to_string()),
            PoloniexFailure::Upstream(UpstreamError::Venue(message)) => Some(message.clone()),
            _ => None,
        }
    }
}
