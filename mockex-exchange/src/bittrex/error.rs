use crate::proxy::UpstreamError;
use mockex_core::store::StoreError;
use thiserror::Error;

/// Bittrex business error. The `Display` output is the exact uppercase constant
/// the real API returns - trading bots pattern-match on these strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BittrexError {
    #[error("MARKET_NOT_PROVIDED")]
    MarketNotProvided,
    #[error("CURRENCY_NOT_PROVIDED")]
    CurrencyNotProvided,
    #[error("NONCE_NOT_PROVIDED")]
    NonceNotProvided,
    #[error("APIKEY_NOT_PROVIDED")]
    ApikeyNotProvided,
    #[error("APISIGN_NOT_PROVIDED")]
    ApisignNotProvided,
    #[error("RATE_NOT_PROVIDED")]
    RateNotProvided,
    #[error("QUANTITY_NOT_PROVIDED")]
    QuantityNotProvided,
    #[error("INVALID_SIGNATURE")]
    InvalidSignature,
    #[error("INVALID_MARKET")]
    InvalidMarket,
    #[error("INVALID_CURRENCY")]
    InvalidCurrency,
    #[error("QUANTITY_INVALID")]
    QuantityInvalid,
    #[error("RATE_INVALID")]
    RateInvalid,
    #[error("MIN_TRADE_REQUIREMENT_NOT_MET")]
    MinTradeRequirementNotMet,
    #[error("DUST_TRADE_DISALLOWED_MIN_VALUE_50K_SAT")]
    DustTradeDisallowed,
    #[error("INSUFFICIENT_FUNDS")]
    InsufficientFunds,
    #[error("ORDER_NOT_OPEN")]
    OrderNotOpen,
    #[error("UUID_NOT_PROVIDED")]
    UuidNotProvided,
    #[error("UUID_INVALID")]
    UuidInvalid,
    #[error("INVALID_ORDER")]
    InvalidOrder,
    #[error("ADDRESS_GENERATING")]
    AddressGenerating,
    #[error("ADDRESS_NOT_PROVIDED")]
    AddressNotProvided,
    #[error("ADDRESS_INVALID")]
    AddressInvalid,
}

/// Failure of one Bittrex adapter operation.
///
/// `Api` and upstream `Venue` failures render through the `{success, message,
/// result}` envelope with HTTP 200; store exhaustion and transport problems
/// surface as internal errors.
#[derive(Debug, Error)]
pub enum BittrexFailure {
    #[error(transparent)]
    Api(#[from] BittrexError),
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl BittrexFailure {
    /// Message to render through the error envelope, when this is a business error.
    pub fn envelope_message(&self) -> Option<String> {
        match self {
            BittrexFailure::Api(error) => Some(error.to_string()),
            BittrexFailure::Upstream(UpstreamError::Venue(message)) => Some(message.clone()),
            _ => None,
        }
    }
}
