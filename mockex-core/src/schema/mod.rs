use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

pub mod balance;
pub mod order;
pub mod trade;
pub mod transaction;

pub use balance::{Balance, BalanceDelta, BalanceIncrements};
pub use order::{ExtendedOrder, Order, OrderDraft};
pub use trade::Trade;
pub use transaction::{Transaction, TransactionDraft};

/// Number of fractional digits carried by every monetary value in the system.
pub const DECIMAL_SCALE: u32 = 8;

/// Round the provided value to the system [`DECIMAL_SCALE`].
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp(DECIMAL_SCALE)
}

/// Unique identifier for an emulated venue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    Bittrex,
    Poloniex,
}

impl ExchangeId {
    /// Return the &str representation of this [`ExchangeId`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Bittrex => "bittrex",
            ExchangeId::Poloniex => "poloniex",
        }
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of an [`Order`] - whether the base currency is being spent or received.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Buy,
    Sell,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Buy => "buy",
            OrderDirection::Sell => "sell",
        }
    }

    /// Position sign: +1 for buys, -1 for sells.
    pub fn sign(&self) -> i8 {
        match self {
            OrderDirection::Buy => 1,
            OrderDirection::Sell => -1,
        }
    }
}

impl Display for OrderDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution constraint of an [`Order`]. Only Poloniex submissions carry one; plain
/// limit is implied everywhere else.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    FillOrKill,
    ImmediateOrCancel,
    PostOnly,
    Limit,
}

impl OrderType {
    /// Resolve the order type from the wire boolean flags, first set flag winning.
    pub fn from_flags(fill_or_kill: bool, immediate_or_cancel: bool, post_only: bool) -> Self {
        if fill_or_kill {
            OrderType::FillOrKill
        } else if immediate_or_cancel {
            OrderType::ImmediateOrCancel
        } else if post_only {
            OrderType::PostOnly
        } else {
            OrderType::Limit
        }
    }
}

/// Lifecycle state of an [`Order`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Opened,
    Closed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Opened => "opened",
            OrderStatus::Closed => "closed",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a [`Transaction`] - funds entering or leaving the venue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    /// Balance sign: +1 for deposits, -1 for withdrawals.
    pub fn sign(&self) -> i8 {
        match self {
            TransactionType::Deposit => 1,
            TransactionType::Withdrawal => -1,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    NonAuthorized,
    Canceled,
    Pending,
    Confirmed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::NonAuthorized => "non_authorized",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
        }
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Venue-specific logic plugged into the [`Executor`](crate::Executor).
///
/// Implementations declare which venue they serve and populate the derived order fields
/// (`reserved`, `reserved_fee`, `fee`, `total`, `remaining_amount`) according to that
/// venue's fee model. Extension must be pure - derived fields are computed on every
/// read and never stored.
pub trait AdapterLogic: Debug + Send + Sync {
    fn exchange_id(&self) -> ExchangeId;

    fn extend_order(&self, order: Order) -> ExtendedOrder;
}
