use crate::schema::{ExchangeId, OrderDirection, OrderStatus, OrderType, quantize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One party's intent to buy or sell on a market.
///
/// `direction`, `market`, `price` and `amount` are immutable after creation; execution
/// only ever advances `executed_amount`, `average_price`, `status` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub api_key: String,
    pub exchange_id: ExchangeId,
    pub market: String,
    pub direction: OrderDirection,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub executed_amount: Decimal,
    #[serde(default)]
    pub average_price: Decimal,
    pub base_currency: String,
    pub market_currency: String,
    pub fee_currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Construct a freshly opened [`Order`] from an adapter submission.
    pub fn open(api_key: &str, number: &str, created_at: DateTime<Utc>, draft: OrderDraft) -> Self {
        Self {
            id: number.to_owned(),
            api_key: api_key.to_owned(),
            exchange_id: draft.exchange_id,
            market: draft.market,
            direction: draft.direction,
            order_type: draft.order_type,
            price: draft.price,
            amount: draft.amount,
            executed_amount: draft.executed_amount,
            average_price: draft.average_price,
            base_currency: draft.base_currency,
            market_currency: draft.market_currency,
            fee_currency: draft.fee_currency,
            status: OrderStatus::Opened,
            created_at,
            updated_at: None,
        }
    }

    /// Quantity filled so far valued at the volume-weighted average price.
    pub fn total(&self) -> Decimal {
        quantize(self.executed_amount * self.average_price)
    }
}

/// Fields an adapter provides when submitting a new order to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub exchange_id: ExchangeId,
    pub market: String,
    pub direction: OrderDirection,
    pub order_type: Option<OrderType>,
    pub price: Decimal,
    pub amount: Decimal,
    pub executed_amount: Decimal,
    pub average_price: Decimal,
    pub base_currency: String,
    pub market_currency: String,
    pub fee_currency: String,
}

/// An [`Order`] enriched with venue-specific derived quantities. Computed by
/// [`AdapterLogic::extend_order`](crate::schema::AdapterLogic::extend_order) on every
/// read - never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedOrder {
    pub order: Order,
    /// Quantity still waiting to be filled.
    pub remaining_amount: Decimal,
    /// Filled quantity valued at the average fill price.
    pub total: Decimal,
    /// Fee accrued on the filled notional.
    pub fee: Decimal,
    /// Funds set aside in the reserve currency while the order is open.
    pub reserved: Decimal,
    /// Fee reservation set aside up front.
    pub reserved_fee: Decimal,
}

impl ExtendedOrder {
    /// Extension used for orders whose venue has no registered logic: the
    /// venue-independent quantities are computed and the fee quantities stay zero.
    pub fn unpriced(order: Order) -> Self {
        let total = order.total();
        let remaining_amount = order.amount - order.executed_amount;
        Self {
            order,
            remaining_amount,
            total,
            fee: Decimal::ZERO,
            reserved: Decimal::ZERO,
            reserved_fee: Decimal::ZERO,
        }
    }
}
