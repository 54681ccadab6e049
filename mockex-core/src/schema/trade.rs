use crate::schema::OrderDirection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single fill event against an [`Order`](crate::schema::Order).
///
/// Limit orders fill at their posted price, so `price` always equals the parent
/// order's price, and the sum of trade amounts for an order never exceeds the
/// order's amount.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Trade {
    #[serde(rename = "_id")]
    pub id: String,
    pub api_key: String,
    pub order_number: String,
    pub market: String,
    pub direction: OrderDirection,
    pub price: Decimal,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}
