use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ledger cell for one `(api_key, currency)` pair.
///
/// `available` is spendable, `frozen` is reserved against open orders and in-flight
/// withdrawals, `pending` is inbound deposit value awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Balance {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub api_key: String,
    pub currency: String,
    #[serde(default)]
    pub available: Decimal,
    #[serde(default)]
    pub frozen: Decimal,
    #[serde(default)]
    pub pending: Decimal,
}

impl Balance {
    /// Materialise an empty ledger cell for a pair that has no stored row yet.
    pub fn zeroed(api_key: &str, currency: &str) -> Self {
        Self {
            id: None,
            api_key: api_key.to_owned(),
            currency: currency.to_owned(),
            available: Decimal::ZERO,
            frozen: Decimal::ZERO,
            pending: Decimal::ZERO,
        }
    }

    /// Sum of all three ledger buckets.
    pub fn total(&self) -> Decimal {
        self.available + self.frozen + self.pending
    }
}

/// Signed movement applied to a single ledger cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceDelta {
    pub available: Decimal,
    pub frozen: Decimal,
    pub pending: Decimal,
}

impl BalanceDelta {
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.frozen.is_zero() && self.pending.is_zero()
    }
}

/// Batch of ledger movements for one settlement event, keyed by currency.
///
/// Every balance hook folds all of its movements into one batch so the event settles
/// through a single increment call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceIncrements(pub BTreeMap<String, BalanceDelta>);

impl BalanceIncrements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable access to the delta of the provided currency, zero-initialised.
    pub fn currency(&mut self, currency: &str) -> &mut BalanceDelta {
        self.0.entry(currency.to_owned()).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BalanceDelta)> {
        self.0.iter()
    }
}
