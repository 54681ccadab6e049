use crate::schema::{
    Balance, BalanceIncrements, Order, OrderStatus, Trade, Transaction, TransactionStatus,
    TransactionType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};
use uuid::Uuid;

pub mod engine;

pub use engine::{Document, Engine, Filter, MemoryEngine, StoreError, Update};

const ORDERS: &str = "orders";
const TRADES: &str = "trades";
const TRANSACTIONS: &str = "transactions";
const BALANCES: &str = "balances";

/// Reconnect policy: attempts per operation and the first backoff step. Subsequent
/// steps double (0.5s, 1s, 2s).
const RECONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Mutation applied to an order by one execution fill step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillUpdate {
    pub amount: Decimal,
    pub average_price: Decimal,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Typed persistence layer over a document [`Engine`].
///
/// Owns the four collections (`orders`, `trades`, `transactions`, `balances`),
/// translating entities to exact-digit documents on write and back on read, and
/// retrying transient connection loss with exponential backoff.
#[derive(Debug, Clone)]
pub struct Store {
    engine: Arc<dyn Engine>,
}

impl Store {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Convenience constructor backed by an in-process [`MemoryEngine`].
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    pub async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let document = to_document(ORDERS, order)?;
        self.with_reconnect("insert_order", || {
            self.engine.insert(ORDERS, document.clone())
        })
        .await
    }

    pub async fn find_order(&self, api_key: &str, number: &str) -> Result<Option<Order>, StoreError> {
        let filter = Filter::new().eq("_id", number).eq("api_key", api_key);
        let document = self
            .with_reconnect("find_order", || self.engine.find_one(ORDERS, &filter))
            .await?;
        document.map(|document| from_document(ORDERS, document)).transpose()
    }

    pub async fn find_orders(
        &self,
        api_key: &str,
        status: Option<OrderStatus>,
        market: Option<&str>,
    ) -> Result<Vec<Order>, StoreError> {
        let filter = Filter::new()
            .eq("api_key", api_key)
            .maybe_eq("status", status.map(|status| status.as_str()))
            .maybe_eq("market", market);
        let documents = self
            .with_reconnect("find_orders", || self.engine.find(ORDERS, &filter))
            .await?;
        from_documents(ORDERS, documents)
    }

    /// Every order still open, across all api keys - input of the execution sweep.
    pub async fn find_opened_orders(&self) -> Result<Vec<Order>, StoreError> {
        let filter = Filter::new().eq("status", OrderStatus::Opened.as_str());
        let documents = self
            .with_reconnect("find_opened_orders", || self.engine.find(ORDERS, &filter))
            .await?;
        from_documents(ORDERS, documents)
    }

    /// Mark an order closed, stamping `updated_at`. Returns the after image, or
    /// `None` when the order does not exist for this api key.
    pub async fn close_order(
        &self,
        api_key: &str,
        number: &str,
        closed_at: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let filter = Filter::new().eq("_id", number).eq("api_key", api_key);
        let update = Update::new()
            .set("status", OrderStatus::Closed.as_str())
            .set("updated_at", encode(ORDERS, &closed_at)?);
        let document = self
            .with_reconnect("close_order", || {
                self.engine.find_one_and_update(ORDERS, &filter, &update)
            })
            .await?;
        document.map(|document| from_document(ORDERS, document)).transpose()
    }

    /// Advance an order's execution state by one fill. The update is gated on the
    /// order still being `opened` with the executed amount observed by the caller,
    /// so a concurrent sweep that advanced the order first makes this miss.
    pub async fn apply_fill(
        &self,
        number: &str,
        executed_before: Decimal,
        fill: &FillUpdate,
    ) -> Result<Option<Order>, StoreError> {
        let filter = Filter::new()
            .eq("_id", number)
            .eq("status", OrderStatus::Opened.as_str())
            .decimal_eq("executed_amount", executed_before);
        let update = Update::new()
            .inc("executed_amount", fill.amount)
            .set("average_price", fill.average_price.to_string())
            .set("status", fill.status.as_str())
            .set("updated_at", encode(ORDERS, &fill.updated_at)?);
        let document = self
            .with_reconnect("apply_fill", || {
                self.engine.find_one_and_update(ORDERS, &filter, &update)
            })
            .await?;
        document.map(|document| from_document(ORDERS, document)).transpose()
    }

    pub async fn insert_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        let document = to_document(TRADES, trade)?;
        self.with_reconnect("insert_trade", || {
            self.engine.insert(TRADES, document.clone())
        })
        .await
    }

    /// Remove a trade row inserted by a fill step whose order update missed.
    pub async fn delete_trade(&self, id: &str) -> Result<bool, StoreError> {
        let filter = Filter::new().eq("_id", id);
        self.with_reconnect("delete_trade", || self.engine.delete_one(TRADES, &filter))
            .await
    }

    pub async fn find_trades(
        &self,
        api_key: &str,
        order_number: Option<&str>,
        market: Option<&str>,
        limit: Option<usize>,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Trade>, StoreError> {
        let filter = Filter::new()
            .eq("api_key", api_key)
            .maybe_eq("order_number", order_number)
            .maybe_eq("market", market)
            .maybe_time_after("created_at", start_at)
            .maybe_time_before("created_at", end_at);
        let mut documents = self
            .with_reconnect("find_trades", || self.engine.find(TRADES, &filter))
            .await?;
        if let Some(limit) = limit {
            documents.truncate(limit);
        }
        from_documents(TRADES, documents)
    }

    pub async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let document = to_document(TRANSACTIONS, transaction)?;
        self.with_reconnect("insert_transaction", || {
            self.engine.insert(TRANSACTIONS, document.clone())
        })
        .await
    }

    /// Mark a transaction confirmed, stamping `updated_at`. Returns the after image.
    pub async fn confirm_transaction(
        &self,
        id: &str,
        api_key: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<Option<Transaction>, StoreError> {
        let filter = Filter::new().eq("_id", id).eq("api_key", api_key);
        let update = Update::new()
            .set("status", TransactionStatus::Confirmed.as_str())
            .set("updated_at", encode(TRANSACTIONS, &confirmed_at)?);
        let document = self
            .with_reconnect("confirm_transaction", || {
                self.engine.find_one_and_update(TRANSACTIONS, &filter, &update)
            })
            .await?;
        document
            .map(|document| from_document(TRANSACTIONS, document))
            .transpose()
    }

    pub async fn find_transactions(
        &self,
        api_key: &str,
        kind: Option<TransactionType>,
        currency: Option<&str>,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let filter = Filter::new()
            .eq("api_key", api_key)
            .maybe_eq("type", kind.map(|kind| kind.as_str()))
            .maybe_eq("currency", currency)
            .maybe_time_after("created_at", start_at)
            .maybe_time_before("created_at", end_at);
        let documents = self
            .with_reconnect("find_transactions", || {
                self.engine.find(TRANSACTIONS, &filter)
            })
            .await?;
        from_documents(TRANSACTIONS, documents)
    }

    /// Every transaction that has not reached `confirmed`, across all api keys -
    /// input of the confirmation sweep.
    pub async fn find_unconfirmed_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let filter = Filter::new().ne("status", TransactionStatus::Confirmed.as_str());
        let documents = self
            .with_reconnect("find_unconfirmed_transactions", || {
                self.engine.find(TRANSACTIONS, &filter)
            })
            .await?;
        from_documents(TRANSACTIONS, documents)
    }

    pub async fn find_balances(&self, api_key: &str) -> Result<Vec<Balance>, StoreError> {
        let filter = Filter::new().eq("api_key", api_key);
        let documents = self
            .with_reconnect("find_balances", || self.engine.find(BALANCES, &filter))
            .await?;
        from_documents(BALANCES, documents)
    }

    pub async fn find_balance(
        &self,
        api_key: &str,
        currency: &str,
    ) -> Result<Option<Balance>, StoreError> {
        let filter = Filter::new().eq("api_key", api_key).eq("currency", currency);
        let document = self
            .with_reconnect("find_balance", || self.engine.find_one(BALANCES, &filter))
            .await?;
        document.map(|document| from_document(BALANCES, document)).transpose()
    }

    /// Apply one settlement batch. Each currency's deltas land in a single atomic
    /// increment; a missing ledger row is created in the same step.
    pub async fn increment_balances(
        &self,
        api_key: &str,
        increments: &BalanceIncrements,
    ) -> Result<(), StoreError> {
        debug!(api_key, ?increments, "incrementing balances");
        self.with_reconnect("increment_balances", || {
            for (currency, delta) in increments.iter() {
                let filter = Filter::new()
                    .eq("api_key", api_key)
                    .eq("currency", currency.as_str());
                let mut insert_base = Document::new();
                insert_base.insert("_id".to_owned(), Value::String(Uuid::new_v4().to_string()));
                insert_base.insert("api_key".to_owned(), Value::String(api_key.to_owned()));
                insert_base.insert("currency".to_owned(), Value::String(currency.clone()));
                self.engine.increment_one(
                    BALANCES,
                    &filter,
                    &[
                        ("available", delta.available),
                        ("frozen", delta.frozen),
                        ("pending", delta.pending),
                    ],
                    insert_base,
                )?;
            }
            Ok(())
        })
        .await
    }

    /// Run the provided engine call under the reconnect policy: transient failures
    /// back off 0.5s, 1s, 2s before surfacing; anything else surfaces immediately.
    async fn with_reconnect<T>(
        &self,
        operation: &'static str,
        call: impl Fn() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0;
        loop {
            let error = match call() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if !error.is_transient() {
                return Err(error);
            }

            let wait = RECONNECT_BACKOFF * 2u32.pow(attempt);
            attempt += 1;
            warn!(
                operation,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "store connection lost, backing off"
            );
            tokio::time::sleep(wait).await;

            if attempt == RECONNECT_ATTEMPTS {
                return Err(error);
            }
        }
    }
}

fn encode<T: Serialize>(collection: &'static str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|error| StoreError::Codec { collection, error })
}

fn to_document<T: Serialize>(collection: &'static str, value: &T) -> Result<Document, StoreError> {
    match encode(collection, value)? {
        Value::Object(document) => Ok(document),
        _ => Err(StoreError::Codec {
            collection,
            error: serde::ser::Error::custom("entity did not serialise to a document"),
        }),
    }
}

fn from_document<T: DeserializeOwned>(
    collection: &'static str,
    document: Document,
) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|error| StoreError::Codec { collection, error })
}

fn from_documents<T: DeserializeOwned>(
    collection: &'static str,
    documents: Vec<Document>,
) -> Result<Vec<T>, StoreError> {
    documents
        .into_iter()
        .map(|document| from_document(collection, document))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExchangeId, OrderDirection};
    use rust_decimal_macros::dec;

    fn order(number: &str, api_key: &str) -> Order {
        Order {
            id: number.to_owned(),
            api_key: api_key.to_owned(),
            exchange_id: ExchangeId::Bittrex,
            market: "BTC-XRP".to_owned(),
            direction: OrderDirection::Buy,
            order_type: None,
            price: dec!(0.000001),
            amount: dec!(500),
            executed_amount: dec!(0),
            average_price: dec!(0),
            base_currency: "BTC".to_owned(),
            market_currency: "XRP".to_owned(),
            fee_currency: "BTC".to_owned(),
            status: OrderStatus::Opened,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Engine wrapper dropping the connection for the first `failures` calls.
    #[derive(Debug)]
    struct FlakyEngine {
        inner: MemoryEngine,
        failures: parking_lot::Mutex<u32>,
    }

    impl FlakyEngine {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryEngine::new(),
                failures: parking_lot::Mutex::new(failures),
            }
        }

        fn interrupt(&self) -> Result<(), StoreError> {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::ConnectionLost("connection reset".to_owned()));
            }
            Ok(())
        }
    }

    impl Engine for FlakyEngine {
        fn insert(&self, collection: &'static str, document: Document) -> Result<(), StoreError> {
            self.interrupt()?;
            self.inner.insert(collection, document)
        }

        fn find(&self, collection: &'static str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
            self.interrupt()?;
            self.inner.find(collection, filter)
        }

        fn find_one(
            &self,
            collection: &'static str,
            filter: &Filter,
        ) -> Result<Option<Document>, StoreError> {
            self.interrupt()?;
            self.inner.find_one(collection, filter)
        }

        fn find_one_and_update(
            &self,
            collection: &'static str,
            filter: &Filter,
            update: &Update,
        ) -> Result<Option<Document>, StoreError> {
            self.interrupt()?;
            self.inner.find_one_and_update(collection, filter, update)
        }

        fn increment_one(
            &self,
            collection: &'static str,
            filter: &Filter,
            increments: &[(&'static str, Decimal)],
            insert_base: Document,
        ) -> Result<(), StoreError> {
            self.interrupt()?;
            self.inner.increment_one(collection, filter, increments, insert_base)
        }

        fn delete_one(&self, collection: &'static str, filter: &Filter) -> Result<bool, StoreError> {
            self.interrupt()?;
            self.inner.delete_one(collection, filter)
        }
    }

    #[tokio::test]
    async fn test_order_round_trip_keeps_decimals() {
        let store = Store::memory();
        let mut expected = order("1", "test");
        expected.price = dec!(0.00000001);
        expected.amount = dec!(123456789.12345678);

        store.insert_order(&expected).await.unwrap();
        let actual = store.find_order("test", "1").await.unwrap().unwrap();

        assert_eq!(actual, expected);
        assert_eq!(actual.price, dec!(0.00000001));
        assert_eq!(actual.amount, dec!(123456789.12345678));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_retries_transient_failures() {
        let store = Store::new(Arc::new(FlakyEngine::new(2)));
        store.insert_order(&order("1", "test")).await.unwrap();
        assert!(store.find_order("test", "1").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_surfaces_persistent_failures() {
        let store = Store::new(Arc::new(FlakyEngine::new(u32::MAX)));
        let error = store.insert_order(&order("1", "test")).await.unwrap_err();
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_find_balance_missing_row() {
        let store = Store::memory();
        assert!(store.find_balance("ghost", "BTC").await.unwrap().is_none());
    }
}
