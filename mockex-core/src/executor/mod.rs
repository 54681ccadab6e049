use crate::schema::{
    AdapterLogic, BalanceIncrements, Balance, ExchangeId, ExtendedOrder, Order, OrderDraft,
    OrderDirection, OrderStatus, Trade, Transaction, TransactionDraft, TransactionStatus,
    TransactionType, quantize,
};
use crate::store::{FillUpdate, Store, StoreError};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod rng;

pub use rng::{ExecutionRng, FixedRng, SystemRng};

/// Probability that one execution pass leaves an order untouched.
pub const DEFAULT_NON_EXECUTE_PROB: f64 = 0.3;

/// Stateful trading engine owning orders, trades, transactions and balances.
///
/// The executor is the only component that mutates balances. Every settlement event
/// (order opened/closed, transaction submitted/confirmed) folds its ledger movements
/// into one double-entry increment batch. Venue fee models plug in through
/// [`AdapterLogic`] registration and are consulted on every order read.
#[derive(Debug)]
pub struct Executor {
    store: Store,
    adapters: RwLock<FnvHashMap<ExchangeId, Arc<dyn AdapterLogic>>>,
    rng: Box<dyn ExecutionRng>,
}

impl Executor {
    pub fn new(store: Store) -> Self {
        Self::with_rng(store, Box::new(SystemRng))
    }

    /// Construct with an injected randomness source (deterministic in tests).
    pub fn with_rng(store: Store, rng: Box<dyn ExecutionRng>) -> Self {
        Self {
            store,
            adapters: RwLock::new(FnvHashMap::default()),
            rng,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register the venue logic consulted when extending this venue's orders.
    pub fn register_adapter(&self, adapter: Arc<dyn AdapterLogic>) {
        self.adapters.write().insert(adapter.exchange_id(), adapter);
    }

    /// Populate the derived order fields using the owning venue's fee model. Orders
    /// of an unregistered venue get the venue-independent extension with zero fees.
    pub fn extend_order(&self, order: Order) -> ExtendedOrder {
        let adapters = self.adapters.read();
        match adapters.get(&order.exchange_id) {
            Some(logic) => logic.extend_order(order),
            None => ExtendedOrder::unpriced(order),
        }
    }

    /// Insert a new `opened` order and reserve its funds.
    ///
    /// Balance sufficiency is *not* checked here - the submitting adapter validates
    /// funds before calling in.
    pub async fn send_order(
        &self,
        api_key: &str,
        number: &str,
        draft: OrderDraft,
    ) -> Result<ExtendedOrder, StoreError> {
        let order = Order::open(api_key, number, Utc::now(), draft);
        self.store.insert_order(&order).await?;

        let extended = self.extend_order(order);
        self.on_order_opened(&extended).await?;

        info!(
            direction = %extended.order.direction,
            amount = %extended.order.amount,
            market_currency = %extended.order.market_currency,
            price = %extended.order.price,
            base_currency = %extended.order.base_currency,
            "order opened"
        );
        Ok(extended)
    }

    pub async fn get_order(
        &self,
        api_key: &str,
        number: &str,
    ) -> Result<Option<ExtendedOrder>, StoreError> {
        let order = self.store.find_order(api_key, number).await?;
        Ok(order.map(|order| self.extend_order(order)))
    }

    pub async fn get_orders(
        &self,
        api_key: &str,
        status: Option<OrderStatus>,
        market: Option<&str>,
    ) -> Result<Vec<ExtendedOrder>, StoreError> {
        let orders = self.store.find_orders(api_key, status, market).await?;
        Ok(orders.into_iter().map(|order| self.extend_order(order)).collect())
    }

    /// Close an order and release its reservations. Returns `None` when the order
    /// does not exist for this api key.
    pub async fn cancel_order(
        &self,
        api_key: &str,
        number: &str,
    ) -> Result<Option<ExtendedOrder>, StoreError> {
        let Some(order) = self.store.close_order(api_key, number, Utc::now()).await? else {
            return Ok(None);
        };

        let extended = self.extend_order(order);
        self.on_order_closed(&extended).await?;

        info!(
            direction = %extended.order.direction,
            executed = %extended.order.executed_amount,
            of = %extended.order.amount,
            market_currency = %extended.order.market_currency,
            "order canceled"
        );
        Ok(Some(extended))
    }

    /// One probabilistic fill step for one order.
    ///
    /// With probability `non_execute_prob` nothing happens. Otherwise a fill amount
    /// is drawn (exponential with mean equal to the remaining quantity, clipped to
    /// it) unless `trade_amount` pins it, a trade is recorded at the posted price,
    /// and the order's execution state advances atomically. The order update is
    /// gated on the execution state observed here; if a concurrent sweep advanced
    /// the order first, the fill is dropped and its trade row removed.
    pub async fn execute_order(
        &self,
        order: Order,
        non_execute_prob: f64,
        trade_amount: Option<Decimal>,
    ) -> Result<Option<ExtendedOrder>, StoreError> {
        if self.rng.roll() < non_execute_prob {
            debug!(order = %order.id, "skipping execution pass");
            return Ok(None);
        }

        let extended = self.extend_order(order);
        let trade = self.make_trade(&extended, trade_amount);
        if trade.amount <= Decimal::ZERO {
            debug!(order = %extended.order.id, "drawn fill is empty, skipping");
            return Ok(None);
        }

        // Volume-weighted average over the pre-update state: order.total carries
        // the previously filled value.
        let average_price = (trade.amount * trade.price + extended.total)
            / (trade.amount + extended.order.executed_amount);
        let status = if trade.amount == extended.remaining_amount {
            OrderStatus::Closed
        } else {
            OrderStatus::Opened
        };

        self.store.insert_trade(&trade).await?;
        let fill = FillUpdate {
            amount: trade.amount,
            average_price,
            status,
            updated_at: trade.created_at,
        };
        let Some(updated) = self
            .store
            .apply_fill(&extended.order.id, extended.order.executed_amount, &fill)
            .await?
        else {
            warn!(order = %extended.order.id, "order advanced concurrently, dropping fill");
            self.store.delete_trade(&trade.id).await?;
            return Ok(None);
        };

        let updated = self.extend_order(updated);
        if status == OrderStatus::Closed {
            self.on_order_closed(&updated).await?;
        }

        info!(
            direction = %trade.direction,
            amount = %trade.amount,
            of = %updated.order.amount,
            market_currency = %updated.order.market_currency,
            price = %trade.price,
            base_currency = %updated.order.base_currency,
            "executed order fill"
        );
        Ok(Some(updated))
    }

    /// Insert a transaction in its initial state and move the funds it touches.
    pub async fn send_transaction(
        &self,
        api_key: &str,
        number: &str,
        draft: TransactionDraft,
    ) -> Result<Transaction, StoreError> {
        let transaction = Transaction::submit(api_key, number, Utc::now(), draft);
        self.store.insert_transaction(&transaction).await?;
        self.on_transaction_submitted(&transaction).await?;

        info!(
            kind = %transaction.kind,
            amount = %transaction.amount,
            currency = %transaction.currency,
            address = ?transaction.address,
            "transaction submitted"
        );
        Ok(transaction)
    }

    pub async fn get_transactions(
        &self,
        api_key: &str,
        kind: Option<TransactionType>,
        currency: Option<&str>,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.store
            .find_transactions(api_key, kind, currency, start_at, end_at)
            .await
    }

    pub async fn get_trades(
        &self,
        api_key: &str,
        order_number: Option<&str>,
        market: Option<&str>,
        limit: Option<usize>,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Trade>, StoreError> {
        self.store
            .find_trades(api_key, order_number, market, limit, start_at, end_at)
            .await
    }

    pub async fn get_balances(&self, api_key: &str) -> Result<Vec<Balance>, StoreError> {
        self.store.find_balances(api_key).await
    }

    /// Fetch one ledger cell, materialising zeros when no row exists yet.
    pub async fn get_balance(&self, api_key: &str, currency: &str) -> Result<Balance, StoreError> {
        let balance = self.store.find_balance(api_key, currency).await?;
        Ok(balance.unwrap_or_else(|| Balance::zeroed(api_key, currency)))
    }

    /// Processing sweep run before and after every authenticated venue call:
    /// advance every open order by one stochastic fill step, then confirm every
    /// pending transaction.
    pub async fn process(&self) -> Result<(), StoreError> {
        self.execute_orders().await?;
        self.sync_transactions().await
    }

    /// Test-faucet shortcut: record a deposit already `confirmed` and settle it.
    pub async fn deposit(
        &self,
        api_key: &str,
        currency: &str,
        quantity: Decimal,
    ) -> Result<Transaction, StoreError> {
        let transaction = self
            .send_transaction(
                api_key,
                &Uuid::new_v4().to_string(),
                TransactionDraft {
                    kind: TransactionType::Deposit,
                    currency: currency.to_owned(),
                    amount: quantity,
                    address: None,
                    fee: Decimal::ZERO,
                    payment_id: None,
                    status: Some(TransactionStatus::Confirmed),
                    updated_at: Some(Utc::now()),
                },
            )
            .await?;
        self.on_transaction_confirmed(&transaction).await?;
        Ok(transaction)
    }

    async fn execute_orders(&self) -> Result<(), StoreError> {
        for order in self.store.find_opened_orders().await? {
            self.execute_order(order, DEFAULT_NON_EXECUTE_PROB, None).await?;
        }
        Ok(())
    }

    async fn sync_transactions(&self) -> Result<(), StoreError> {
        for transaction in self.store.find_unconfirmed_transactions().await? {
            let confirmed = self
                .store
                .confirm_transaction(&transaction.id, &transaction.api_key, Utc::now())
                .await?;
            if let Some(confirmed) = confirmed {
                self.on_transaction_confirmed(&confirmed).await?;
            }
        }
        Ok(())
    }

    fn make_trade(&self, order: &ExtendedOrder, amount: Option<Decimal>) -> Trade {
        let amount = amount.unwrap_or_else(|| self.draw_fill_amount(order.remaining_amount));
        Trade {
            id: Uuid::new_v4().to_string(),
            api_key: order.order.api_key.clone(),
            order_number: order.order.id.clone(),
            market: order.order.market.clone(),
            direction: order.order.direction,
            price: order.order.price,
            amount,
            created_at: Utc::now(),
        }
    }

    fn draw_fill_amount(&self, remaining: Decimal) -> Decimal {
        let mean = remaining.to_f64().unwrap_or(0.0);
        if mean <= 0.0 {
            return remaining;
        }
        let drawn = Decimal::from_f64(self.rng.exponential(mean))
            .map(quantize)
            .unwrap_or(remaining);
        drawn.min(remaining)
    }

    async fn increment_balances(
        &self,
        api_key: &str,
        increments: &BalanceIncrements,
    ) -> Result<(), StoreError> {
        self.store.increment_balances(api_key, increments).await
    }

    async fn on_order_opened(&self, extended: &ExtendedOrder) -> Result<(), StoreError> {
        let order = &extended.order;
        let mut increments = BalanceIncrements::new();

        let reserve_currency = match order.direction {
            OrderDirection::Buy => &order.base_currency,
            OrderDirection::Sell => &order.market_currency,
        };
        let delta = increments.currency(reserve_currency);
        delta.frozen += extended.reserved;
        delta.available -= extended.reserved;

        let delta = increments.currency(&order.fee_currency);
        delta.frozen += extended.reserved_fee;
        delta.available -= extended.reserved_fee;

        self.increment_balances(&order.api_key, &increments).await
    }

    async fn on_order_closed(&self, extended: &ExtendedOrder) -> Result<(), StoreError> {
        let order = &extended.order;
        let mut increments = BalanceIncrements::new();

        match order.direction {
            OrderDirection::Buy => {
                let delta = increments.currency(&order.base_currency);
                delta.frozen -= extended.reserved;
                delta.available += extended.reserved - extended.total;

                let delta = increments.currency(&order.market_currency);
                delta.available += order.executed_amount;
            }
            OrderDirection::Sell => {
                let delta = increments.currency(&order.market_currency);
                delta.frozen -= extended.reserved;
                delta.available += extended.reserved - order.executed_amount;

                let delta = increments.currency(&order.base_currency);
                delta.available += extended.total;
            }
        }

        let delta = increments.currency(&order.fee_currency);
        delta.frozen -= extended.reserved_fee;
        delta.available += extended.reserved_fee - extended.fee;

        self.increment_balances(&order.api_key, &increments).await
    }

    async fn on_transaction_submitted(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let mut increments = BalanceIncrements::new();
        let delta = increments.currency(&transaction.currency);

        match transaction.kind {
            TransactionType::Withdrawal => {
                delta.available -= transaction.amount;
                delta.frozen += transaction.amount;
            }
            TransactionType::Deposit => {
                delta.pending += transaction.amount;
            }
        }

        self.increment_balances(&transaction.api_key, &increments).await
    }

    async fn on_transaction_confirmed(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let mut increments = BalanceIncrements::new();
        let delta = increments.currency(&transaction.currency);

        match transaction.kind {
            TransactionType::Withdrawal => {
                delta.frozen -= transaction.amount;
            }
            TransactionType::Deposit => {
                delta.pending -= transaction.amount;
                delta.available += transaction.amount;
            }
        }

        self.increment_balances(&transaction.api_key, &increments).await
    }
}
