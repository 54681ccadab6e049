use crate::auth::verify_signature;
use crate::poloniex::proxy::PoloniexProxy;
use crate::poloniex::response::{
    PoloniexCompleteBalance, PoloniexDeposit, PoloniexOrder, PoloniexOrderStatus, PoloniexTrade,
    PoloniexWithdrawal, format_balance, format_deposit, format_order, format_order_status,
    format_trade, format_withdrawal, get_btc_market, parse_address, parse_decimal, parse_limit,
    parse_timestamp, split_currency_pair,
};
use crate::Num;
use fnv::FnvHashMap;
use itertools::Itertools;
use mockex_core::Executor;
use mockex_core::schema::{
    AdapterLogic, ExchangeId, ExtendedOrder, Order, OrderDirection, OrderDraft, OrderStatus,
    OrderType, TransactionDraft, TransactionType, quantize,
};
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod error;
pub mod proxy;
pub mod response;

pub use error::{PoloniexError, PoloniexFailure};

/// Venue constants of the Poloniex v1.0 dialect.
pub struct PoloniexParams;

impl PoloniexParams {
    /// Taker fee: 0.2% of filled notional. All simulated fills take liquidity.
    pub fn taker_fee_pct() -> Decimal {
        Decimal::new(2, 3)
    }

    /// Maker fee: 0.1%, reported by `returnFeeInfo` only.
    pub fn maker_fee_pct() -> Decimal {
        Decimal::new(1, 3)
    }

    /// Minimum order value: 0.0001 BTC.
    pub fn min_trade_total() -> Decimal {
        Decimal::new(1, 4)
    }
}

/// Poloniex fee model, consulted by the engine on every order read.
///
/// Nothing is reserved for fees up front; the taker fee accrues on the filled
/// notional, charged in the market currency for buys and in base proceeds for
/// sells.
#[derive(Debug)]
pub struct PoloniexLogic;

impl AdapterLogic for PoloniexLogic {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Poloniex
    }

    fn extend_order(&self, order: Order) -> ExtendedOrder {
        let total = order.total();
        let remaining_amount = order.amount - order.executed_amount;

        let (reserved, fee) = match order.direction {
            OrderDirection::Buy => (
                quantize(order.amount * order.price),
                quantize(order.executed_amount * PoloniexParams::taker_fee_pct()),
            ),
            OrderDirection::Sell => (
                order.amount,
                quantize(total * PoloniexParams::taker_fee_pct()),
            ),
        };

        ExtendedOrder {
            remaining_amount,
            total,
            fee,
            reserved,
            reserved_fee: Decimal::ZERO,
            order,
        }
    }
}

/// `buy` / `sell` result.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPlaced {
    #[serde(rename = "orderNumber")]
    pub order_number: u64,
    #[serde(rename = "resultingTrades")]
    pub resulting_trades: Option<Vec<PoloniexTrade>>,
}

/// `cancelOrder` result.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCanceled {
    pub amount: Num,
    pub message: String,
    pub success: u8,
}

/// `returnOrderStatus` result: open orders resolve, everything else is a bare
/// failure flag.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OrderStatusResult {
    Open {
        result: BTreeMap<String, PoloniexOrderStatus>,
        success: u8,
    },
    NotOpen {
        success: u8,
    },
}

/// `generateNewAddress` result - address generation is not simulated.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAddress {
    pub success: u8,
    pub response: Option<String>,
}

/// `returnDepositsWithdrawals` result.
#[derive(Debug, Clone, Serialize)]
pub struct DepositsWithdrawals {
    pub deposits: Vec<PoloniexDeposit>,
    pub withdrawals: Vec<PoloniexWithdrawal>,
}

/// `withdraw` result.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawResponse {
    pub response: String,
}

/// `returnFeeInfo` result.
#[derive(Debug, Clone, Serialize)]
pub struct FeeInfo {
    #[serde(rename = "makerFee")]
    pub maker_fee: Num,
    #[serde(rename = "takerFee")]
    pub taker_fee: Num,
    #[serde(rename = "thirtyDayVolume")]
    pub thirty_day_volume: Num,
    #[serde(rename = "nextTier")]
    pub next_tier: Num,
}

/// List endpoints return a flat list for one pair, or a map keyed by market when
/// queried with `"all"`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Grouped<T> {
    Single(Vec<T>),
    ByMarket(BTreeMap<String, Vec<T>>),
}

/// `returnAvailableAccountBalances` result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AvailableBalances {
    Flat(BTreeMap<String, Num>),
    ByAccount(BTreeMap<&'static str, BTreeMap<String, Num>>),
}

/// Poloniex v1.0 adapter: authentication with a per-key nonce ladder, parameter
/// validation and response formatting around the shared [`Executor`].
#[derive(Debug)]
pub struct PoloniexApi {
    executor: Arc<Executor>,
    proxy: PoloniexProxy,
    nonces: Mutex<FnvHashMap<String, u64>>,
}

impl PoloniexApi {
    pub fn new(executor: Arc<Executor>, proxy: PoloniexProxy) -> Self {
        executor.register_adapter(Arc::new(PoloniexLogic));
        Self {
            executor,
            proxy,
            nonces: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn proxy(&self) -> &PoloniexProxy {
        &self.proxy
    }

    /// Random 9-digit order/withdrawal number.
    fn get_number(&self) -> u64 {
        rand::rng().random_range(1..=999_999_999)
    }

    /// Validate the nonce and advance the ladder for this api key. The nonce is
    /// consumed even when the signature check afterwards fails, so a replayed
    /// request can never be accepted later.
    fn parse_nonce(&self, api_key: &str, nonce: Option<&str>) -> Result<(), PoloniexError> {
        let nonce: u64 = nonce
            .filter(|nonce| !nonce.is_empty())
            .and_then(|nonce| nonce.parse().ok())
            .ok_or(PoloniexError::InvalidNonce)?;

        let mut nonces = self.nonces.lock();
        let previous = nonces.get(api_key).copied().unwrap_or(0);
        if nonce <= previous {
            return Err(PoloniexError::NonceNotGreater {
                previous,
                provided: nonce,
            });
        }
        nonces.insert(api_key.to_owned(), nonce);
        Ok(())
    }

    /// Authenticate a signed request. Poloniex signs the urlencoded body with the
    /// user's secret, which equals the api key here. Returns the authenticated
    /// api key.
    pub fn authenticate(
        &self,
        api_key: Option<&str>,
        api_sign: Option<&str>,
        nonce: Option<&str>,
        body: &str,
    ) -> Result<String, PoloniexError> {
        self.parse_nonce(api_key.unwrap_or_default(), nonce)?;

        let Some(api_key) = api_key.filter(|key| !key.is_empty()) else {
            return Err(PoloniexError::InvalidApiKeySecretPair);
        };
        let api_secret = api_key;
        let valid = api_sign
            .filter(|sign| !sign.is_empty())
            .is_some_and(|sign| verify_signature(body, api_secret, sign));
        if !valid {
            return Err(PoloniexError::InvalidApiKeySecretPair);
        }
        Ok(api_key.to_owned())
    }

    async fn parse_currency(&self, currency: Option<&str>) -> Result<String, PoloniexFailure> {
        let Some(currency) = currency.filter(|currency| !currency.is_empty()) else {
            return Err(PoloniexError::RequiredParameterMissing.into());
        };
        if !self.proxy.currencies().await?.contains_key(currency) {
            return Err(PoloniexError::InvalidCurrency.into());
        }
        Ok(currency.to_owned())
    }

    /// `"all"` means "no pair filter" on list endpoints.
    async fn parse_currency_pair(
        &self,
        currency_pair: Option<&str>,
    ) -> Result<Option<String>, PoloniexFailure> {
        let Some(currency_pair) = currency_pair.filter(|pair| !pair.is_empty()) else {
            return Err(PoloniexError::RequiredParameterMissing.into());
        };
        if currency_pair == "all" {
            return Ok(None);
        }
        if !self.proxy.tickers().await?.contains_key(currency_pair) {
            return Err(PoloniexError::InvalidCurrencyPair.into());
        }
        Ok(Some(currency_pair.to_owned()))
    }

    async fn check_balance(
        &self,
        api_key: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<(), PoloniexFailure> {
        let balance = self.executor.get_balance(api_key, currency).await?;
        if amount > balance.available {
            return Err(PoloniexError::NotEnoughCurrency(currency.to_owned()).into());
        }
        Ok(())
    }

    async fn get_order(
        &self,
        api_key: &str,
        order_number: Option<&str>,
    ) -> Result<ExtendedOrder, PoloniexFailure> {
        let Some(order_number) = order_number.filter(|number| !number.is_empty()) else {
            return Err(PoloniexError::RequiredParameterMissing.into());
        };
        if order_number.parse::<u64>().is_err() {
            return Err(PoloniexError::InvalidOrderNumber.into());
        }
        self.executor
            .get_order(api_key, order_number)
            .await?
            .ok_or_else(|| PoloniexError::OrderNotFound.into())
    }

    /// `returnBalances`: every known currency, zero unless funds are held.
    pub async fn return_balances(
        &self,
        api_key: &str,
    ) -> Result<BTreeMap<String, Num>, PoloniexFailure> {
        let mut result: BTreeMap<String, Num> = self
            .proxy
            .currencies()
            .await?
            .keys()
            .map(|currency| (currency.clone(), Num(Decimal::ZERO)))
            .collect();

        for balance in self.executor.get_balances(api_key).await? {
            result.insert(balance.currency.clone(), Num(balance.available));
        }
        Ok(result)
    }

    /// `returnCompleteBalances`.
    pub async fn return_complete_balances(
        &self,
        api_key: &str,
        account: Option<&str>,
    ) -> Result<BTreeMap<String, PoloniexCompleteBalance>, PoloniexFailure> {
        if let Some(account) = account.filter(|account| !account.is_empty())
            && account != "exchange"
        {
            return Err(PoloniexError::InvalidAccount.into());
        }

        let tickers = self.proxy.tickers().await?;
        let balances = self.executor.get_balances(api_key).await?;
        Ok(balances
            .iter()
            .map(|balance| {
                let last = tickers
                    .get(&get_btc_market(&balance.currency))
                    .map(|ticker| ticker.last);
                (balance.currency.clone(), format_balance(balance, last))
            })
            .collect())
    }

    /// `returnDepositAddresses`: none are simulated.
    pub fn return_deposit_addresses(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// `generateNewAddress`: address generation is not simulated.
    pub async fn generate_new_address(
        &self,
        currency: Option<&str>,
    ) -> Result<GeneratedAddress, PoloniexFailure> {
        self.parse_currency(currency).await?;
        Ok(GeneratedAddress {
            success: 0,
            response: None,
        })
    }

    /// `returnDepositsWithdrawals`.
    pub async fn return_deposits_withdrawals(
        &self,
        api_key: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<DepositsWithdrawals, PoloniexFailure> {
        let start_at = parse_timestamp(start, PoloniexError::InvalidStart)?;
        let end_at = parse_timestamp(end, PoloniexError::InvalidEnd)?;
        let transactions = self
            .executor
            .get_transactions(api_key, None, None, Some(start_at), Some(end_at))
            .await?;

        Ok(DepositsWithdrawals {
            deposits: transactions
                .iter()
                .filter(|transaction| transaction.kind == TransactionType::Deposit)
                .map(format_deposit)
                .collect(),
            withdrawals: transactions
                .iter()
                .filter(|transaction| transaction.kind == TransactionType::Withdrawal)
                .map(format_withdrawal)
                .collect(),
        })
    }

    /// `returnOpenOrders`.
    pub async fn return_open_orders(
        &self,
        api_key: &str,
        currency_pair: Option<&str>,
    ) -> Result<Grouped<PoloniexOrder>, PoloniexFailure> {
        let currency_pair = self.parse_currency_pair(currency_pair).await?;
        let orders = self
            .executor
            .get_orders(api_key, Some(OrderStatus::Opened), currency_pair.as_deref())
            .await?;

        if currency_pair.is_some() {
            return Ok(Grouped::Single(orders.iter().map(format_order).collect()));
        }
        Ok(Grouped::ByMarket(group_by_market(&orders, format_order)))
    }

    /// `returnTradeHistory` (private).
    pub async fn return_account_trade_history(
        &self,
        api_key: &str,
        currency_pair: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Grouped<PoloniexTrade>, PoloniexFailure> {
        let currency_pair = self.parse_currency_pair(currency_pair).await?;
        let limit = parse_limit(limit);
        let trades = self
            .executor
            .get_trades(
                api_key,
                None,
                currency_pair.as_deref(),
                (limit > 0).then_some(limit),
                Some(parse_timestamp(start, PoloniexError::InvalidStart)?),
                Some(parse_timestamp(end, PoloniexError::InvalidEnd)?),
            )
            .await?;

        if currency_pair.is_some() {
            return Ok(Grouped::Single(trades.iter().map(format_trade).collect()));
        }

        let grouped = trades
            .iter()
            .sorted_unstable_by_key(|trade| trade.market.clone())
            .chunk_by(|trade| trade.market.clone());
        Ok(Grouped::ByMarket(
            grouped
                .into_iter()
                .map(|(market, group)| (market, group.map(format_trade).collect()))
                .collect(),
        ))
    }

    /// `returnOrderTrades`.
    pub async fn return_order_trades(
        &self,
        api_key: &str,
        order_number: Option<&str>,
    ) -> Result<Vec<PoloniexTrade>, PoloniexFailure> {
        let trades = self
            .executor
            .get_trades(api_key, order_number, None, None, None, None)
            .await?;
        Ok(trades.iter().map(format_trade).collect())
    }

    /// `returnOrderStatus`.
    pub async fn return_order_status(
        &self,
        api_key: &str,
        order_number: Option<&str>,
    ) -> Result<OrderStatusResult, PoloniexFailure> {
        let order = self.get_order(api_key, order_number).await?;
        if order.order.status != OrderStatus::Opened {
            return Ok(OrderStatusResult::NotOpen { success: 0 });
        }
        let mut result = BTreeMap::new();
        result.insert(order.order.id.clone(), format_order_status(&order));
        Ok(OrderStatusResult::Open { result, success: 1 })
    }

    /// `buy` / `sell`.
    pub async fn send_order(
        &self,
        api_key: &str,
        direction: OrderDirection,
        currency_pair: Option<&str>,
        rate: Option<&str>,
        amount: Option<&str>,
        fill_or_kill: bool,
        immediate_or_cancel: bool,
        post_only: bool,
    ) -> Result<OrderPlaced, PoloniexFailure> {
        let number = self.get_number();
        let price = parse_decimal(rate, PoloniexError::InvalidRate)?;
        let amount = parse_decimal(amount, PoloniexError::InvalidAmount)?;
        let market = self
            .parse_currency_pair(currency_pair)
            .await?
            .ok_or(PoloniexError::InvalidCurrencyPair)?;

        if price * amount < PoloniexParams::min_trade_total() {
            return Err(PoloniexError::TotalTooSmall.into());
        }

        let (base_currency, market_currency) = split_currency_pair(&market);
        let funding_currency = match direction {
            OrderDirection::Buy => base_currency,
            OrderDirection::Sell => market_currency,
        };
        self.check_balance(api_key, amount, funding_currency).await?;

        let fee_currency = match direction {
            OrderDirection::Buy => market_currency,
            OrderDirection::Sell => base_currency,
        };
        self.executor
            .send_order(
                api_key,
                &number.to_string(),
                OrderDraft {
                    exchange_id: ExchangeId::Poloniex,
                    market: market.clone(),
                    direction,
                    order_type: Some(OrderType::from_flags(
                        fill_or_kill,
                        immediate_or_cancel,
                        post_only,
                    )),
                    price,
                    amount,
                    executed_amount: Decimal::ZERO,
                    average_price: Decimal::ZERO,
                    base_currency: base_currency.to_owned(),
                    market_currency: market_currency.to_owned(),
                    fee_currency: fee_currency.to_owned(),
                },
            )
            .await?;

        Ok(OrderPlaced {
            order_number: number,
            resulting_trades: None,
        })
    }

    /// `cancelOrder`.
    pub async fn cancel_order(
        &self,
        api_key: &str,
        order_number: Option<&str>,
    ) -> Result<OrderCanceled, PoloniexFailure> {
        let order = self.get_order(api_key, order_number).await?;
        if order.order.status != OrderStatus::Opened {
            return Err(PoloniexError::OrderNotFound.into());
        }

        let canceled = self
            .executor
            .cancel_order(api_key, &order.order.id)
            .await?
            .ok_or(PoloniexError::OrderNotFound)?;
        Ok(OrderCanceled {
            amount: Num(canceled.remaining_amount),
            message: format!("Order #{} canceled.", canceled.order.id),
            success: 1,
        })
    }

    /// `moveOrder` is not simulated.
    pub fn move_order(&self) -> Result<(), PoloniexFailure> {
        Err(PoloniexFailure::Unsupported("moveOrder"))
    }

    /// `withdraw`.
    pub async fn withdraw(
        &self,
        api_key: &str,
        currency: Option<&str>,
        amount: Option<&str>,
        address: Option<&str>,
        payment_id: Option<&str>,
    ) -> Result<WithdrawResponse, PoloniexFailure> {
        let currency = self.parse_currency(currency).await?;
        let amount = parse_decimal(amount, PoloniexError::InvalidAmount)?;
        self.check_balance(api_key, amount, &currency).await?;
        let address = parse_address(address, &currency)?.to_owned();

        self.executor
            .send_transaction(
                api_key,
                &self.get_number().to_string(),
                TransactionDraft {
                    kind: TransactionType::Withdrawal,
                    currency: currency.clone(),
                    amount,
                    address: Some(address),
                    fee: Decimal::ZERO,
                    payment_id: payment_id.map(str::to_owned),
                    status: None,
                    updated_at: None,
                },
            )
            .await?;
        Ok(WithdrawResponse {
            response: format!("Withdrew {amount} {currency}."),
        })
    }

    /// `returnFeeInfo`. All simulated fills are taker fills.
    pub fn return_fee_info(&self) -> FeeInfo {
        FeeInfo {
            maker_fee: Num(PoloniexParams::maker_fee_pct()),
            taker_fee: Num(PoloniexParams::taker_fee_pct()),
            thirty_day_volume: Num(Decimal::ZERO),
            next_tier: Num(Decimal::ZERO),
        }
    }

    /// `returnAvailableAccountBalances`. Only the exchange account exists.
    pub async fn return_available_account_balances(
        &self,
        api_key: &str,
        account: Option<&str>,
    ) -> Result<AvailableBalances, PoloniexFailure> {
        match account.filter(|account| !account.is_empty()) {
            Some("exchange") => Ok(AvailableBalances::Flat(self.return_balances(api_key).await?)),
            Some(_) => Err(PoloniexFailure::Unsupported("account")),
            None => {
                let mut by_account = BTreeMap::new();
                by_account.insert("exchange", self.return_balances(api_key).await?);
                Ok(AvailableBalances::ByAccount(by_account))
            }
        }
    }
}

fn group_by_market<T>(
    orders: &[ExtendedOrder],
    format: impl Fn(&ExtendedOrder) -> T,
) -> BTreeMap<String, Vec<T>> {
    let grouped = orders
        .iter()
        .sorted_unstable_by_key(|order| order.order.market.clone())
        .chunk_by(|order| order.order.market.clone());
    grouped
        .into_iter()
        .map(|(market, group)| (market, group.map(&format).collect()))
        .collect()
}
