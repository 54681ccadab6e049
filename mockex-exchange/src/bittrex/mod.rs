use crate::auth::verify_signature;
use crate::bittrex::proxy::{BittrexCurrency, BittrexMarket, BittrexProxy};
use crate::bittrex::response::{
    BittrexBalance, BittrexDeposit, BittrexHistoryOrder, BittrexOpenOrder, BittrexSingleOrder,
    BittrexWithdrawal, parse_address, parse_quantity, parse_rate, parse_uuid,
};
use fnv::FnvHashMap;
use mockex_core::Executor;
use mockex_core::schema::{
    AdapterLogic, ExchangeId, ExtendedOrder, Order, OrderDirection, OrderDraft, OrderStatus,
    TransactionDraft, TransactionType, quantize,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub mod error;
pub mod proxy;
pub mod response;

pub use error::{BittrexError, BittrexFailure};

/// Venue constants of the Bittrex v1.1 dialect.
pub struct BittrexParams;

impl BittrexParams {
    /// Trade fee: 0.25% of notional.
    pub fn trade_fee_pct() -> Decimal {
        Decimal::new(25, 4)
    }

    /// Dust threshold: 0.001 BTC minimum order value.
    pub fn min_trade_total() -> Decimal {
        Decimal::new(1, 3)
    }
}

/// Bittrex fee model, consulted by the engine on every order read.
///
/// Buys reserve the full notional in the base currency plus the projected fee;
/// sells reserve the sold quantity and charge the fee out of base proceeds. The fee
/// currency is the base currency either way.
#[derive(Debug)]
pub struct BittrexLogic;

impl AdapterLogic for BittrexLogic {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Bittrex
    }

    fn extend_order(&self, order: Order) -> ExtendedOrder {
        let total = order.total();
        let fee = quantize(total * BittrexParams::trade_fee_pct());
        let remaining_amount = order.amount - order.executed_amount;

        let (reserved, reserved_fee) = match order.direction {
            OrderDirection::Buy => {
                let reserved = quantize(order.amount * order.price);
                let reserved_fee = quantize(reserved * BittrexParams::trade_fee_pct());
                (reserved, reserved_fee)
            }
            OrderDirection::Sell => (order.amount, Decimal::ZERO),
        };

        ExtendedOrder {
            remaining_amount,
            total,
            fee,
            reserved,
            reserved_fee,
            order,
        }
    }
}

/// Successful order or withdrawal submission: the fresh identifier.
#[derive(Debug, Clone, Serialize)]
pub struct UuidResult {
    pub uuid: String,
}

/// Bittrex v1.1 adapter: authentication, parameter validation and response
/// formatting around the shared [`Executor`].
#[derive(Debug)]
pub struct BittrexApi {
    executor: Arc<Executor>,
    proxy: BittrexProxy,
}

impl BittrexApi {
    pub fn new(executor: Arc<Executor>, proxy: BittrexProxy) -> Self {
        executor.register_adapter(Arc::new(BittrexLogic));
        Self { executor, proxy }
    }

    pub fn proxy(&self) -> &BittrexProxy {
        &self.proxy
    }

    /// Authenticate a signed request. Bittrex signs the full request URL (query
    /// string included) with the user's secret, which equals the api key here.
    /// Returns the authenticated api key.
    pub fn authenticate(
        &self,
        url: &str,
        nonce: Option<&str>,
        api_key: Option<&str>,
        api_sign: Option<&str>,
    ) -> Result<String, BittrexError> {
        if nonce.is_none_or(str::is_empty) {
            return Err(BittrexError::NonceNotProvided);
        }
        let Some(api_key) = api_key.filter(|key| !key.is_empty()) else {
            return Err(BittrexError::ApikeyNotProvided);
        };
        let Some(api_sign) = api_sign.filter(|sign| !sign.is_empty()) else {
            return Err(BittrexError::ApisignNotProvided);
        };

        let api_secret = api_key;
        if !verify_signature(url, api_secret, api_sign) {
            return Err(BittrexError::InvalidSignature);
        }
        Ok(api_key.to_owned())
    }

    async fn markets(&self) -> Result<Arc<FnvHashMap<String, BittrexMarket>>, BittrexFailure> {
        Ok(self.proxy.markets().await?)
    }

    async fn currencies(
        &self,
    ) -> Result<Arc<FnvHashMap<String, BittrexCurrency>>, BittrexFailure> {
        Ok(self.proxy.currencies().await?)
    }

    async fn parse_market(
        &self,
        market: Option<&str>,
        optional: bool,
    ) -> Result<Option<String>, BittrexFailure> {
        let Some(market) = market.filter(|market| !market.is_empty()) else {
            if optional {
                return Ok(None);
            }
            return Err(BittrexError::MarketNotProvided.into());
        };
        if !self.markets().await?.contains_key(market) {
            return Err(BittrexError::InvalidMarket.into());
        }
        Ok(Some(market.to_owned()))
    }

    async fn parse_currency(
        &self,
        currency: Option<&str>,
        optional: bool,
    ) -> Result<Option<String>, BittrexFailure> {
        let Some(currency) = currency.filter(|currency| !currency.is_empty()) else {
            if optional {
                return Ok(None);
            }
            return Err(BittrexError::CurrencyNotProvided.into());
        };
        if !self.currencies().await?.contains_key(currency) {
            return Err(BittrexError::InvalidCurrency.into());
        }
        Ok(Some(currency.to_owned()))
    }

    async fn check_balance(
        &self,
        api_key: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<(), BittrexFailure> {
        let balance = self.executor.get_balance(api_key, currency).await?;
        if amount > balance.available {
            return Err(BittrexError::InsufficientFunds.into());
        }
        Ok(())
    }

    /// `buylimit` / `selllimit`.
    pub async fn send_order(
        &self,
        api_key: &str,
        direction: OrderDirection,
        market: Option<&str>,
        quantity: Option<&str>,
        rate: Option<&str>,
    ) -> Result<UuidResult, BittrexFailure> {
        let markets = self.markets().await?;
        let market = match market.filter(|market| !market.is_empty()) {
            Some(market) => market,
            None => return Err(BittrexError::MarketNotProvided.into()),
        };
        let Some(info) = markets.get(market) else {
            return Err(BittrexError::InvalidMarket.into());
        };
        let quantity = parse_quantity(quantity)?;
        let rate = parse_rate(rate)?;

        if quantity < info.min_trade_size {
            return Err(BittrexError::MinTradeRequirementNotMet.into());
        }
        if quantity * rate < BittrexParams::min_trade_total() {
            return Err(BittrexError::DustTradeDisallowed.into());
        }

        let funding_currency = match direction {
            OrderDirection::Buy => &info.base_currency,
            OrderDirection::Sell => &info.market_currency,
        };
        self.check_balance(api_key, quantity, funding_currency).await?;

        let uuid = Uuid::new_v4().to_string();
        self.executor
            .send_order(
                api_key,
                &uuid,
                OrderDraft {
                    exchange_id: ExchangeId::Bittrex,
                    market: market.to_owned(),
                    direction,
                    order_type: None,
                    price: rate,
                    amount: quantity,
                    executed_amount: Decimal::ZERO,
                    average_price: Decimal::ZERO,
                    base_currency: info.base_currency.clone(),
                    market_currency: info.market_currency.clone(),
                    fee_currency: info.base_currency.clone(),
                },
            )
            .await?;
        Ok(UuidResult { uuid })
    }

    /// `cancel`. Refuses unknown and already-closed orders before touching the
    /// engine; the result payload is empty.
    pub async fn cancel(&self, api_key: &str, uuid: Option<&str>) -> Result<(), BittrexFailure> {
        let uuid = parse_uuid(uuid)?;
        let Some(order) = self.executor.get_order(api_key, uuid).await? else {
            return Err(BittrexError::InvalidOrder.into());
        };
        if order.order.status != OrderStatus::Opened {
            return Err(BittrexError::OrderNotOpen.into());
        }
        self.executor.cancel_order(api_key, uuid).await?;
        Ok(())
    }

    /// `getopenorders`.
    pub async fn get_open_orders(
        &self,
        api_key: &str,
        market: Option<&str>,
    ) -> Result<Vec<BittrexOpenOrder>, BittrexFailure> {
        let market = self.parse_market(market, true).await?;
        let orders = self
            .executor
            .get_orders(api_key, Some(OrderStatus::Opened), market.as_deref())
            .await?;
        Ok(orders.iter().map(BittrexOpenOrder::from_order).collect())
    }

    /// `getbalances`.
    pub async fn get_balances(&self, api_key: &str) -> Result<Vec<BittrexBalance>, BittrexFailure> {
        let balances = self.executor.get_balances(api_key).await?;
        Ok(balances.iter().map(BittrexBalance::from_balance).collect())
    }

    /// `getbalance`.
    pub async fn get_balance(
        &self,
        api_key: &str,
        currency: Option<&str>,
    ) -> Result<BittrexBalance, BittrexFailure> {
        let currency = self
            .parse_currency(currency, false)
            .await?
            .unwrap_or_default();
        let balance = self.executor.get_balance(api_key, &currency).await?;
        Ok(BittrexBalance::from_balance(&balance))
    }

    /// `getdepositaddress`. Address generation is not simulated; the venue reports
    /// the address as still being generated.
    pub async fn get_deposit_address(
        &self,
        _api_key: &str,
        currency: Option<&str>,
    ) -> Result<BittrexBalance, BittrexFailure> {
        self.parse_currency(currency, false).await?;
        Err(BittrexError::AddressGenerating.into())
    }

    /// `withdraw`.
    pub async fn withdraw(
        &self,
        api_key: &str,
        currency: Option<&str>,
        quantity: Option<&str>,
        address: Option<&str>,
        payment_id: Option<&str>,
    ) -> Result<UuidResult, BittrexFailure> {
        let currency = self
            .parse_currency(currency, false)
            .await?
            .unwrap_or_default();
        let quantity = parse_quantity(quantity)?;
        let address = parse_address(address, &currency)?.to_owned();

        self.check_balance(api_key, quantity, &currency).await?;

        let tx_fee = self
            .currencies()
            .await?
            .get(&currency)
            .map(|info| info.tx_fee)
            .unwrap_or_default();

        let uuid = Uuid::new_v4().to_string();
        self.executor
            .send_transaction(
                api_key,
                &uuid,
                TransactionDraft {
                    kind: TransactionType::Withdrawal,
                    currency,
                    amount: quantity,
                    address: Some(address),
                    fee: tx_fee,
                    payment_id: payment_id.map(str::to_owned),
                    status: None,
                    updated_at: None,
                },
            )
            .await?;
        Ok(UuidResult { uuid })
    }

    /// `getorder`.
    pub async fn get_order(
        &self,
        api_key: &str,
        uuid: Option<&str>,
    ) -> Result<BittrexSingleOrder, BittrexFailure> {
        let uuid = parse_uuid(uuid)?;
        let Some(order) = self.executor.get_order(api_key, uuid).await? else {
            return Err(BittrexError::InvalidOrder.into());
        };
        Ok(BittrexSingleOrder::from_order(&order))
    }

    /// `getorderhistory`.
    pub async fn get_order_history(
        &self,
        api_key: &str,
        market: Option<&str>,
    ) -> Result<Vec<BittrexHistoryOrder>, BittrexFailure> {
        let market = self.parse_market(market, true).await?;
        let orders = self
            .executor
            .get_orders(api_key, Some(OrderStatus::Closed), market.as_deref())
            .await?;
        Ok(orders.iter().map(BittrexHistoryOrder::from_order).collect())
    }

    /// `getwithdrawalhistory`.
    pub async fn get_withdrawal_history(
        &self,
        api_key: &str,
        currency: Option<&str>,
    ) -> Result<Vec<BittrexWithdrawal>, BittrexFailure> {
        let currency = self.parse_currency(currency, true).await?;
        let transactions = self
            .executor
            .get_transactions(
                api_key,
                Some(TransactionType::Withdrawal),
                currency.as_deref(),
                None,
                None,
            )
            .await?;
        Ok(transactions
            .iter()
            .map(BittrexWithdrawal::from_transaction)
            .collect())
    }

    /// `getdeposithistory`.
    pub async fn get_deposit_history(
        &self,
        api_key: &str,
        currency: Option<&str>,
    ) -> Result<Vec<BittrexDeposit>, BittrexFailure> {
        let currency = self.parse_currency(currency, true).await?;
        let transactions = self
            .executor
            .get_transactions(
                api_key,
                Some(TransactionType::Deposit),
                currency.as_deref(),
                None,
                None,
            )
            .await?;
        Ok(transactions
            .iter()
            .map(BittrexDeposit::from_transaction)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign_message;
    use chrono::Utc;
    use mockex_core::Store;
    use mockex_core::executor::FixedRng;
    use rust_decimal_macros::dec;

    fn market_row() -> BittrexMarket {
        BittrexMarket {
            market_name: "BTC-XRP".to_owned(),
            base_currency: "BTC".to_owned(),
            market_currency: "XRP".to_owned(),
            min_trade_size: dec!(100),
        }
    }

    async fn api() -> BittrexApi {
        let executor = Arc::new(Executor::with_rng(
            Store::memory(),
            Box::new(FixedRng { roll: 0.0, exponential: 0.0 }),
        ));
        let proxy = BittrexProxy::new("http://127.0.0.1:9/");
        proxy.seed_markets(vec![market_row()]).await;
        proxy
            .seed_currencies(vec![BittrexCurrency {
                currency: "BTC".to_owned(),
                tx_fee: dec!(0.001),
            }])
            .await;
        BittrexApi::new(executor, proxy)
    }

    fn order(direction: OrderDirection, executed: Decimal, average: Decimal) -> Order {
        Order {
            id: "5".to_owned(),
            api_key: "test".to_owned(),
            exchange_id: ExchangeId::Bittrex,
            market: "BTC-XRP".to_owned(),
            direction,
            order_type: None,
            price: dec!(0.000001),
            amount: dec!(500),
            executed_amount: executed,
            average_price: average,
            base_currency: "BTC".to_owned(),
            market_currency: "XRP".to_owned(),
            fee_currency: "BTC".to_owned(),
            status: OrderStatus::Opened,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_extend_order_buy_reserves_notional_plus_fee() {
        let extended = BittrexLogic.extend_order(order(OrderDirection::Buy, dec!(0), dec!(0)));
        assert_eq!(extended.reserved, dec!(0.00050000));
        assert_eq!(extended.reserved_fee, dec!(0.00000125));
        assert_eq!(extended.fee, dec!(0));
        assert_eq!(extended.total, dec!(0));
        assert_eq!(extended.remaining_amount, dec!(500));
    }

    #[test]
    fn test_extend_order_partial_fill_accrues_fee() {
        let extended =
            BittrexLogic.extend_order(order(OrderDirection::Buy, dec!(200), dec!(0.000001)));
        assert_eq!(extended.total, dec!(0.00020000));
        assert_eq!(extended.fee, dec!(0.00000050));
        assert_eq!(extended.remaining_amount, dec!(300));
    }

    #[test]
    fn test_extend_order_sell_reserves_quantity() {
        let extended = BittrexLogic.extend_order(order(OrderDirection::Sell, dec!(0), dec!(0)));
        assert_eq!(extended.reserved, dec!(500));
        assert_eq!(extended.reserved_fee, dec!(0));
    }

    #[tokio::test]
    async fn test_authenticate_ladder() {
        let api = api().await;
        let url = "http://localhost/bittrex.com/api/v1.1/market/buylimit?nonce=1&apikey=1";

        assert_eq!(
            api.authenticate(url, None, None, None),
            Err(BittrexError::NonceNotProvided)
        );
        assert_eq!(
            api.authenticate(url, Some("1"), None, None),
            Err(BittrexError::ApikeyNotProvided)
        );
        assert_eq!(
            api.authenticate(url, Some("1"), Some("1"), None),
            Err(BittrexError::ApisignNotProvided)
        );
        assert_eq!(
            api.authenticate(url, Some("1"), Some("1"), Some("1")),
            Err(BittrexError::InvalidSignature)
        );

        let signature = sign_message(url, "1");
        assert_eq!(
            api.authenticate(url, Some("1"), Some("1"), Some(&signature)),
            Ok("1".to_owned())
        );
    }

    #[tokio::test]
    async fn test_send_order_validation_ladder() {
        struct TestCase {
            market: Option<&'static str>,
            quantity: Option<&'static str>,
            rate: Option<&'static str>,
            expected: BittrexError,
        }

        let tests = vec![
            TestCase {
                // TC0: no market parameter
                market: None,
                quantity: None,
                rate: None,
                expected: BittrexError::MarketNotProvided,
            },
            TestCase {
                // TC1: unknown market
                market: Some("AZAZA"),
                quantity: None,
                rate: None,
                expected: BittrexError::InvalidMarket,
            },
            TestCase {
                // TC2: no quantity
                market: Some("BTC-XRP"),
                quantity: None,
                rate: None,
                expected: BittrexError::QuantityNotProvided,
            },
            TestCase {
                // TC3: unparseable quantity
                market: Some("BTC-XRP"),
                quantity: Some("azaza"),
                rate: None,
                expected: BittrexError::QuantityInvalid,
            },
            TestCase {
                // TC4: no rate
                market: Some("BTC-XRP"),
                quantity: Some("1"),
                rate: None,
                expected: BittrexError::RateNotProvided,
            },
            TestCase {
                // TC5: unparseable rate
                market: Some("BTC-XRP"),
                quantity: Some("1"),
                rate: Some("azaza"),
                expected: BittrexError::RateInvalid,
            },
            TestCase {
                // TC6: below MinTradeSize
                market: Some("BTC-XRP"),
                quantity: Some("1"),
                rate: Some("0.000001"),
                expected: BittrexError::MinTradeRequirementNotMet,
            },
            TestCase {
                // TC7: dust order value
                market: Some("BTC-XRP"),
                quantity: Some("100"),
                rate: Some("0.000001"),
                expected: BittrexError::DustTradeDisallowed,
            },
            TestCase {
                // TC8: no funds on a fresh account
                market: Some("BTC-XRP"),
                quantity: Some("200"),
                rate: Some("0.00001"),
                expected: BittrexError::InsufficientFunds,
            },
        ];

        let api = api().await;
        for (index, test) in tests.into_iter().enumerate() {
            let outcome = api
                .send_order(
                    "test",
                    OrderDirection::Buy,
                    test.market,
                    test.quantity,
                    test.rate,
                )
                .await;
            match outcome {
                Err(BittrexFailure::Api(error)) => {
                    assert_eq!(error, test.expected, "TC{index} failed")
                }
                other => panic!("TC{index}: expected api error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_send_order_succeeds_with_funds() {
        let api = api().await;
        api.executor.deposit("test", "BTC", dec!(1000)).await.unwrap();

        let placed = api
            .send_order(
                "test",
                OrderDirection::Buy,
                Some("BTC-XRP"),
                Some("200"),
                Some("0.00001"),
            )
            .await
            .unwrap();

        let open = api.get_open_orders("test", None).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].order_uuid, placed.uuid);
    }

    #[tokio::test]
    async fn test_cancel_refuses_closed_orders() {
        let api = api().await;
        api.executor.deposit("test", "BTC", dec!(1000)).await.unwrap();

        let placed = api
            .send_order(
                "test",
                OrderDirection::Buy,
                Some("BTC-XRP"),
                Some("200"),
                Some("0.00001"),
            )
            .await
            .unwrap();

        api.cancel("test", Some(&placed.uuid)).await.unwrap();

        let outcome = api.cancel("test", Some(&placed.uuid)).await;
        match outcome {
            Err(BittrexFailure::Api(error)) => assert_eq!(error, BittrexError::OrderNotOpen),
            other => panic!("expected ORDER_NOT_OPEN, got {other:?}"),
        }

        let outcome = api
            .cancel("test", Some("7a9b6e3c-9c9d-4a9e-9f0a-1b2c3d4e5f60"))
            .await;
        match outcome {
            Err(BittrexFailure::Api(error)) => assert_eq!(error, BittrexError::InvalidOrder),
            other => panic!("expected INVALID_ORDER, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_deposit_address_always_generating() {
        let api = api().await;
        let outcome = api.get_deposit_address("test", Some("BTC")).await;
        match outcome {
            Err(BittrexFailure::Api(error)) => assert_eq!(error, BittrexError::AddressGenerating),
            other => panic!("expected ADDRESS_GENERATING, got {other:?}"),
        }
    }
}
