use crate::Num;
use crate::address::is_address_valid;
use crate::poloniex::PoloniexParams;
use crate::poloniex::error::PoloniexError;
use chrono::{DateTime, TimeZone, Utc};
use mockex_core::schema::{
    Balance, ExtendedOrder, Trade, Transaction, TransactionStatus, quantize,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

pub fn get_btc_market(currency: &str) -> String {
    format!("BTC_{currency}")
}

pub fn split_currency_pair(currency_pair: &str) -> (&str, &str) {
    currency_pair
        .split_once('_')
        .unwrap_or((currency_pair, ""))
}

/// Unix seconds, as Poloniex stamps transactions.
pub fn format_timestamp(value: DateTime<Utc>) -> i64 {
    value.timestamp()
}

/// `YYYY-MM-DD HH:MM:SS`, as Poloniex stamps order status and trades.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn provided(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

pub fn parse_timestamp(
    value: Option<&str>,
    on_invalid: PoloniexError,
) -> Result<DateTime<Utc>, PoloniexError> {
    let seconds: i64 = provided(value)
        .and_then(|value| value.parse().ok())
        .ok_or(on_invalid.clone())?;
    Utc.timestamp_opt(seconds, 0).single().ok_or(on_invalid)
}

/// Trade-history page size: out-of-range and unparseable values fall back to 500.
pub fn parse_limit(value: Option<&str>) -> usize {
    provided(value)
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|limit| (0..=10_000).contains(limit))
        .map(|limit| limit as usize)
        .unwrap_or(500)
}

pub fn parse_decimal(
    value: Option<&str>,
    on_invalid: PoloniexError,
) -> Result<Decimal, PoloniexError> {
    let value = provided(value).ok_or(PoloniexError::RequiredParameterMissing)?;
    Decimal::from_str(value).map_err(|_| on_invalid)
}

pub fn parse_address<'a>(
    address: Option<&'a str>,
    currency: &str,
) -> Result<&'a str, PoloniexError> {
    let address = provided(address).ok_or(PoloniexError::RequiredParameterMissing)?;
    if !is_address_valid(address, currency) {
        return Err(PoloniexError::InvalidAddress);
    }
    Ok(address)
}

/// Order and withdrawal numbers render as JSON numbers; identifiers minted by the
/// other venue stay strings.
fn numeric_id(id: &str) -> Value {
    id.parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_owned()))
}

/// `returnCompleteBalances` row.
#[derive(Debug, Clone, Serialize)]
pub struct PoloniexCompleteBalance {
    pub available: Num,
    #[serde(rename = "onOrders")]
    pub on_orders: Num,
    #[serde(rename = "btcValue")]
    pub btc_value: Num,
}

/// Value the holdings at the pair's last BTC price; unticked markets value at zero.
pub fn format_balance(balance: &Balance, last_price: Option<Decimal>) -> PoloniexCompleteBalance {
    let last_price = last_price.unwrap_or_default();
    PoloniexCompleteBalance {
        available: Num(balance.available),
        on_orders: Num(balance.frozen),
        btc_value: Num(quantize((balance.available + balance.frozen) * last_price)),
    }
}

/// `returnDepositsWithdrawals` deposit row.
#[derive(Debug, Clone, Serialize)]
pub struct PoloniexDeposit {
    pub currency: String,
    pub address: Option<String>,
    pub amount: Num,
    pub confirmations: u32,
    pub txid: Option<String>,
    pub timestamp: i64,
    pub status: String,
}

pub fn format_deposit(transaction: &Transaction) -> PoloniexDeposit {
    let status = match transaction.status {
        TransactionStatus::Confirmed => "COMPLETE".to_owned(),
        _ => String::new(),
    };
    PoloniexDeposit {
        currency: transaction.currency.clone(),
        address: transaction.address.clone(),
        amount: Num(transaction.amount),
        confirmations: transaction.confirmations.unwrap_or(0),
        txid: transaction.hash.clone(),
        timestamp: format_timestamp(transaction.created_at),
        status,
    }
}

/// `returnDepositsWithdrawals` withdrawal row.
#[derive(Debug, Clone, Serialize)]
pub struct PoloniexWithdrawal {
    #[serde(rename = "withdrawalNumber")]
    pub withdrawal_number: Value,
    pub currency: String,
    pub address: Option<String>,
    pub amount: Num,
    pub timestamp: i64,
    pub status: String,
    #[serde(rename = "ipAddress")]
    pub ip_address: Option<String>,
}

pub fn format_withdrawal(transaction: &Transaction) -> PoloniexWithdrawal {
    let status = match (&transaction.status, &transaction.hash) {
        (TransactionStatus::Confirmed, Some(hash)) => format!("COMPLETE: {hash}"),
        (TransactionStatus::Confirmed, None) => "COMPLETE".to_owned(),
        _ => String::new(),
    };
    PoloniexWithdrawal {
        withdrawal_number: numeric_id(&transaction.id),
        currency: transaction.currency.clone(),
        address: transaction.address.clone(),
        amount: Num(transaction.amount),
        timestamp: format_timestamp(transaction.created_at),
        status,
        ip_address: None,
    }
}

/// `returnOpenOrders` row.
#[derive(Debug, Clone, Serialize)]
pub struct PoloniexOrder {
    #[serde(rename = "orderNumber")]
    pub order_number: Value,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub rate: Num,
    pub amount: Num,
    pub total: Num,
}

pub fn format_order(order: &ExtendedOrder) -> PoloniexOrder {
    PoloniexOrder {
        order_number: numeric_id(&order.order.id),
        kind: order.order.direction.as_str(),
        rate: Num(order.order.price),
        amount: Num(order.order.amount),
        total: Num(order.total),
    }
}

/// `returnOrderStatus` payload (open orders only).
#[derive(Debug, Clone, Serialize)]
pub struct PoloniexOrderStatus {
    pub status: &'static str,
    pub rate: Num,
    pub amount: Num,
    #[serde(rename = "currencyPair")]
    pub currency_pair: String,
    pub date: String,
    pub total: Num,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "startingAmount")]
    pub starting_amount: Num,
}

pub fn format_order_status(order: &ExtendedOrder) -> PoloniexOrderStatus {
    let status = if order.order.executed_amount.is_zero() {
        "Open"
    } else {
        "Partially filled"
    };
    PoloniexOrderStatus {
        status,
        rate: Num(order.order.price),
        amount: Num(order.order.amount),
        currency_pair: order.order.market.clone(),
        date: format_datetime(order.order.created_at),
        total: Num(order.total),
        kind: order.order.direction.as_str(),
        starting_amount: Num(order.remaining_amount),
    }
}

/// `returnTradeHistory` / `returnOrderTrades` row.
#[derive(Debug, Clone, Serialize)]
pub struct PoloniexTrade {
    #[serde(rename = "globalTradeID")]
    pub global_trade_id: u64,
    #[serde(rename = "tradeID")]
    pub trade_id: u64,
    pub date: String,
    pub rate: Num,
    pub amount: Num,
    pub total: Num,
    pub fee: Num,
    #[serde(rename = "orderNumber")]
    pub order_number: Value,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub category: &'static str,
}

pub fn format_trade(trade: &Trade) -> PoloniexTrade {
    // Deterministic fold of the trade UUID into the venue's integer id spaces.
    let uuid_int = Uuid::parse_str(&trade.id)
        .map(|uuid| uuid.as_u128())
        .unwrap_or_default();
    PoloniexTrade {
        global_trade_id: (uuid_int % (1u128 << 32)) as u64,
        trade_id: (uuid_int % (1u128 << 20)) as u64,
        date: format_datetime(trade.created_at),
        rate: Num(trade.price),
        amount: Num(trade.amount),
        total: Num(quantize(trade.price * trade.amount)),
        fee: Num(PoloniexParams::taker_fee_pct()),
        order_number: numeric_id(&trade.order_number),
        kind: trade.direction.as_str(),
        category: "exchange",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockex_core::schema::OrderDirection;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_currency_pair() {
        assert_eq!(split_currency_pair("BTC_XRP"), ("BTC", "XRP"));
    }

    #[test]
    fn test_parse_limit_falls_back_to_default() {
        assert_eq!(parse_limit(None), 500);
        assert_eq!(parse_limit(Some("azaza")), 500);
        assert_eq!(parse_limit(Some("-1")), 500);
        assert_eq!(parse_limit(Some("10001")), 500);
        assert_eq!(parse_limit(Some("25")), 25);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp(None, PoloniexError::InvalidStart),
            Err(PoloniexError::InvalidStart)
        );
        assert_eq!(
            parse_timestamp(Some("azaza"), PoloniexError::InvalidEnd),
            Err(PoloniexError::InvalidEnd)
        );
        let parsed = parse_timestamp(Some("1543659000"), PoloniexError::InvalidStart).unwrap();
        assert_eq!(parsed.timestamp(), 1_543_659_000);
    }

    #[test]
    fn test_format_trade_folds_uuid() {
        let trade = Trade {
            id: Uuid::from_u128(5_000_000_000).to_string(),
            api_key: "test".to_owned(),
            order_number: "123456789".to_owned(),
            market: "BTC_XRP".to_owned(),
            direction: OrderDirection::Buy,
            price: dec!(0.000001),
            amount: dec!(100),
            created_at: Utc.with_ymd_and_hms(2018, 12, 1, 10, 11, 0).unwrap(),
        };

        let view = format_trade(&trade);
        assert_eq!(view.global_trade_id, 705_032_704);
        assert_eq!(view.trade_id, 389_632);
        assert_eq!(view.order_number, Value::from(123_456_789u64));
        assert_eq!(view.date, "2018-12-01 10:11:00");
        assert_eq!(view.total, Num(dec!(0.0001)));
        assert_eq!(view.kind, "buy");
    }
}
