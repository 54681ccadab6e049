use crate::Num;
use crate::address::is_address_valid;
use crate::bittrex::error::BittrexError;
use chrono::{DateTime, Utc};
use mockex_core::schema::{
    Balance, ExtendedOrder, OrderDirection, OrderStatus, Transaction, TransactionStatus,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// `YYYY-MM-DDTHH:MM:SS.fff` - millisecond-truncated UTC, as Bittrex renders it.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

fn order_type_label(direction: OrderDirection) -> &'static str {
    match direction {
        OrderDirection::Buy => "BUY_LIMIT",
        OrderDirection::Sell => "SELL_LIMIT",
    }
}

fn closed_stamp(order: &ExtendedOrder) -> Option<String> {
    (order.order.status == OrderStatus::Closed)
        .then(|| format_datetime(order.order.updated_at.unwrap_or(order.order.created_at)))
}

fn price_per_unit(order: &ExtendedOrder) -> Option<Num> {
    (!order.order.average_price.is_zero()).then(|| Num(order.order.average_price))
}

fn provided(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

pub fn parse_quantity(quantity: Option<&str>) -> Result<Decimal, BittrexError> {
    let quantity = provided(quantity).ok_or(BittrexError::QuantityNotProvided)?;
    Decimal::from_str(quantity).map_err(|_| BittrexError::QuantityInvalid)
}

pub fn parse_rate(rate: Option<&str>) -> Result<Decimal, BittrexError> {
    let rate = provided(rate).ok_or(BittrexError::RateNotProvided)?;
    Decimal::from_str(rate).map_err(|_| BittrexError::RateInvalid)
}

pub fn parse_uuid(uuid: Option<&str>) -> Result<&str, BittrexError> {
    let uuid = provided(uuid).ok_or(BittrexError::UuidNotProvided)?;
    Uuid::parse_str(uuid).map_err(|_| BittrexError::UuidInvalid)?;
    Ok(uuid)
}

pub fn parse_address<'a>(address: Option<&'a str>, currency: &str) -> Result<&'a str, BittrexError> {
    let address = provided(address).ok_or(BittrexError::AddressNotProvided)?;
    if !is_address_valid(address, currency) {
        return Err(BittrexError::AddressInvalid);
    }
    Ok(address)
}

/// `getopenorders` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BittrexOpenOrder {
    pub cancel_initiated: bool,
    pub closed: Option<String>,
    pub commission_paid: Num,
    pub condition: &'static str,
    pub condition_target: Option<String>,
    pub exchange: String,
    pub immediate_or_cancel: bool,
    pub is_conditional: bool,
    pub limit: Num,
    pub opened: String,
    pub order_type: &'static str,
    pub order_uuid: String,
    pub price: Num,
    pub price_per_unit: Option<Num>,
    pub quantity: Num,
    pub quantity_remaining: Num,
    pub uuid: Option<String>,
}

impl BittrexOpenOrder {
    pub fn from_order(order: &ExtendedOrder) -> Self {
        Self {
            cancel_initiated: false,
            closed: closed_stamp(order),
            commission_paid: Num(order.fee),
            condition: "NONE",
            condition_target: None,
            exchange: order.order.market.clone(),
            immediate_or_cancel: false,
            is_conditional: false,
            limit: Num(order.order.price),
            opened: format_datetime(order.order.created_at),
            order_type: order_type_label(order.order.direction),
            order_uuid: order.order.id.clone(),
            price: Num(order.order.price),
            price_per_unit: price_per_unit(order),
            quantity: Num(order.order.amount),
            quantity_remaining: Num(order.remaining_amount),
            uuid: None,
        }
    }
}

/// `getorderhistory` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BittrexHistoryOrder {
    pub closed: Option<String>,
    pub commission: Num,
    pub condition: &'static str,
    pub condition_target: Option<String>,
    pub exchange: String,
    pub immediate_or_cancel: bool,
    pub is_conditional: bool,
    pub limit: Num,
    pub order_type: &'static str,
    pub order_uuid: String,
    pub price: Num,
    pub price_per_unit: Option<Num>,
    pub quantity: Num,
    pub quantity_remaining: Num,
    pub time_stamp: String,
}

impl BittrexHistoryOrder {
    pub fn from_order(order: &ExtendedOrder) -> Self {
        Self {
            closed: closed_stamp(order),
            commission: Num(order.fee),
            condition: "NONE",
            condition_target: None,
            exchange: order.order.market.clone(),
            immediate_or_cancel: false,
            is_conditional: false,
            limit: Num(order.order.price),
            order_type: order_type_label(order.order.direction),
            order_uuid: order.order.id.clone(),
            price: Num(order.order.price),
            price_per_unit: price_per_unit(order),
            quantity: Num(order.order.amount),
            quantity_remaining: Num(order.remaining_amount),
            time_stamp: format_datetime(order.order.created_at),
        }
    }
}

/// `getorder` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BittrexSingleOrder {
    pub account_id: Option<String>,
    pub cancel_initiated: bool,
    pub closed: Option<String>,
    pub commission_paid: Num,
    pub commission_reserve_remaining: Num,
    pub commission_reserved: Num,
    pub condition: &'static str,
    pub condition_target: Option<String>,
    pub exchange: String,
    pub immediate_or_cancel: bool,
    pub is_conditional: bool,
    pub is_open: bool,
    pub limit: Num,
    pub opened: String,
    pub order_uuid: String,
    pub price: Num,
    pub price_per_unit: Option<Num>,
    pub quantity: Num,
    pub quantity_remaining: Num,
    pub reserve_remaining: Num,
    pub reserved: Num,
    pub sentinel: Option<String>,
    #[serde(rename = "Type")]
    pub kind: &'static str,
}

impl BittrexSingleOrder {
    pub fn from_order(order: &ExtendedOrder) -> Self {
        Self {
            account_id: None,
            cancel_initiated: false,
            closed: closed_stamp(order),
            commission_paid: Num(order.fee),
            commission_reserve_remaining: Num(Decimal::ZERO.max(order.reserved_fee - order.fee)),
            commission_reserved: Num(order.reserved_fee),
            condition: "NONE",
            condition_target: None,
            exchange: order.order.market.clone(),
            immediate_or_cancel: false,
            is_conditional: false,
            is_open: order.order.status != OrderStatus::Closed,
            limit: Num(order.order.price),
            opened: format_datetime(order.order.created_at),
            order_uuid: order.order.id.clone(),
            price: Num(order.order.price),
            price_per_unit: price_per_unit(order),
            quantity: Num(order.order.amount),
            quantity_remaining: Num(order.remaining_amount),
            reserve_remaining: Num(order.reserved - order.total),
            reserved: Num(order.reserved),
            sentinel: None,
            kind: order_type_label(order.order.direction),
        }
    }
}

/// `getbalance(s)` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BittrexBalance {
    pub currency: String,
    pub balance: Num,
    pub available: Num,
    pub pending: Num,
    pub crypto_address: Option<String>,
}

impl BittrexBalance {
    pub fn from_balance(balance: &Balance) -> Self {
        Self {
            currency: balance.currency.clone(),
            balance: Num(balance.total()),
            available: Num(balance.available),
            pending: Num(balance.pending),
            crypto_address: None,
        }
    }
}

/// `getdeposithistory` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BittrexDeposit {
    pub amount: Num,
    pub confirmations: u32,
    pub crypto_address: Option<String>,
    pub currency: String,
    pub id: String,
    pub last_updated: String,
    pub tx_id: Option<String>,
}

impl BittrexDeposit {
    pub fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            amount: Num(transaction.amount),
            confirmations: transaction.confirmations.unwrap_or(0),
            crypto_address: transaction.address.clone(),
            currency: transaction.currency.clone(),
            id: transaction.id.clone(),
            last_updated: format_datetime(
                transaction.updated_at.unwrap_or(transaction.created_at),
            ),
            tx_id: transaction.hash.clone(),
        }
    }
}

/// `getwithdrawalhistory` row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BittrexWithdrawal {
    pub address: Option<String>,
    pub amount: Num,
    pub authorized: bool,
    pub canceled: bool,
    pub currency: String,
    pub invalid_address: bool,
    pub opened: String,
    pub payment_uuid: String,
    pub pending_payment: bool,
    pub tx_cost: Num,
    pub tx_id: Option<String>,
}

impl BittrexWithdrawal {
    pub fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            address: transaction.address.clone(),
            amount: Num(transaction.amount),
            authorized: !matches!(
                transaction.status,
                TransactionStatus::NonAuthorized | TransactionStatus::Canceled
            ),
            canceled: transaction.status == TransactionStatus::Canceled,
            currency: transaction.currency.clone(),
            invalid_address: false,
            opened: format_datetime(transaction.created_at),
            payment_uuid: transaction.id.clone(),
            pending_payment: transaction.status == TransactionStatus::Pending,
            tx_cost: Num(transaction.fee),
            tx_id: transaction.hash.clone(),
        }
    }
}
