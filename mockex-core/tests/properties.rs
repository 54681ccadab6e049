use mockex_core::executor::FixedRng;
use mockex_core::schema::{
    AdapterLogic, ExchangeId, ExtendedOrder, Order, OrderDirection, OrderDraft, OrderStatus,
    TransactionDraft, TransactionType, quantize,
};
use mockex_core::{Executor, Store};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;

const API_KEY: &str = "prop";
const BASE: &str = "BTC";
const MARKET_CURRENCY: &str = "XRP";

/// Fee-free venue logic: reservations move funds between ledger buckets without
/// charging anything, which keeps the conservation bookkeeping exact.
#[derive(Debug)]
struct FeeFreeLogic;

impl AdapterLogic for FeeFreeLogic {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Bittrex
    }

    fn extend_order(&self, order: Order) -> ExtendedOrder {
        let total = order.total();
        let remaining_amount = order.amount - order.executed_amount;
        let reserved = match order.direction {
            OrderDirection::Buy => quantize(order.amount * order.price),
            OrderDirection::Sell => order.amount,
        };
        ExtendedOrder {
            remaining_amount,
            total,
            fee: Decimal::ZERO,
            reserved,
            reserved_fee: Decimal::ZERO,
            order,
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Deposit { currency: usize, amount: u32 },
    Withdraw { currency: usize, amount: u32 },
    Place { direction: OrderDirection, amount: u32, price_milli: u32 },
    Fill { seed: usize, percent: u32 },
    Cancel { seed: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..2, 1u32..=1000).prop_map(|(currency, amount)| Op::Deposit { currency, amount }),
        (0usize..2, 1u32..=100).prop_map(|(currency, amount)| Op::Withdraw { currency, amount }),
        (any::<bool>(), 1u32..=100, 1u32..=1000).prop_map(|(buy, amount, price_milli)| Op::Place {
            direction: if buy { OrderDirection::Buy } else { OrderDirection::Sell },
            amount,
            price_milli,
        }),
        (any::<usize>(), 1u32..=100).prop_map(|(seed, percent)| Op::Fill { seed, percent }),
        any::<usize>().prop_map(|seed| Op::Cancel { seed }),
    ]
}

fn currency_name(index: usize) -> &'static str {
    [BASE, MARKET_CURRENCY][index]
}

fn order_draft(direction: OrderDirection, amount: u32, price_milli: u32) -> OrderDraft {
    OrderDraft {
        exchange_id: ExchangeId::Bittrex,
        market: "BTC_XRP".to_owned(),
        direction,
        order_type: None,
        price: Decimal::from(price_milli) / dec!(1000),
        amount: Decimal::from(amount),
        executed_amount: Decimal::ZERO,
        average_price: Decimal::ZERO,
        base_currency: BASE.to_owned(),
        market_currency: MARKET_CURRENCY.to_owned(),
        fee_currency: BASE.to_owned(),
    }
}

async fn run_ops(ops: Vec<Op>) {
    // roll = 0.0 keeps the processing sweep's own fills switched off, so the only
    // execution steps are the explicit, pinned ones below.
    let executor = Executor::with_rng(
        Store::memory(),
        Box::new(FixedRng { roll: 0.0, exponential: 0.0 }),
    );
    executor.register_adapter(Arc::new(FeeFreeLogic));

    let mut next_number = 0u64;
    for op in ops {
        match op {
            Op::Deposit { currency, amount } => {
                executor
                    .deposit(API_KEY, currency_name(currency), Decimal::from(amount))
                    .await
                    .unwrap();
            }
            Op::Withdraw { currency, amount } => {
                next_number += 1;
                executor
                    .send_transaction(
                        API_KEY,
                        &format!("w{next_number}"),
                        TransactionDraft {
                            kind: TransactionType::Withdrawal,
                            currency: currency_name(currency).to_owned(),
                            amount: Decimal::from(amount),
                            address: None,
                            fee: Decimal::ZERO,
                            payment_id: None,
                            status: None,
                            updated_at: None,
                        },
                    )
                    .await
                    .unwrap();
            }
            Op::Place { direction, amount, price_milli } => {
                next_number += 1;
                executor
                    .send_order(
                        API_KEY,
                        &format!("o{next_number}"),
                        order_draft(direction, amount, price_milli),
                    )
                    .await
                    .unwrap();
            }
            Op::Fill { seed, percent } => {
                let opened = executor
                    .get_orders(API_KEY, Some(OrderStatus::Opened), None)
                    .await
                    .unwrap();
                if opened.is_empty() {
                    continue;
                }
                let target = &opened[seed % opened.len()];
                let amount = quantize(target.remaining_amount * Decimal::from(percent) / dec!(100));
                if amount.is_zero() {
                    continue;
                }
                executor
                    .execute_order(target.order.clone(), 0.0, Some(amount))
                    .await
                    .unwrap();
            }
            Op::Cancel { seed } => {
                let opened = executor
                    .get_orders(API_KEY, Some(OrderStatus::Opened), None)
                    .await
                    .unwrap();
                if opened.is_empty() {
                    continue;
                }
                let target = &opened[seed % opened.len()];
                executor.cancel_order(API_KEY, &target.order.id).await.unwrap();
            }
        }
    }

    // Confirm every in-flight withdrawal, then settle every remaining order.
    executor.process().await.unwrap();
    for opened in executor
        .get_orders(API_KEY, Some(OrderStatus::Opened), None)
        .await
        .unwrap()
    {
        executor.cancel_order(API_KEY, &opened.order.id).await.unwrap();
    }

    // Expected ledger totals from the persisted history alone.
    let mut expected: BTreeMap<&str, Decimal> = BTreeMap::new();
    for transaction in executor
        .get_transactions(API_KEY, None, None, None, None)
        .await
        .unwrap()
    {
        let currency = if transaction.currency == BASE { BASE } else { MARKET_CURRENCY };
        *expected.entry(currency).or_default() +=
            Decimal::from(transaction.kind.sign()) * transaction.amount;
    }

    let orders = executor.get_orders(API_KEY, None, None).await.unwrap();
    let trades = executor
        .get_trades(API_KEY, None, None, None, None, None)
        .await
        .unwrap();

    for extended in &orders {
        let order = &extended.order;
        assert_eq!(order.status, OrderStatus::Closed);
        assert!(order.executed_amount <= order.amount);

        let fill_sum: Decimal = trades
            .iter()
            .filter(|trade| trade.order_number == order.id)
            .map(|trade| trade.amount)
            .sum();
        assert_eq!(fill_sum, order.executed_amount, "order {} fill sum", order.id);

        let sign = Decimal::from(order.direction.sign());
        *expected.entry(MARKET_CURRENCY).or_default() += sign * order.executed_amount;
        *expected.entry(BASE).or_default() -= sign * extended.total;
    }

    for currency in [BASE, MARKET_CURRENCY] {
        let balance = executor.get_balance(API_KEY, currency).await.unwrap();
        let total = balance.available + balance.frozen + balance.pending;
        let expected = expected.get(currency).copied().unwrap_or_default();
        assert_eq!(total, expected, "{currency} conservation");
        assert_eq!(balance.frozen, Decimal::ZERO, "{currency} frozen released");
        assert_eq!(balance.pending, Decimal::ZERO, "{currency} pending drained");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Double-entry conservation: whatever interleaving of deposits, withdrawals,
    /// placements, fills and cancels runs, the ledger total of each currency equals
    /// the net of its confirmed transactions plus realised trade flows, and every
    /// closed order's trades sum to its executed amount.
    #[test]
    fn prop_balances_conserve(ops in proptest::collection::vec(op_strategy(), 1..25)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_ops(ops));
    }
}
