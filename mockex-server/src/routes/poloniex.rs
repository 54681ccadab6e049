use crate::AppState;
use crate::routes::{param, passthrough, sanitized};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mockex_core::schema::OrderDirection;
use mockex_exchange::poloniex::{OrderPlaced, PoloniexError, PoloniexFailure};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::error;

/// Request bodies above this size are refused before form parsing.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/poloniex.com/public", get(public))
        .route(
            "/poloniex.com/tradingApi",
            post(trading_api).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}

async fn public(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let proxy = state.poloniex.proxy();
    match param(&params, "command") {
        Some("returnTicker") => passthrough(proxy.return_ticker().await),
        Some("return24hVolume") => passthrough(proxy.return_24h_volume().await),
        Some("returnOrderBook") => passthrough(
            proxy
                .return_order_book(param(&params, "currencyPair"), param(&params, "depth"))
                .await,
        ),
        Some("returnTradeHistory") => passthrough(
            proxy
                .return_trade_history(
                    param(&params, "currencyPair"),
                    param(&params, "start"),
                    param(&params, "end"),
                )
                .await,
        ),
        Some("returnChartData") => passthrough(
            proxy
                .return_chart_data(
                    param(&params, "currencyPair"),
                    param(&params, "start"),
                    param(&params, "end"),
                    param(&params, "period"),
                )
                .await,
        ),
        Some("returnCurrencies") => passthrough(proxy.return_currencies().await),
        Some("returnLoanOrders") => {
            passthrough(proxy.return_loan_orders(param(&params, "currency")).await)
        }
        _ => Json(json!({"error": PoloniexError::InvalidCommand.to_string()})).into_response(),
    }
}

async fn trading_api(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let form: BTreeMap<String, String> = serde_urlencoded::from_str(&body).unwrap_or_default();

    match run_command(&state, &headers, &body, &form).await {
        Ok(result) => Json(result).into_response(),
        Err(failure) => match failure.envelope_message() {
            Some(message) => {
                error!(
                    path = "/poloniex.com/tradingApi",
                    %message,
                    form = ?sanitized(&form),
                    "poloniex api error"
                );
                Json(json!({"error": message})).into_response()
            }
            None => {
                error!(path = "/poloniex.com/tradingApi", error = %failure, "poloniex internal error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    }
}

/// The authenticated pipeline: sweep, authenticate against the raw body,
/// dispatch on the `command` form field, sweep.
async fn run_command(
    state: &AppState,
    headers: &HeaderMap,
    body: &str,
    form: &BTreeMap<String, String>,
) -> Result<Value, PoloniexFailure> {
    state.executor.process().await.map_err(PoloniexFailure::from)?;

    let api_key = state.poloniex.authenticate(
        header(headers, "Key"),
        header(headers, "Sign"),
        param(form, "nonce"),
        body,
    )?;

    let api = &state.poloniex;
    let result = match param(form, "command") {
        Some("returnBalances") => encode(api.return_balances(&api_key).await)?,
        Some("returnCompleteBalances") => {
            encode(api.return_complete_balances(&api_key, param(form, "account")).await)?
        }
        Some("returnDepositAddresses") => encode(Ok(api.return_deposit_addresses()))?,
        Some("generateNewAddress") => {
            encode(api.generate_new_address(param(form, "currency")).await)?
        }
        Some("returnDepositsWithdrawals") => encode(
            api.return_deposits_withdrawals(&api_key, param(form, "start"), param(form, "end"))
                .await,
        )?,
        Some("returnOpenOrders") => {
            encode(api.return_open_orders(&api_key, param(form, "currencyPair")).await)?
        }
        Some("returnTradeHistory") => encode(
            api.return_account_trade_history(
                &api_key,
                param(form, "currencyPair"),
                param(form, "start"),
                param(form, "end"),
                param(form, "limit"),
            )
            .await,
        )?,
        Some("returnOrderTrades") => {
            encode(api.return_order_trades(&api_key, param(form, "orderNumber")).await)?
        }
        Some("returnOrderStatus") => {
            encode(api.return_order_status(&api_key, param(form, "orderNumber")).await)?
        }
        Some("buy") => encode(send_order(state, &api_key, OrderDirection::Buy, form).await)?,
        Some("sell") => encode(send_order(state, &api_key, OrderDirection::Sell, form).await)?,
        Some("cancelOrder") => {
            encode(api.cancel_order(&api_key, param(form, "orderNumber")).await)?
        }
        Some("moveOrder") => {
            api.move_order()?;
            Value::Null
        }
        Some("withdraw") => encode(
            api.withdraw(
                &api_key,
                param(form, "currency"),
                param(form, "amount"),
                param(form, "address"),
                param(form, "paymentId"),
            )
            .await,
        )?,
        Some("returnFeeInfo") => encode(Ok(api.return_fee_info()))?,
        Some("returnAvailableAccountBalances") => encode(
            api.return_available_account_balances(&api_key, param(form, "account"))
                .await,
        )?,
        _ => return Err(PoloniexError::InvalidCommand.into()),
    };

    state.executor.process().await.map_err(PoloniexFailure::from)?;
    Ok(result)
}

async fn send_order(
    state: &AppState,
    api_key: &str,
    direction: OrderDirection,
    form: &BTreeMap<String, String>,
) -> Result<OrderPlaced, PoloniexFailure> {
    state
        .poloniex
        .send_order(
            api_key,
            direction,
            param(form, "currencyPair"),
            param(form, "rate"),
            param(form, "amount"),
            flag(form, "fillOrKill"),
            flag(form, "immediateOrCancel"),
            flag(form, "postOnly"),
        )
        .await
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Form flags follow the venue's truthiness: any non-empty value counts as set.
fn flag(form: &BTreeMap<String, String>, name: &str) -> bool {
    param(form, name).is_some_and(|value| !value.is_empty())
}

fn encode<T: Serialize>(result: Result<T, PoloniexFailure>) -> Result<Value, PoloniexFailure> {
    result.map(|value| serde_json::to_value(value).unwrap_or(Value::Null))
}
