use crate::AppState;
use crate::routes::{param, passthrough, sanitized};
use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mockex_core::schema::OrderDirection;
use mockex_exchange::bittrex::{BittrexApi, BittrexFailure};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bittrex.com/api/v1.1/public/getmarkets", get(getmarkets))
        .route("/bittrex.com/api/v1.1/public/getcurrencies", get(getcurrencies))
        .route("/bittrex.com/api/v1.1/public/getticker", get(getticker))
        .route("/bittrex.com/api/v1.1/public/getmarketsummaries", get(getmarketsummaries))
        .route("/bittrex.com/api/v1.1/public/getorderbook", get(getorderbook))
        .route("/bittrex.com/api/v1.1/public/getmarketsummary", get(getmarketsummary))
        .route("/bittrex.com/api/v1.1/public/getmarkethistory", get(getmarkethistory))
        .route("/bittrex.com/api/v1.1/market/buylimit", get(buylimit))
        .route("/bittrex.com/api/v1.1/market/selllimit", get(selllimit))
        .route("/bittrex.com/api/v1.1/market/cancel", get(cancel))
        .route("/bittrex.com/api/v1.1/market/getopenorders", get(getopenorders))
        .route("/bittrex.com/api/v1.1/account/getbalances", get(getbalances))
        .route("/bittrex.com/api/v1.1/account/getbalance", get(getbalance))
        .route("/bittrex.com/api/v1.1/account/getdepositaddress", get(getdepositaddress))
        .route("/bittrex.com/api/v1.1/account/withdraw", get(withdraw))
        .route("/bittrex.com/api/v1.1/account/getorder", get(getorder))
        .route("/bittrex.com/api/v1.1/account/getorderhistory", get(getorderhistory))
        .route("/bittrex.com/api/v1.1/account/getwithdrawalhistory", get(getwithdrawalhistory))
        .route("/bittrex.com/api/v1.1/account/getdeposithistory", get(getdeposithistory))
}

/// Everything the signed-URL authentication and error logging need from the
/// incoming request.
struct ApiRequest {
    url: String,
    path: String,
    params: BTreeMap<String, String>,
    api_sign: Option<String>,
}

impl ApiRequest {
    fn extract(headers: &HeaderMap, uri: &Uri) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("localhost");
        Self {
            url: format!("http://{host}{uri}"),
            path: uri.path().to_owned(),
            params: uri
                .query()
                .and_then(|query| serde_urlencoded::from_str(query).ok())
                .unwrap_or_default(),
            api_sign: headers
                .get("apisign")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
        }
    }
}

/// The authenticated pipeline: sweep, authenticate, dispatch, sweep, envelope.
/// Business errors render as `{success: false, message, result: null}` with
/// HTTP 200; internal failures as bare 500s.
async fn dispatch<T, F, Fut>(state: AppState, request: ApiRequest, op: F) -> Response
where
    T: Serialize,
    F: FnOnce(Arc<BittrexApi>, String) -> Fut,
    Fut: Future<Output = Result<T, BittrexFailure>>,
{
    let outcome: Result<T, BittrexFailure> = async {
        state.executor.process().await.map_err(BittrexFailure::from)?;
        let api_key = state.bittrex.authenticate(
            &request.url,
            param(&request.params, "nonce"),
            param(&request.params, "apikey"),
            request.api_sign.as_deref(),
        )?;
        let result = op(Arc::clone(&state.bittrex), api_key).await?;
        state.executor.process().await.map_err(BittrexFailure::from)?;
        Ok(result)
    }
    .await;

    match outcome {
        Ok(result) => {
            Json(json!({"success": true, "message": "", "result": result})).into_response()
        }
        Err(failure) => match failure.envelope_message() {
            Some(message) => {
                error!(
                    path = %request.path,
                    %message,
                    params = ?sanitized(&request.params),
                    "bittrex api error"
                );
                Json(json!({"success": false, "message": message, "result": null})).into_response()
            }
            None => {
                error!(path = %request.path, error = %failure, "bittrex internal error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    }
}

async fn getmarkets(State(state): State<AppState>) -> Response {
    passthrough(state.bittrex.proxy().get_markets().await)
}

async fn getcurrencies(State(state): State<AppState>) -> Response {
    passthrough(state.bittrex.proxy().get_currencies().await)
}

async fn getticker(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    passthrough(state.bittrex.proxy().get_ticker(param(&params, "market")).await)
}

async fn getmarketsummaries(State(state): State<AppState>) -> Response {
    passthrough(state.bittrex.proxy().get_market_summaries().await)
}

async fn getorderbook(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    passthrough(
        state
            .bittrex
            .proxy()
            .get_order_book(param(&params, "market"), param(&params, "type"))
            .await,
    )
}

async fn getmarketsummary(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    passthrough(
        state
            .bittrex
            .proxy()
            .get_market_summary(param(&params, "market"))
            .await,
    )
}

async fn getmarkethistory(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    passthrough(
        state
            .bittrex
            .proxy()
            .get_market_history(param(&params, "market"))
            .await,
    )
}

async fn buylimit(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    limit_order(state, &headers, &uri, OrderDirection::Buy).await
}

async fn selllimit(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    limit_order(state, &headers, &uri, OrderDirection::Sell).await
}

async fn limit_order(
    state: AppState,
    headers: &HeaderMap,
    uri: &Uri,
    direction: OrderDirection,
) -> Response {
    let request = ApiRequest::extract(headers, uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.send_order(
            &api_key,
            direction,
            param(&params, "market"),
            param(&params, "quantity"),
            param(&params, "rate"),
        )
        .await
    })
    .await
}

async fn cancel(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.cancel(&api_key, param(&params, "uuid")).await
    })
    .await
}

async fn getopenorders(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_open_orders(&api_key, param(&params, "market")).await
    })
    .await
}

async fn getbalances(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    dispatch(state, request, move |api, api_key| async move {
        api.get_balances(&api_key).await
    })
    .await
}

async fn getbalance(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_balance(&api_key, param(&params, "currency")).await
    })
    .await
}

async fn getdepositaddress(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_deposit_address(&api_key, param(&params, "currency")).await
    })
    .await
}

async fn withdraw(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.withdraw(
            &api_key,
            param(&params, "currency"),
            param(&params, "quantity"),
            param(&params, "address"),
            param(&params, "paymentid"),
        )
        .await
    })
    .await
}

async fn getorder(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_order(&api_key, param(&params, "uuid")).await
    })
    .await
}

async fn getorderhistory(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_order_history(&api_key, param(&params, "market")).await
    })
    .await
}

async fn getwithdrawalhistory(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_withdrawal_history(&api_key, param(&params, "currency")).await
    })
    .await
}

async fn getdeposithistory(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let request = ApiRequest::extract(&headers, &uri);
    let params = request.params.clone();
    dispatch(state, request, move |api, api_key| async move {
        api.get_deposit_history(&api_key, param(&params, "currency")).await
    })
    .await
}
