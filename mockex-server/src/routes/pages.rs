use crate::AppState;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Form;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::error;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(documentation))
        .route("/deposit", get(deposit_form).post(deposit_submit))
}

const DOCUMENTATION: &str = r#"<!DOCTYPE html>
<html>
<head><title>mockex</title></head>
<body>
<h1>mockex</h1>
<p>Simulated Bittrex v1.1 and Poloniex v1.0 backend for integration-testing
trading bots. Point your bot at this host, fund an account on the
<a href="/deposit">deposit faucet</a>, and trade: balances, orders and trades
behave like the real venues, with open orders filled stochastically over time.</p>

<h2>Authentication</h2>
<p>Any api key works; the signing secret equals the key itself. Bittrex requests
sign the full request URL (HMAC-SHA512 hex in the <code>apisign</code> header,
with <code>apikey</code> and <code>nonce</code> query parameters). Poloniex
requests sign the urlencoded POST body (<code>Key</code> / <code>Sign</code>
headers, strictly increasing integer <code>nonce</code> in the body).</p>

<h2>Endpoints</h2>
<ul>
<li><code>GET /bittrex.com/api/v1.1/public/*</code> - proxied market data
(getmarkets, getcurrencies, getticker, getmarketsummaries, getorderbook,
getmarketsummary, getmarkethistory)</li>
<li><code>GET /bittrex.com/api/v1.1/market/*</code> - buylimit, selllimit,
cancel, getopenorders</li>
<li><code>GET /bittrex.com/api/v1.1/account/*</code> - getbalances, getbalance,
getdepositaddress, withdraw, getorder, getorderhistory, getwithdrawalhistory,
getdeposithistory</li>
<li><code>GET /poloniex.com/public?command=...</code> - proxied market data</li>
<li><code>POST /poloniex.com/tradingApi</code> - trading commands</li>
<li><code>GET/POST /deposit</code> - test faucet</li>
</ul>
</body>
</html>
"#;

async fn documentation() -> Html<&'static str> {
    Html(DOCUMENTATION)
}

#[derive(Debug, Deserialize)]
struct DepositForm {
    api_key: String,
    currency: String,
    amount: String,
}

/// The flash message carries submitted form values, so it must never reach the
/// page unescaped.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn deposit_page(flash: Option<&str>) -> Html<String> {
    let flash = flash
        .map(|message| format!("<p><em>{}</em></p>", escape_html(message)))
        .unwrap_or_default();
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>mockex deposit</title></head>
<body>
<h1>Deposit</h1>
{flash}
<form method="post" action="/deposit">
<label>API Key <input name="api_key" value="qwerty"></label><br>
<label>Amount <input name="amount" value="1"></label><br>
<label>Currency <input name="currency" value="BTC"></label><br>
<button type="submit">Deposit</button>
</form>
<p><a href="/">Back to documentation</a></p>
</body>
</html>
"#
    ))
}

async fn deposit_form() -> Html<String> {
    deposit_page(None)
}

async fn deposit_submit(
    State(state): State<AppState>,
    Form(form): Form<DepositForm>,
) -> Response {
    let Ok(amount) = Decimal::from_str(&form.amount) else {
        return deposit_page(Some("Amount must be a decimal number")).into_response();
    };

    match state.executor.deposit(&form.api_key, &form.currency, amount).await {
        Ok(_) => deposit_page(Some(&format!(
            "{amount} {} deposited on {}",
            form.currency, form.api_key
        )))
        .into_response(),
        Err(failure) => {
            error!(error = %failure, "faucet deposit failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
