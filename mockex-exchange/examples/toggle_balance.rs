use chrono::Utc;
use mockex_exchange::auth::sign_message;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

const BASE_URL: &str = "http://127.0.0.1:8008";
const API_KEY: &str = "poloniex_api_key";
const CURRENCY: &str = "BTC";
const MIN_AMOUNT: &str = "100.5";
const ADDRESS: &str = "1Nh7uHdvY6fNwtQtM1G5EZAFPLC33B59rB";

/// Minimal signed Poloniex trading client pointed at a local mockex server.
struct PoloniexClient {
    http: reqwest::Client,
    last_nonce: i64,
}

impl PoloniexClient {
    fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            last_nonce: 0,
        }
    }

    fn next_nonce(&mut self) -> i64 {
        let mut nonce = Utc::now().timestamp_millis();
        if nonce <= self.last_nonce {
            nonce = self.last_nonce + 1;
        }
        self.last_nonce = nonce;
        nonce
    }

    async fn command(&mut self, command: &str, params: &[(&str, &str)]) -> Value {
        let mut body = format!("command={command}&nonce={}", self.next_nonce());
        for (name, value) in params {
            body.push_str(&format!("&{name}={value}"));
        }

        let response = self
            .http
            .post(format!("{BASE_URL}/poloniex.com/tradingApi"))
            .header("Key", API_KEY)
            .header("Sign", sign_message(&body, API_KEY))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .unwrap();

        let payload: Value = response.json().await.unwrap();
        if let Some(error) = payload.get("error") {
            panic!("poloniex error: {error}");
        }
        payload
    }
}

async fn make_deposit(http: &reqwest::Client, amount: Decimal) {
    println!("depositing {amount} {CURRENCY} on {API_KEY}");
    http.post(format!("{BASE_URL}/deposit"))
        .form(&[
            ("api_key", API_KEY),
            ("currency", CURRENCY),
            ("amount", &amount.to_string()),
        ])
        .send()
        .await
        .unwrap();
}

async fn balance_of(client: &mut PoloniexClient) -> Decimal {
    let balances = client.command("returnBalances", &[]).await;
    balances
        .get(CURRENCY)
        .map(|value| Decimal::from_str(&value.to_string()).unwrap())
        .unwrap_or_default()
}

/// Tops the account up through the faucet when it runs low, withdraws everything
/// otherwise, then prints the transaction history - exercising deposits,
/// withdrawals and signed authentication against a running server.
#[tokio::main]
async fn main() {
    let mut client = PoloniexClient::new();

    let balance = balance_of(&mut client).await;
    println!("{API_KEY} holds {balance} {CURRENCY}");

    let min_amount = Decimal::from_str(MIN_AMOUNT).unwrap();
    if balance < min_amount {
        make_deposit(&reqwest::Client::new(), min_amount - balance).await;
    } else {
        let withdrawn = client
            .command(
                "withdraw",
                &[
                    ("currency", CURRENCY),
                    ("amount", &balance.to_string()),
                    ("address", ADDRESS),
                ],
            )
            .await;
        println!("{withdrawn}");
    }

    println!("{API_KEY} now holds {} {CURRENCY}", balance_of(&mut client).await);

    let end = Utc::now().timestamp().to_string();
    let transactions = client
        .command("returnDepositsWithdrawals", &[("start", "0"), ("end", &end)])
        .await;
    println!("{transactions}");
}
