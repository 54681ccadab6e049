use crate::proxy::{
    MethodCache, ReferenceCache, UpstreamError, UpstreamReply, cache_key, fetch_raw,
};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://poloniex.com/public";

/// Upstream ticker row - trading only consumes the last price.
#[derive(Debug, Clone, Deserialize)]
pub struct PoloniexTicker {
    pub last: Decimal,
}

/// TTL-cached pass-through over the real Poloniex public API. All commands share
/// one URL, dispatched by the `command` query parameter.
#[derive(Debug)]
pub struct PoloniexProxy {
    client: reqwest::Client,
    base_url: String,
    ticker_raw: MethodCache,
    volume_raw: MethodCache,
    order_book: MethodCache,
    trade_history: MethodCache,
    chart_data: MethodCache,
    currencies_raw: MethodCache,
    loan_orders: MethodCache,
    tickers: ReferenceCache<FnvHashMap<String, PoloniexTicker>>,
    currencies: ReferenceCache<FnvHashMap<String, Value>>,
}

impl PoloniexProxy {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            ticker_raw: MethodCache::new(Duration::from_secs(5)),
            volume_raw: MethodCache::new(Duration::from_secs(3600)),
            order_book: MethodCache::new(Duration::from_secs(5)),
            trade_history: MethodCache::new(Duration::from_secs(5)),
            chart_data: MethodCache::new(Duration::from_secs(60)),
            currencies_raw: MethodCache::new(Duration::from_secs(3600)),
            loan_orders: MethodCache::new(Duration::from_secs(60)),
            tickers: ReferenceCache::new(Duration::from_secs(60)),
            currencies: ReferenceCache::new(Duration::from_secs(3600)),
        }
    }

    async fn passthrough(
        &self,
        cache: &MethodCache,
        command: &str,
        params: &[(&str, Option<&str>)],
    ) -> Result<UpstreamReply, UpstreamError> {
        let mut query: Vec<(&str, Option<&str>)> = vec![("command", Some(command))];
        query.extend_from_slice(params);
        cache
            .fetch(cache_key(&query), fetch_raw(&self.client, &self.base_url, &query))
            .await
    }

    pub async fn return_ticker(&self) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.ticker_raw, "returnTicker", &[]).await
    }

    pub async fn return_24h_volume(&self) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.volume_raw, "return24hVolume", &[]).await
    }

    pub async fn return_order_book(
        &self,
        currency_pair: Option<&str>,
        depth: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(
            &self.order_book,
            "returnOrderBook",
            &[("currencyPair", currency_pair), ("depth", depth)],
        )
        .await
    }

    pub async fn return_trade_history(
        &self,
        currency_pair: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(
            &self.trade_history,
            "returnTradeHistory",
            &[("currencyPair", currency_pair), ("start", start), ("end", end)],
        )
        .await
    }

    pub async fn return_chart_data(
        &self,
        currency_pair: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        period: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(
            &self.chart_data,
            "returnChartData",
            &[
                ("currencyPair", currency_pair),
                ("start", start),
                ("end", end),
                ("period", period),
            ],
        )
        .await
    }

    pub async fn return_currencies(&self) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.currencies_raw, "returnCurrencies", &[]).await
    }

    pub async fn return_loan_orders(
        &self,
        currency: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.loan_orders, "returnLoanOrders", &[("currency", currency)])
            .await
    }

    /// Tickers keyed by currency pair, for pair validation and BTC valuation.
    pub async fn tickers(&self) -> Result<Arc<FnvHashMap<String, PoloniexTicker>>, UpstreamError> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        self.tickers
            .fetch(async move { fetch_json(&client, &base_url, "returnTicker").await })
            .await
    }

    /// Currencies keyed by code (opaque upstream records), for currency validation.
    pub async fn currencies(&self) -> Result<Arc<FnvHashMap<String, Value>>, UpstreamError> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        self.currencies
            .fetch(async move { fetch_json(&client, &base_url, "returnCurrencies").await })
            .await
    }

    /// Pre-populate the tickers reference map. Test support.
    pub async fn seed_tickers(&self, tickers: Vec<(String, PoloniexTicker)>) {
        self.tickers.seed(tickers.into_iter().collect()).await;
    }

    /// Pre-populate the currencies reference map. Test support.
    pub async fn seed_currencies(&self, currencies: Vec<String>) {
        self.currencies
            .seed(
                currencies
                    .into_iter()
                    .map(|currency| (currency, Value::Null))
                    .collect(),
            )
            .await;
    }
}

/// Fetch one public command and parse its JSON. Poloniex reports business failures
/// as an `{"error": "..."}` payload with HTTP 200.
async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    base_url: &str,
    command: &str,
) -> Result<T, UpstreamError> {
    let reply = fetch_raw(client, base_url, &[("command", Some(command))])
        .await
        .map_err(|error| UpstreamError::Transport(error.to_string()))?;
    let value: Value = serde_json::from_slice(&reply.body)
        .map_err(|error| UpstreamError::Transport(error.to_string()))?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(UpstreamError::Venue(message.to_owned()));
    }
    serde_json::from_value(value).map_err(|error| UpstreamError::Transport(error.to_string()))
}
