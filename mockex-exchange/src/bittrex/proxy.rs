use crate::proxy::{
    MethodCache, ReferenceCache, UpstreamError, UpstreamReply, cache_key, fetch_raw,
};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://bittrex.com/api/v1.1/public/";

/// Every Bittrex payload, success or failure, travels in this wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct BittrexEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub result: Option<T>,
}

/// Upstream market reference row - the fields trading validation consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct BittrexMarket {
    #[serde(rename = "MarketName")]
    pub market_name: String,
    #[serde(rename = "BaseCurrency")]
    pub base_currency: String,
    #[serde(rename = "MarketCurrency")]
    pub market_currency: String,
    #[serde(rename = "MinTradeSize", with = "rust_decimal::serde::arbitrary_precision")]
    pub min_trade_size: Decimal,
}

/// Upstream currency reference row.
#[derive(Debug, Clone, Deserialize)]
pub struct BittrexCurrency {
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "TxFee", with = "rust_decimal::serde::arbitrary_precision")]
    pub tx_fee: Decimal,
}

/// TTL-cached pass-through over the real Bittrex public API.
///
/// Raw endpoint replies are replayed verbatim; `markets()`/`currencies()` expose the
/// parsed reference maps used by trading validation.
#[derive(Debug)]
pub struct BittrexProxy {
    client: reqwest::Client,
    base_url: String,
    markets_raw: MethodCache,
    currencies_raw: MethodCache,
    ticker: MethodCache,
    market_summaries: MethodCache,
    market_summary: MethodCache,
    order_book: MethodCache,
    market_history: MethodCache,
    markets: ReferenceCache<FnvHashMap<String, BittrexMarket>>,
    currencies: ReferenceCache<FnvHashMap<String, BittrexCurrency>>,
}

impl BittrexProxy {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            markets_raw: MethodCache::new(Duration::from_secs(3600)),
            currencies_raw: MethodCache::new(Duration::from_secs(3600)),
            ticker: MethodCache::new(Duration::from_secs(5)),
            market_summaries: MethodCache::new(Duration::from_secs(60)),
            market_summary: MethodCache::new(Duration::from_secs(60)),
            order_book: MethodCache::new(Duration::from_secs(5)),
            market_history: MethodCache::new(Duration::from_secs(5)),
            markets: ReferenceCache::new(Duration::from_secs(3600)),
            currencies: ReferenceCache::new(Duration::from_secs(3600)),
        }
    }

    async fn passthrough(
        &self,
        cache: &MethodCache,
        method: &str,
        params: &[(&str, Option<&str>)],
    ) -> Result<UpstreamReply, UpstreamError> {
        let url = format!("{}{}", self.base_url, method);
        let key = format!("{method}?{}", cache_key(params));
        cache.fetch(key, fetch_raw(&self.client, &url, params)).await
    }

    pub async fn get_markets(&self) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.markets_raw, "getmarkets", &[]).await
    }

    pub async fn get_currencies(&self) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.currencies_raw, "getcurrencies", &[]).await
    }

    pub async fn get_ticker(&self, market: Option<&str>) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.ticker, "getticker", &[("market", market)]).await
    }

    pub async fn get_market_summaries(&self) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.market_summaries, "getmarketsummaries", &[]).await
    }

    pub async fn get_market_summary(
        &self,
        market: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.market_summary, "getmarketsummary", &[("market", market)])
            .await
    }

    pub async fn get_order_book(
        &self,
        market: Option<&str>,
        book_type: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(
            &self.order_book,
            "getorderbook",
            &[("market", market), ("type", book_type)],
        )
        .await
    }

    pub async fn get_market_history(
        &self,
        market: Option<&str>,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.passthrough(&self.market_history, "getmarkethistory", &[("market", market)])
            .await
    }

    /// Markets keyed by `MarketName`, for trading validation.
    pub async fn markets(&self) -> Result<Arc<FnvHashMap<String, BittrexMarket>>, UpstreamError> {
        let url = format!("{}getmarkets", self.base_url);
        let client = self.client.clone();
        self.markets
            .fetch(async move {
                let rows: Vec<BittrexMarket> = fetch_envelope(&client, &url).await?;
                Ok(rows
                    .into_iter()
                    .map(|market| (market.market_name.clone(), market))
                    .collect())
            })
            .await
    }

    /// Currencies keyed by code, for withdrawal validation and fee lookup.
    pub async fn currencies(
        &self,
    ) -> Result<Arc<FnvHashMap<String, BittrexCurrency>>, UpstreamError> {
        let url = format!("{}getcurrencies", self.base_url);
        let client = self.client.clone();
        self.currencies
            .fetch(async move {
                let rows: Vec<BittrexCurrency> = fetch_envelope(&client, &url).await?;
                Ok(rows
                    .into_iter()
                    .map(|currency| (currency.currency.clone(), currency))
                    .collect())
            })
            .await
    }

    /// Pre-populate the markets reference map. Test support.
    pub async fn seed_markets(&self, markets: Vec<BittrexMarket>) {
        self.markets
            .seed(
                markets
                    .into_iter()
                    .map(|market| (market.market_name.clone(), market))
                    .collect(),
            )
            .await;
    }

    /// Pre-populate the currencies reference map. Test support.
    pub async fn seed_currencies(&self, currencies: Vec<BittrexCurrency>) {
        self.currencies
            .seed(
                currencies
                    .into_iter()
                    .map(|currency| (currency.currency.clone(), currency))
                    .collect(),
            )
            .await;
    }
}

/// Fetch and unwrap one `{success, message, result}` payload. An unsuccessful
/// envelope is a venue failure carrying the upstream message.
async fn fetch_envelope<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, UpstreamError> {
    let reply = fetch_raw(client, url, &[])
        .await
        .map_err(|error| UpstreamError::Transport(error.to_string()))?;
    let envelope: BittrexEnvelope<T> = serde_json::from_slice(&reply.body)
        .map_err(|error| UpstreamError::Transport(error.to_string()))?;
    if !envelope.success {
        return Err(UpstreamError::Venue(envelope.message));
    }
    envelope
        .result
        .ok_or_else(|| UpstreamError::Transport("envelope carried no result".to_owned()))
}
