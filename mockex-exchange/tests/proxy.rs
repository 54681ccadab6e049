use axum::http::header;
use axum::{Json, Router, routing::get};
use mockex_exchange::bittrex::proxy::BittrexProxy;
use mockex_exchange::poloniex::proxy::PoloniexProxy;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const GETMARKETS_BODY: &str = r#"{"success":true,"message":"","result":[{"MarketName":"BTC-XRP","BaseCurrency":"BTC","MarketCurrency":"XRP","MinTradeSize":0.00001}]}"#;

/// Stand-in upstream venue counting how often each endpoint is actually hit.
async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}/")
}

fn getmarkets_router(hits: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/getmarkets",
        get(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                ([(header::CONTENT_TYPE, "application/json")], GETMARKETS_BODY)
            }
        }),
    )
}

#[tokio::test]
async fn test_bittrex_passthrough_serves_second_hit_from_cache() {
    let hits = Arc::new(AtomicUsize::new(0));
    let proxy = BittrexProxy::new(spawn_upstream(getmarkets_router(Arc::clone(&hits))).await);

    let first = proxy.get_markets().await.unwrap();
    let second = proxy.get_markets().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1, "cache should absorb the second hit");
    assert_eq!(first.status, 200);
    assert_eq!(first.body, GETMARKETS_BODY.as_bytes());
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_bittrex_reference_map_parses_envelope() {
    let hits = Arc::new(AtomicUsize::new(0));
    let proxy = BittrexProxy::new(spawn_upstream(getmarkets_router(Arc::clone(&hits))).await);

    let markets = proxy.markets().await.unwrap();
    let market = markets.get("BTC-XRP").expect("market should be present");
    assert_eq!(market.base_currency, "BTC");
    assert_eq!(market.market_currency, "XRP");
    assert_eq!(market.min_trade_size, dec!(0.00001));

    proxy.markets().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1, "reference map should be cached");
}

#[tokio::test]
async fn test_poloniex_passthrough_keys_cache_by_parameters() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/",
        get(move |axum::extract::Query(params): axum::extract::Query<Vec<(String, String)>>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "echo": params }))
            }
        }),
    );

    let proxy = PoloniexProxy::new(spawn_upstream(router).await);

    let btc = proxy
        .return_order_book(Some("BTC_XRP"), Some("10"))
        .await
        .unwrap();
    proxy
        .return_order_book(Some("BTC_XRP"), Some("10"))
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1, "identical parameters share an entry");

    let ltc = proxy
        .return_order_book(Some("BTC_LTC"), Some("10"))
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2, "new parameters miss the cache");
    assert_ne!(btc.body, ltc.body);
}
