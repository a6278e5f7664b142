//! Shared helpers for the integration suites: config builders and
//! wiremock mounts for the external APIs the crate talks to.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folio::{BalanceStore, Client, Config};

/// A client over an in-memory store, with every external endpoint
/// pointed at mock servers through the config overrides.
pub async fn client_with(config: Value) -> Client {
    let config = Config::from_json(&config.to_string()).expect("test config is valid");
    let store = BalanceStore::in_memory().await.expect("in-memory store");
    Client::with_parts(config, store, reqwest::Client::new())
}

/// Config JSON with one set of globals and the given wallet entries.
pub fn config_json(coingecko_base: &str, wallets: Vec<Value>) -> Value {
    json!({
        "globals": {
            "fiat": "USD",
            "fiat_symbol": "$",
            "fiat_min": 1.0,
            "coingecko_api_base": coingecko_base
        },
        "wallets": wallets
    })
}

/// A subscan wallet pinned to a mock server endpoint.
pub fn subscan_wallet(name: &str, endpoint: &str, tokens: Vec<&str>) -> Value {
    json!({
        "name": name,
        "source": { "name": "subscan", "key": "test-key", "endpoint": endpoint },
        "tokens": tokens
    })
}

/// A kraken exchange wallet; the secret is valid base64 for "secret".
pub fn kraken_wallet(name: &str, endpoint: &str) -> Value {
    json!({
        "name": name,
        "source": {
            "name": "kraken",
            "key": "test-key",
            "secret": "c2VjcmV0",
            "endpoint": endpoint
        }
    })
}

/// Subscan `scan/account/tokens` payload from `(symbol, decimals,
/// balance, lock)` rows, all under the `native` category.
pub fn subscan_payload(entries: &[(&str, i64, &str, &str)]) -> Value {
    let rows: Vec<Value> = entries
        .iter()
        .map(|(symbol, decimals, balance, lock)| {
            json!({
                "symbol": symbol,
                "decimals": decimals,
                "balance": balance,
                "lock": lock
            })
        })
        .collect();
    json!({ "code": 0, "message": "Success", "data": { "native": rows } })
}

/// Mounts a subscan tokens response for one queried address.
pub async fn mount_subscan(server: &MockServer, address: &str, payload: Value) {
    Mock::given(method("POST"))
        .and(path("/api/scan/account/tokens"))
        .and(body_partial_json(json!({ "address": address })))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(server)
        .await;
}

/// Mounts a CoinGecko `/simple/price` response.
pub async fn mount_simple_price(server: &MockServer, quotes: Value) {
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quotes))
        .mount(server)
        .await;
}

/// Mounts a CoinGecko `/coins/list` response.
pub async fn mount_coins_list(server: &MockServer, coins: Value) {
    Mock::given(method("GET"))
        .and(path("/coins/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(coins))
        .mount(server)
        .await;
}

/// Mounts a Kraken public ticker response for one pair query.
pub async fn mount_kraken_ticker(server: &MockServer, pair_param: &str, result: Value) {
    Mock::given(method("GET"))
        .and(path("/0/public/Ticker"))
        .and(query_param("pair", pair_param))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": [], "result": result })),
        )
        .mount(server)
        .await;
}

/// Mounts a Kraken private balance response.
pub async fn mount_kraken_balance(server: &MockServer, result: Value) {
    Mock::given(method("POST"))
        .and(path("/0/private/Balance"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": [], "result": result })),
        )
        .mount(server)
        .await;
}
