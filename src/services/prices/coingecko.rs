//! CoinGecko price source.
//!
//! Symbols map to CoinGecko coin ids through three layers: the builtin
//! token metadata, the persistent symbol cache in the store, and finally
//! one lazy fetch of the full `/coins/list` whose hits are written back
//! through to the cache. A symbol absent from all three fails the source
//! call, letting the resolver fall through to the next one.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::PriceSource;
use crate::config::TokenConfig;
use crate::data::{TokenPrice, TokenPrices};
use crate::error::Error;
use crate::store::BalanceStore;
use crate::utils::http::fetch_json;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
    name: String,
}

pub struct CoinGecko {
    builtins: Vec<TokenConfig>,
    store: BalanceStore,
    http: reqwest::Client,
    base_url: String,
}

impl CoinGecko {
    pub fn new(builtins: Vec<TokenConfig>, store: BalanceStore, http: reqwest::Client) -> Self {
        Self {
            builtins,
            store,
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Maps each requested symbol to its CoinGecko coin id.
    async fn resolve_coin_ids(&self, symbols: &[String]) -> Result<Vec<(String, String)>, Error> {
        let mut resolved = Vec::with_capacity(symbols.len());
        let mut unknown = Vec::new();
        for symbol in symbols {
            if let Some(builtin) = self
                .builtins
                .iter()
                .find(|tc| tc.symbol.eq_ignore_ascii_case(symbol) && !tc.coingecko_id.trim().is_empty())
            {
                resolved.push((symbol.clone(), builtin.coingecko_id.clone()));
            } else if let Some(coin_id) = self.store.coin_id_for(symbol).await? {
                resolved.push((symbol.clone(), coin_id));
            } else {
                unknown.push(symbol.clone());
            }
        }
        if unknown.is_empty() {
            return Ok(resolved);
        }

        // One full list fetch covers every cache miss of this call.
        log::info!("CoinGecko: looking up ids for {}", unknown.join(", "));
        let coins: Vec<CoinListEntry> =
            fetch_json("CoinGecko", self.http.get(self.endpoint("coins/list"))).await?;
        for symbol in unknown {
            let Some(coin) = coins.iter().find(|c| c.symbol.eq_ignore_ascii_case(&symbol)) else {
                return Err(Error::Decode {
                    context: "CoinGecko".to_string(),
                    detail: format!("unknown symbol '{}'", symbol),
                });
            };
            self.store
                .cache_coin_id(&symbol, &coin.name, &coin.id)
                .await?;
            resolved.push((symbol, coin.id.clone()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl PriceSource for CoinGecko {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_prices(&self, symbols: &[String], fiat: &str) -> Result<TokenPrices, Error> {
        let coins = self.resolve_coin_ids(symbols).await?;
        let ids: Vec<&str> = coins.iter().map(|(_, id)| id.as_str()).collect();
        let fiat = fiat.to_lowercase();
        let url = self.endpoint("simple/price");
        let request = self
            .http
            .get(&url)
            .query(&[("ids", ids.join(",")), ("vs_currencies", fiat.clone())]);
        let quotes: HashMap<String, HashMap<String, f32>> =
            fetch_json("CoinGecko", request).await?;

        let mut entries = Vec::with_capacity(coins.len());
        for (symbol, coin_id) in coins {
            let price = quotes
                .get(&coin_id)
                .and_then(|by_fiat| by_fiat.get(&fiat))
                .copied()
                .unwrap_or(0.0);
            // A zero quote stays missing so another source can price it.
            if price != 0.0 {
                log::debug!("CoinGecko price {} => {}", symbol, price);
                entries.push(TokenPrice {
                    token: symbol,
                    price,
                    fiat: fiat.clone(),
                });
            }
        }
        Ok(TokenPrices { entries })
    }
}
