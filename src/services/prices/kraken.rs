//! Kraken public ticker price source, the backup behind CoinGecko.
//!
//! The ticker endpoint takes concatenated `SYMBOLFIAT` pair names and
//! answers with its own pair spelling, which for BTC is the legacy
//! `XXBT` prefix. Responses are matched back to the requested symbols;
//! anything left unmatched fails the whole call so the resolver can
//! report it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::PriceSource;
use crate::data::{TokenPrice, TokenPrices};
use crate::error::Error;
use crate::utils::http::fetch_json;

const DEFAULT_BASE_URL: &str = "https://api.kraken.com";
const TICKER_PATH: &str = "0/public/Ticker";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, TickerPair>,
}

#[derive(Debug, Deserialize)]
struct TickerPair {
    /// Bid as `[price, whole lot volume, lot volume]`.
    #[serde(default)]
    b: Vec<String>,
}

pub struct KrakenTicker {
    http: reqwest::Client,
    base_url: String,
}

impl KrakenTicker {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

/// Matches a response pair name back to one of the requested symbols,
/// special-casing Kraken's `XXBT` spelling of BTC.
fn match_pair<'a>(pair: &str, symbols: &'a [String]) -> Option<&'a str> {
    symbols.iter().map(String::as_str).find(|symbol| {
        if symbol.eq_ignore_ascii_case("BTC") && pair.contains("XXBT") {
            return true;
        }
        pair.contains(&symbol.to_uppercase())
    })
}

#[async_trait]
impl PriceSource for KrakenTicker {
    fn name(&self) -> &'static str {
        "kraken"
    }

    async fn fetch_prices(&self, symbols: &[String], fiat: &str) -> Result<TokenPrices, Error> {
        let pairs: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}{}", s.to_uppercase(), fiat.to_uppercase()))
            .collect();
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), TICKER_PATH);
        let request = self.http.get(&url).query(&[("pair", pairs.join(","))]);
        let ticker: TickerResponse = fetch_json("Kraken ticker", request).await?;
        if let Some(first) = ticker.error.first() {
            return Err(Error::Decode {
                context: "Kraken ticker".to_string(),
                detail: format!("API error: {}", first),
            });
        }

        let mut entries = Vec::with_capacity(symbols.len());
        let mut matched: Vec<String> = Vec::new();
        for (pair, value) in &ticker.result {
            let Some(symbol) = match_pair(pair, symbols) else {
                continue;
            };
            let bid = value.b.first().ok_or_else(|| Error::Decode {
                context: "Kraken ticker".to_string(),
                detail: format!("pair '{}' has no bid", pair),
            })?;
            let price: f32 = bid.parse().map_err(|_| Error::Decode {
                context: "Kraken ticker".to_string(),
                detail: format!("bad bid price '{}' for pair '{}'", bid, pair),
            })?;
            log::debug!("Kraken ticker price {} => {}", pair, price);
            matched.push(symbol.to_uppercase());
            entries.push(TokenPrice {
                token: symbol.to_string(),
                price,
                fiat: fiat.to_lowercase(),
            });
        }

        let unmatched: Vec<String> = symbols
            .iter()
            .map(|s| s.to_uppercase())
            .filter(|s| !matched.contains(s))
            .collect();
        if !unmatched.is_empty() {
            return Err(Error::Decode {
                context: "Kraken ticker".to_string(),
                detail: format!("no pair found for {}", unmatched.join(", ")),
            });
        }
        Ok(TokenPrices { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_plain_and_legacy_btc_pairs() {
        let requested = symbols(&["BTC", "DOT"]);
        assert_eq!(match_pair("XXBTZUSD", &requested), Some("BTC"));
        assert_eq!(match_pair("DOTUSD", &requested), Some("DOT"));
        assert_eq!(match_pair("ETHUSD", &requested), None);
    }

    #[test]
    fn decodes_ticker_payload() {
        let payload = r#"{
            "error": [],
            "result": {
                "XXBTZUSD": {"a": ["43001.1", "1", "1.0"], "b": ["43000.5", "1", "1.0"]},
                "DOTUSD": {"a": ["6.53", "1", "1.0"], "b": ["6.52", "1", "1.0"]}
            }
        }"#;
        let ticker: TickerResponse = serde_json::from_str(payload).unwrap();
        assert!(ticker.error.is_empty());
        assert_eq!(ticker.result["DOTUSD"].b[0], "6.52");
    }

    #[test]
    fn surfaces_api_error_list() {
        let payload = r#"{"error": ["EQuery:Unknown asset pair"], "result": {}}"#;
        let ticker: TickerResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(ticker.error[0], "EQuery:Unknown asset pair");
    }
}
