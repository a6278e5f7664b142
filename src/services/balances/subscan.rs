//! Subscan explorer source for Polkadot-family networks.
//!
//! Balances are fetched per configured token filter with a POST to the
//! network-specific Subscan instance. Subscan rate limits free API keys
//! aggressively, so every call goes through the 429 retry helper.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::BalanceSource;
use crate::config::{TokenFilter, Wallet};
use crate::data::TokenBalance;
use crate::error::Error;
use crate::utils::http::{read_json, send_rate_limited};
use crate::utils::numbers::scaled_to_f64;

const TOKENS_METHOD: &str = "scan/account/tokens";

#[derive(Debug, Deserialize)]
struct TokensResponse {
    code: i64,
    #[serde(default)]
    message: String,
    /// Token entries grouped by category ("native", "assets", ...).
    #[serde(default)]
    data: HashMap<String, Vec<TokenEntry>>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    symbol: String,
    decimals: i64,
    balance: String,
    #[serde(default)]
    lock: String,
}

pub struct Subscan {
    wallet: Wallet,
    http: reqwest::Client,
    base_url: Option<String>,
}

impl Subscan {
    pub fn new(wallet: Wallet, http: reqwest::Client) -> Self {
        let base_url = wallet.source.endpoint.clone();
        Self {
            wallet,
            http,
            base_url,
        }
    }

    /// Routes every network to one fixed base URL instead of the
    /// per-network subdomain.
    pub fn with_base_url(wallet: Wallet, http: reqwest::Client, base_url: String) -> Self {
        Self {
            wallet,
            http,
            base_url: Some(base_url),
        }
    }

    fn endpoint(&self, network: &str, method: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/api/{}", base.trim_end_matches('/'), method),
            None => format!("https://{}.api.subscan.io/api/{}", network, method),
        }
    }

    async fn fetch_filter(&self, filter: &TokenFilter) -> Result<TokenBalance, Error> {
        let url = self.endpoint(&filter.config.network, TOKENS_METHOD);
        let request = self
            .http
            .post(&url)
            .header("X-API-Key", &self.wallet.source.key)
            .json(&serde_json::json!({ "address": filter.address }));
        let response = send_rate_limited("Subscan", request).await?;
        let tokens: TokensResponse = read_json("Subscan", response).await?;
        if tokens.code != 0 {
            return Err(Error::Decode {
                context: "Subscan".to_string(),
                detail: format!("API code {}: {}", tokens.code, tokens.message),
            });
        }
        for entries in tokens.data.values() {
            for entry in entries {
                if !entry.symbol.eq_ignore_ascii_case(&filter.symbol) {
                    continue;
                }
                let balance = decode_amount(&entry.balance, entry.decimals)?;
                let locked = if entry.lock.is_empty() {
                    0.0
                } else {
                    decode_amount(&entry.lock, entry.decimals)?
                };
                log::debug!(
                    "Subscan balance {}:{} => {}/{}",
                    filter.symbol,
                    filter.address,
                    balance,
                    locked
                );
                return Ok(TokenBalance {
                    wallet: self.wallet.name.clone(),
                    symbol: filter.symbol.clone(),
                    address: filter.address.clone(),
                    balance,
                    locked,
                });
            }
        }
        // The explorer has no row for this token yet; report it as zero
        // so the wallet still covers all of its filters.
        Ok(TokenBalance {
            wallet: self.wallet.name.clone(),
            symbol: filter.symbol.clone(),
            address: filter.address.clone(),
            balance: 0.0,
            locked: 0.0,
        })
    }
}

fn decode_amount(raw: &str, decimals: i64) -> Result<f64, Error> {
    scaled_to_f64(raw, decimals).ok_or_else(|| Error::Decode {
        context: "Subscan".to_string(),
        detail: format!("bad token amount '{}'", raw),
    })
}

#[async_trait]
impl BalanceSource for Subscan {
    fn name(&self) -> &'static str {
        "subscan"
    }

    async fn fetch_balances(&self) -> Result<Vec<TokenBalance>, Error> {
        let mut balances = Vec::with_capacity(self.wallet.filters.len());
        for filter in &self.wallet.filters {
            balances.push(self.fetch_filter(filter).await?);
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    #[test]
    fn decodes_token_payload() {
        let payload = r#"{
            "code": 0,
            "message": "Success",
            "data": {
                "native": [
                    {"symbol": "DOT", "decimals": 10, "balance": "123450000000", "lock": "50000000000"}
                ]
            }
        }"#;
        let parsed: TokensResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.code, 0);
        let entry = &parsed.data["native"][0];
        assert_eq!(decode_amount(&entry.balance, entry.decimals).unwrap(), 12.345);
        assert_eq!(decode_amount(&entry.lock, entry.decimals).unwrap(), 5.0);
    }

    #[test]
    fn rejects_non_numeric_amount() {
        assert!(decode_amount("12.5", 10).is_err());
        assert!(decode_amount("abc", 10).is_err());
    }

    #[test]
    fn builds_network_endpoint() {
        let wallet = Wallet {
            name: "w".to_string(),
            source: SourceConfig::default(),
            filters: Vec::new(),
        };
        let source = Subscan::new(wallet.clone(), reqwest::Client::new());
        assert_eq!(
            source.endpoint("polkadot", TOKENS_METHOD),
            "https://polkadot.api.subscan.io/api/scan/account/tokens"
        );

        let pinned =
            Subscan::with_base_url(wallet, reqwest::Client::new(), "http://localhost:9100/".to_string());
        assert_eq!(
            pinned.endpoint("polkadot", TOKENS_METHOD),
            "http://localhost:9100/api/scan/account/tokens"
        );
    }
}
