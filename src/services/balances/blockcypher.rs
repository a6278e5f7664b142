//! BlockCypher source for Bitcoin addresses.

use async_trait::async_trait;
use serde::Deserialize;

use super::BalanceSource;
use crate::config::Wallet;
use crate::data::TokenBalance;
use crate::error::Error;
use crate::utils::http::fetch_json;

const DEFAULT_BASE_URL: &str = "https://api.blockcypher.com/v1/btc/main";

/// Satoshis per BTC.
const BTC_SCALE: f64 = 100_000_000.0;

#[derive(Debug, Deserialize)]
struct AddressBalance {
    address: String,
    /// Confirmed balance in satoshis.
    balance: u64,
}

pub struct BlockCypher {
    wallet: Wallet,
    http: reqwest::Client,
    base_url: String,
}

impl BlockCypher {
    pub fn new(wallet: Wallet, http: reqwest::Client) -> Self {
        let base_url = wallet
            .source
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            wallet,
            http,
            base_url,
        }
    }

    pub fn with_base_url(wallet: Wallet, http: reqwest::Client, base_url: String) -> Self {
        Self {
            wallet,
            http,
            base_url,
        }
    }

    async fn fetch_address(&self, address: &str, symbol: &str) -> Result<TokenBalance, Error> {
        let url = format!(
            "{}/addrs/{}/balance",
            self.base_url.trim_end_matches('/'),
            address
        );
        let response: AddressBalance =
            fetch_json("BlockCypher", self.http.get(&url)).await?;
        let balance = response.balance as f64 / BTC_SCALE;
        log::debug!("BlockCypher balance {}:{} => {}", symbol, address, balance);
        Ok(TokenBalance {
            wallet: self.wallet.name.clone(),
            symbol: symbol.to_string(),
            address: response.address,
            balance,
            locked: 0.0,
        })
    }
}

#[async_trait]
impl BalanceSource for BlockCypher {
    fn name(&self) -> &'static str {
        "blockcypher"
    }

    async fn fetch_balances(&self) -> Result<Vec<TokenBalance>, Error> {
        let mut balances = Vec::with_capacity(self.wallet.filters.len());
        for filter in &self.wallet.filters {
            balances.push(self.fetch_address(&filter.address, &filter.symbol).await?);
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_address_payload() {
        let payload = r#"{
            "address": "1DEP8i3QJCsomS4BSMY2RpU1upv62aGvhD",
            "total_received": 4433416,
            "total_sent": 0,
            "balance": 4433416,
            "unconfirmed_balance": 0,
            "final_balance": 4433416,
            "n_tx": 7
        }"#;
        let parsed: AddressBalance = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.balance as f64 / BTC_SCALE, 0.04433416);
        assert_eq!(parsed.address, "1DEP8i3QJCsomS4BSMY2RpU1upv62aGvhD");
    }
}
