//! AlgoExplorer indexer source for Algorand accounts.

use async_trait::async_trait;
use serde::Deserialize;

use super::BalanceSource;
use crate::config::Wallet;
use crate::data::TokenBalance;
use crate::error::Error;
use crate::utils::http::fetch_json;

const DEFAULT_BASE_URL: &str = "https://algoindexer.algoexplorerapi.io/v2";

/// MicroAlgos per ALGO.
const ALGO_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    address: String,
    amount: u64,
}

pub struct AlgoExplorer {
    wallet: Wallet,
    http: reqwest::Client,
    base_url: String,
}

impl AlgoExplorer {
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

    async fn fetch_account(&self, address: &str, symbol: &str) -> Result<TokenBalance, Error> {
        let url = format!(
            "{}/accounts/{}",
            self.base_url.trim_end_matches('/'),
            address
        );
        let response: AccountResponse =
            fetch_json("AlgoExplorer", self.http.get(&url)).await?;
        let balance = response.account.amount as f64 / ALGO_SCALE;
        log::debug!("AlgoExplorer balance {}:{} => {}", symbol, address, balance);
        Ok(TokenBalance {
            wallet: self.wallet.name.clone(),
            symbol: symbol.to_string(),
            // The indexer echoes the canonical address; keep that form.
            address: response.account.address,
            balance,
            locked: 0.0,
        })
    }
}

#[async_trait]
impl BalanceSource for AlgoExplorer {
    fn name(&self) -> &'static str {
        "algoexplorer"
    }

    async fn fetch_balances(&self) -> Result<Vec<TokenBalance>, Error> {
        let mut balances = Vec::with_capacity(self.wallet.filters.len());
        for filter in &self.wallet.filters {
            balances.push(self.fetch_account(&filter.address, &filter.symbol).await?);
        }
        Ok(balances)
    }
}
