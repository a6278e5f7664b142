//! MinaExplorer source for Mina protocol accounts.

use async_trait::async_trait;
use serde::Deserialize;

use super::BalanceSource;
use crate::config::Wallet;
use crate::data::TokenBalance;
use crate::error::Error;
use crate::utils::http::fetch_json;

const DEFAULT_BASE_URL: &str = "https://api.minaexplorer.com";

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: Account,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    public_key: String,
    balance: AccountBalance,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    /// Total balance as a decimal string, already in MINA.
    total: String,
}

pub struct MinaExplorer {
    wallet: Wallet,
    http: reqwest::Client,
    base_url: String,
}

impl MinaExplorer {
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
            fetch_json("MinaExplorer", self.http.get(&url)).await?;
        let balance: f64 = response
            .account
            .balance
            .total
            .parse()
            .map_err(|_| Error::Decode {
                context: "MinaExplorer".to_string(),
                detail: format!("bad balance '{}'", response.account.balance.total),
            })?;
        log::debug!("MinaExplorer balance {}:{} => {}", symbol, address, balance);
        Ok(TokenBalance {
            wallet: self.wallet.name.clone(),
            symbol: symbol.to_string(),
            address: response.account.public_key,
            balance,
            locked: 0.0,
        })
    }
}

#[async_trait]
impl BalanceSource for MinaExplorer {
    fn name(&self) -> &'static str {
        "minaexplorer"
    }

    async fn fetch_balances(&self) -> Result<Vec<TokenBalance>, Error> {
        let mut balances = Vec::with_capacity(self.wallet.filters.len());
        for filter in &self.wallet.filters {
            balances.push(self.fetch_account(&filter.address, &filter.symbol).await?);
        }
        Ok(balances)
    }
}
