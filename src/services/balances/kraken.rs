//! Kraken exchange source reporting account-wide balances.
//!
//! Unlike the explorer sources this adapter ignores the wallet's token
//! filters: the exchange reports whatever assets the account holds. The
//! private `Balance` call is authenticated with Kraken's nonce plus
//! HMAC-SHA512 signature scheme.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};

use super::BalanceSource;
use crate::config::Wallet;
use crate::data::TokenBalance;
use crate::error::Error;
use crate::utils::http::{read_json, send_rate_limited};

const DEFAULT_BASE_URL: &str = "https://api.kraken.com";
const BALANCE_PATH: &str = "/0/private/Balance";

/// Sentinel address for unrestricted exchange funds.
const ADDR_FUNDS: &str = "Funds";
/// Sentinel address for `.S` staked entries.
const ADDR_STAKING: &str = "Staking";
/// Sentinel address for `.P` parachain-bonded entries.
const ADDR_PARACHAIN: &str = "Parachain";

/// Exchange dust below this amount is not worth a record.
const MIN_AMOUNT: f64 = 0.0001;

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    error: Vec<String>,
    /// Asset code to amount string, e.g. `"XXBT": "0.5", "DOT.S": "100"`.
    #[serde(default)]
    result: HashMap<String, String>,
}

pub struct KrakenWallet {
    wallet: Wallet,
    http: reqwest::Client,
    base_url: String,
}

impl KrakenWallet {
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

    async fn call_balance(&self) -> Result<BalanceResponse, Error> {
        let nonce = chrono::Utc::now().timestamp_micros().to_string();
        let body = format!("nonce={}", nonce);
        let signature = sign_request(BALANCE_PATH, &nonce, &body, &self.wallet.source.secret)?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), BALANCE_PATH);
        let request = self
            .http
            .post(&url)
            .header("API-Key", &self.wallet.source.key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(body);
        let response = send_rate_limited("Kraken", request).await?;
        let balance: BalanceResponse = read_json("Kraken", response).await?;
        if let Some(first) = balance.error.first() {
            return Err(Error::Decode {
                context: "Kraken".to_string(),
                detail: format!("API error: {}", first),
            });
        }
        Ok(balance)
    }
}

/// Kraken's request signature: base64 HMAC-SHA512 over the URI path
/// concatenated with SHA-256(nonce + body), keyed by the decoded secret.
fn sign_request(path: &str, nonce: &str, body: &str, secret: &str) -> Result<String, Error> {
    let secret = BASE64
        .decode(secret)
        .map_err(|_| Error::Config("kraken secret is not valid base64".to_string()))?;
    let digest = Sha256::digest(format!("{}{}", nonce, body).as_bytes());
    let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
        .map_err(|_| Error::Config("kraken secret rejected by HMAC".to_string()))?;
    mac.update(path.as_bytes());
    mac.update(&digest);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Strips Kraken's legacy one-letter asset class prefix (`XXBT`, `ZUSD`)
/// and maps `XBT` to the common `BTC` symbol.
fn normalize_asset(code: &str) -> String {
    let code = code.to_uppercase();
    let bare = if code.len() == 4 && (code.starts_with('X') || code.starts_with('Z')) {
        &code[1..]
    } else {
        code.as_str()
    };
    if bare == "XBT" {
        "BTC".to_string()
    } else {
        bare.to_string()
    }
}

/// Maps an asset code suffix to its sentinel address and whether the
/// amount counts as locked.
fn classify_suffix(suffix: Option<&str>) -> (&'static str, bool) {
    match suffix.map(str::to_lowercase).as_deref() {
        Some("s") => (ADDR_STAKING, true),
        Some("p") => (ADDR_PARACHAIN, true),
        Some(other) => {
            log::warn!("Kraken: unknown asset modifier '{}'", other);
            (ADDR_FUNDS, false)
        }
        None => (ADDR_FUNDS, false),
    }
}

#[async_trait]
impl BalanceSource for KrakenWallet {
    fn name(&self) -> &'static str {
        "kraken"
    }

    async fn fetch_balances(&self) -> Result<Vec<TokenBalance>, Error> {
        let response = self.call_balance().await?;
        let mut balances = Vec::new();
        for (code, amount) in &response.result {
            let quantity: f64 = amount.parse().map_err(|_| Error::Decode {
                context: "Kraken".to_string(),
                detail: format!("bad amount '{}' for asset '{}'", amount, code),
            })?;
            if quantity <= MIN_AMOUNT {
                continue;
            }
            let (asset, suffix) = match code.split_once('.') {
                Some((asset, suffix)) => (asset, Some(suffix)),
                None => (code.as_str(), None),
            };
            let symbol = normalize_asset(asset);
            let (address, is_locked) = classify_suffix(suffix);
            log::debug!("Kraken balance {}:{} => {}", symbol, address, quantity);
            balances.push(TokenBalance {
                wallet: self.wallet.name.clone(),
                symbol,
                address: address.to_string(),
                balance: quantity,
                locked: if is_locked { quantity } else { 0.0 },
            });
        }
        Ok(balances)
    }
}
