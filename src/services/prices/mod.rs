//! Price sources and the fallback chain that resolves token prices.
//!
//! The resolver walks its sources in priority order, asking each one only
//! for the symbols still missing. A single source failing is logged and
//! skipped; the chain as a whole fails only when every source has been
//! tried and symbols remain unpriced. Partially-priced runs are never
//! committed by the caller.

pub mod coingecko;
pub mod kraken;

pub use coingecko::CoinGecko;
pub use kraken::KrakenTicker;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::Config;
use crate::data::{TokenPrice, TokenPrices};
use crate::error::Error;
use crate::store::BalanceStore;

/// A provider of fiat prices for a set of token symbols.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Prices for the requested symbols in the given fiat currency.
    ///
    /// A source may return fewer entries than requested; the resolver
    /// treats the leftovers as still missing. Whether partial coverage is
    /// a soft result or a hard error is each source's own call.
    async fn fetch_prices(&self, symbols: &[String], fiat: &str) -> Result<TokenPrices, Error>;
}

/// Fallback chain over price sources.
pub struct PriceResolver {
    sources: Vec<Box<dyn PriceSource>>,
}

impl PriceResolver {
    /// Default chain: CoinGecko first, Kraken's public ticker as backup.
    pub fn for_config(config: &Config, store: &BalanceStore, http: &reqwest::Client) -> Self {
        let mut coingecko = CoinGecko::new(
            config.token_configs().to_vec(),
            store.clone(),
            http.clone(),
        );
        if let Some(base) = config.coingecko_api_base() {
            coingecko = coingecko.with_base_url(base.to_string());
        }
        let mut kraken = KrakenTicker::new(http.clone());
        if let Some(base) = config.kraken_api_base() {
            kraken = kraken.with_base_url(base.to_string());
        }
        Self::with_sources(vec![Box::new(coingecko), Box::new(kraken)])
    }

    pub fn with_sources(sources: Vec<Box<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    /// Resolves every requested symbol or fails with the leftovers.
    ///
    /// The fiat currency pricing itself is resolved to 1.0 up front, so a
    /// fiat-pegged entry never consults any source.
    pub async fn resolve(&self, tokens: &[String], fiat: &str) -> Result<TokenPrices, Error> {
        let mut missing: BTreeSet<String> = tokens.iter().map(|t| t.to_uppercase()).collect();
        let mut result = TokenPrices::default();
        if missing.remove(&fiat.to_uppercase()) {
            result.entries.push(TokenPrice {
                token: fiat.to_uppercase(),
                price: 1.0,
                fiat: fiat.to_lowercase(),
            });
        }
        for source in &self.sources {
            if missing.is_empty() {
                break;
            }
            let request: Vec<String> = missing.iter().cloned().collect();
            match source.fetch_prices(&request, fiat).await {
                Ok(prices) => {
                    for price in prices.entries {
                        missing.remove(&price.token.to_uppercase());
                        result.entries.push(price);
                    }
                }
                Err(err) => {
                    log::warn!("Price source {} failed: {}", source.name(), err);
                }
            }
        }
        if !missing.is_empty() {
            return Err(Error::PricesUnresolved(missing.into_iter().collect()));
        }
        Ok(result)
    }
}
