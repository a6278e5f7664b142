//! JSON configuration: fiat globals, wallets with their balance sources
//! and token filters, and token metadata overrides.
//!
//! Wallet token filters are written as `"symbol"` or `"symbol:address"`;
//! each filter resolves its [`TokenConfig`] from the user-supplied token
//! list merged over the embedded builtin list, user entries winning.

use serde::Deserialize;

use crate::constants::builtin_tokens;
use crate::error::Error;
use crate::services::balances;

/// Token metadata linking a symbol to its CoinGecko id, the network name
/// used by explorer queries, and the chain decimals.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    #[serde(default)]
    pub coingecko_id: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub decimals: u32,
}

/// Fiat currency settings shared by every pipeline run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Globals {
    #[serde(default)]
    pub fiat: String,
    #[serde(default)]
    pub fiat_symbol: String,
    /// Records valued below this floor are dropped before persisting.
    #[serde(default)]
    pub fiat_min: f32,
    /// Base URL override for the CoinGecko price source. Useful for
    /// pointing tests at a mock server.
    #[serde(default)]
    pub coingecko_api_base: Option<String>,
    /// Base URL override for the Kraken ticker price source.
    #[serde(default)]
    pub kraken_api_base: Option<String>,
}

/// Which balance source serves a wallet, plus its credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
    /// Base URL override, mainly for tests against a mock server.
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct WalletConfig {
    name: String,
    source: SourceConfig,
    #[serde(default)]
    tokens: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    globals: Globals,
    #[serde(default)]
    wallets: Vec<WalletConfig>,
    #[serde(default)]
    tokens: Vec<TokenConfig>,
}

/// One token filter of a wallet, with its resolved metadata.
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    /// Lowercased token symbol.
    pub symbol: String,
    /// On-chain address; empty for account-wide sources.
    pub address: String,
    pub config: TokenConfig,
}

/// A wallet with its token filters resolved.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub name: String,
    pub source: SourceConfig,
    pub filters: Vec<TokenFilter>,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    globals: Globals,
    wallets: Vec<WalletConfig>,
    tokens: Vec<TokenConfig>,
}

impl Config {
    /// Reads and validates a config file.
    pub fn from_path(path: &str) -> Result<Config, Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{}': {}", path, e)))?;
        Config::from_json(&data)
    }

    /// Parses and validates config JSON.
    pub fn from_json(data: &str) -> Result<Config, Error> {
        let file: ConfigFile =
            serde_json::from_str(data).map_err(|e| Error::Config(e.to_string()))?;
        // User entries come first so a linear first-match lookup prefers
        // them over builtins.
        let mut tokens = file.tokens;
        tokens.extend(builtin_tokens().iter().cloned());
        let config = Config {
            globals: file.globals,
            wallets: file.wallets,
            tokens,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.globals.fiat.trim().is_empty() {
            return Err(Error::Config("globals.fiat must be set".to_string()));
        }
        for wallet in &self.wallets {
            if wallet.name.trim().is_empty() {
                return Err(Error::Config("wallet with an empty name".to_string()));
            }
            if !balances::is_known_source(&wallet.source.name) {
                return Err(Error::Config(format!(
                    "wallet '{}' uses unknown balance source '{}'",
                    wallet.name, wallet.source.name
                )));
            }
        }
        Ok(())
    }

    pub fn fiat(&self) -> &str {
        &self.globals.fiat
    }

    pub fn fiat_symbol(&self) -> &str {
        &self.globals.fiat_symbol
    }

    pub fn fiat_min(&self) -> f32 {
        self.globals.fiat_min
    }

    pub fn coingecko_api_base(&self) -> Option<&str> {
        self.globals.coingecko_api_base.as_deref()
    }

    pub fn kraken_api_base(&self) -> Option<&str> {
        self.globals.kraken_api_base.as_deref()
    }

    /// Token metadata, user entries first, builtins after.
    pub fn token_configs(&self) -> &[TokenConfig] {
        &self.tokens
    }

    /// Wallets with their token filters parsed and resolved.
    pub fn wallets(&self) -> Vec<Wallet> {
        self.wallets
            .iter()
            .map(|w| Wallet {
                name: w.name.clone(),
                source: w.source.clone(),
                filters: w.tokens.iter().map(|t| self.parse_filter(t)).collect(),
            })
            .collect()
    }

    fn parse_filter(&self, spec: &str) -> TokenFilter {
        let spec = spec.trim();
        let (symbol, address) = match spec.split_once(':') {
            Some((symbol, address)) => (symbol.to_lowercase(), address.to_string()),
            None => (spec.to_lowercase(), String::new()),
        };
        let config = self
            .tokens
            .iter()
            .find(|tc| tc.symbol.eq_ignore_ascii_case(&symbol))
            .cloned()
            .unwrap_or_default();
        TokenFilter {
            symbol,
            address,
            config,
        }
    }
}
