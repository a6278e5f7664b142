//! Balance sources: one adapter per supported explorer or exchange API.
//!
//! Each adapter owns the wire format of its upstream service and reports
//! balances in the shared [`TokenBalance`] shape. New adapters register
//! in [`KNOWN_SOURCES`] and [`source_for`] so configuration validation
//! and the update pipeline pick them up together.

pub mod algoexplorer;
pub mod blockcypher;
pub mod kraken;
pub mod minaexplorer;
pub mod subscan;

pub use algoexplorer::AlgoExplorer;
pub use blockcypher::BlockCypher;
pub use kraken::KrakenWallet;
pub use minaexplorer::MinaExplorer;
pub use subscan::Subscan;

use async_trait::async_trait;

use crate::config::Wallet;
use crate::data::TokenBalance;
use crate::error::Error;

/// Source names accepted in wallet configuration.
pub const KNOWN_SOURCES: [&str; 5] = [
    "subscan",
    "algoexplorer",
    "blockcypher",
    "minaexplorer",
    "kraken",
];

/// A provider of token balances for one configured wallet.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Fetches current balances for every token the wallet tracks.
    async fn fetch_balances(&self) -> Result<Vec<TokenBalance>, Error>;
}

/// Whether `name` refers to a registered balance source.
pub fn is_known_source(name: &str) -> bool {
    KNOWN_SOURCES.contains(&name.to_lowercase().as_str())
}

/// Instantiates the balance source a wallet is configured with.
pub fn source_for(wallet: &Wallet, http: &reqwest::Client) -> Result<Box<dyn BalanceSource>, Error> {
    match wallet.source.name.to_lowercase().as_str() {
        "subscan" => Ok(Box::new(Subscan::new(wallet.clone(), http.clone()))),
        "algoexplorer" => Ok(Box::new(AlgoExplorer::new(wallet.clone(), http.clone()))),
        "blockcypher" => Ok(Box::new(BlockCypher::new(wallet.clone(), http.clone()))),
        "minaexplorer" => Ok(Box::new(MinaExplorer::new(wallet.clone(), http.clone()))),
        "kraken" => Ok(Box::new(KrakenWallet::new(wallet.clone(), http.clone()))),
        other => Err(Error::Config(format!("unknown balance source '{}'", other))),
    }
}
