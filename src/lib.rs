//! folio — multi-source crypto portfolio tracker core.
//!
//! The crate pulls token balances from chain explorers and an exchange,
//! prices them through a fallback chain of market-data sources, freezes
//! the fiat valuation of each balance into an append-only store, and
//! answers time-series sampling and percent-change queries over that
//! history. Presentation layers (bots, HTTP, rendering) sit on top of
//! [`Client`] and [`data::BalanceSet`] and are not part of this crate.

pub mod client;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod services;
pub mod store;
pub mod utils;

pub use client::Client;
pub use config::Config;
pub use data::{BalanceRecord, BalanceSet, TokenBalance, TokenPrice, TokenPrices};
pub use error::Error;
pub use store::BalanceStore;
