//! The acquisition pipeline and the query facade over the store.
//!
//! One `update_balances` run fans out a task per wallet, gathers every
//! result, prices the merged balances once, and commits all surviving
//! records under a single run timestamp and batch id. Any wallet or
//! price failure aborts the run before the first write, so the store
//! only ever sees complete runs.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::{Config, Wallet};
use crate::data::{truncate_to_second, BalanceRecord, BalanceSet, TokenBalance};
use crate::error::Error;
use crate::services::balances;
use crate::services::prices::PriceResolver;
use crate::store::BalanceStore;

/// Updating more often than this invites rate-limit storms.
const MIN_REFRESH_FLOOR: Duration = Duration::from_secs(5);

pub struct Client {
    config: Config,
    store: BalanceStore,
    http: reqwest::Client,
}

impl Client {
    pub async fn new(config_path: &str, db_path: &str) -> Result<Client, Error> {
        let config = Config::from_path(config_path)?;
        let store = BalanceStore::open(db_path).await?;
        Ok(Self::with_parts(config, store, reqwest::Client::new()))
    }

    /// Assembles a client from already-built parts. Tests use this with
    /// an in-memory store and mock-server endpoints.
    pub fn with_parts(config: Config, store: BalanceStore, http: reqwest::Client) -> Client {
        Client {
            config,
            store,
            http,
        }
    }

    pub fn fiat(&self) -> &str {
        self.config.fiat()
    }

    pub fn fiat_symbol(&self) -> &str {
        self.config.fiat_symbol()
    }

    /// Timestamp of the most recent run, if any.
    pub async fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.last_snapshot().await.entries().first().map(|e| e.ts)
    }

    /// The most recent run's records from the last week. Best-effort: a
    /// store failure degrades to an empty set.
    pub async fn last_snapshot(&self) -> BalanceSet {
        match self.store.query_window(7).await {
            Ok(set) => set.last_sample(),
            Err(err) => {
                log::warn!("Snapshot query failed: {}", err);
                BalanceSet::default()
            }
        }
    }

    /// Records from the last `days` days, newest first. Zero means all.
    pub async fn query_window(&self, days: u32) -> Result<BalanceSet, Error> {
        self.store.query_window(days).await
    }

    /// Records within an inclusive range, ascending.
    pub async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BalanceSet, Error> {
        self.store.query_range(from, to).await
    }

    /// Refreshes every wallet's balances if any of them is stale.
    ///
    /// Either the whole run commits or nothing does: every fetch and the
    /// price resolution complete before the first record is written.
    pub async fn update_balances(&self, min_refresh: Duration) -> Result<(), Error> {
        let start = Utc::now();
        let min_refresh = min_refresh.max(MIN_REFRESH_FLOOR);
        let wallets = self.config.wallets();
        if wallets.is_empty() {
            return Err(Error::NoWallets);
        }

        if !self.refresh_required(&wallets, start, min_refresh).await? {
            return Ok(());
        }

        let balances = self.fetch_all_wallets(wallets).await?;
        let fiat = self.config.fiat().to_string();
        let mut merged: Vec<TokenBalance> = Vec::new();
        let mut symbols: Vec<String> = Vec::new();
        for balance in balances {
            // Fiat-denominated entries are not priced against themselves.
            if balance.symbol.eq_ignore_ascii_case(&fiat) {
                continue;
            }
            let symbol = balance.symbol.to_lowercase();
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
            merged.push(balance);
        }
        if merged.is_empty() {
            log::info!("No balances to persist");
            return Ok(());
        }

        log::info!("Resolving prices for {}", symbols.join(", "));
        let resolver = PriceResolver::for_config(&self.config, &self.store, &self.http);
        let prices = resolver.resolve(&symbols, &fiat).await?;

        let ts = truncate_to_second(start);
        let run_id = Uuid::new_v4().to_string();
        let mut written = 0usize;
        for balance in merged {
            let price = if balance.symbol.eq_ignore_ascii_case(&fiat) {
                1.0
            } else {
                prices.price_for(&balance.symbol)
            };
            let value = balance.balance * price;
            if value as f32 <= self.config.fiat_min() {
                log::debug!(
                    "Dropping dust entry {}/{} worth {:.4}",
                    balance.wallet,
                    balance.symbol,
                    value
                );
                continue;
            }
            let record = BalanceRecord {
                ts,
                run_id: run_id.clone(),
                wallet: balance.wallet,
                token: balance.symbol,
                address: balance.address,
                balance: balance.balance,
                balance_locked: balance.locked,
                fiat_value: value,
            };
            self.store.insert_balance(&record).await?;
            written += 1;
        }
        let elapsed = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        log::info!("Updated {} records in {:.2}s", written, elapsed);
        Ok(())
    }

    /// Whether any wallet needs a refresh: never sampled, filter count
    /// changed, or last sample older than the refresh interval.
    async fn refresh_required(
        &self,
        wallets: &[Wallet],
        now: DateTime<Utc>,
        min_refresh: Duration,
    ) -> Result<bool, Error> {
        let last = self.store.query_window(1).await?.last_sample();
        let max_age = TimeDelta::seconds(min_refresh.as_secs() as i64);
        let mut required = false;
        for wallet in wallets {
            let rows = last.filter_wallet(&wallet.name);
            if rows.is_empty() {
                log::info!("Refresh required, wallet '{}' was never sampled", wallet.name);
                required = true;
            } else if !wallet.filters.is_empty() && rows.len() != wallet.filters.len() {
                log::info!(
                    "Refresh required, wallet '{}' changed its token filters",
                    wallet.name
                );
                required = true;
            } else if now - rows.entries()[0].ts > max_age {
                log::info!(
                    "Refresh required, wallet '{}' is older than {}s",
                    wallet.name,
                    min_refresh.as_secs()
                );
                required = true;
            } else {
                log::info!(
                    "Skipping wallet '{}', updated less than {}s ago",
                    wallet.name,
                    min_refresh.as_secs()
                );
            }
        }
        Ok(required)
    }

    /// Fetches every wallet concurrently, failing fast on the first
    /// error. Remaining tasks finish in the background; their sends land
    /// in a closed channel and are dropped.
    async fn fetch_all_wallets(&self, wallets: Vec<Wallet>) -> Result<Vec<TokenBalance>, Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let count = wallets.len();
        for wallet in wallets {
            let tx = tx.clone();
            let http = self.http.clone();
            tokio::spawn(async move {
                let _ = tx.send(fetch_wallet(wallet, http).await);
            });
        }
        drop(tx);

        let mut all = Vec::new();
        while let Some(result) = rx.recv().await {
            match result {
                Ok(balances) => all.extend(balances),
                Err(err) => {
                    log::error!("One wallet failed, aborting update: {}", err);
                    return Err(err);
                }
            }
        }
        log::debug!("Collected balances from {} wallets", count);
        Ok(all)
    }
}

async fn fetch_wallet(wallet: Wallet, http: reqwest::Client) -> Result<Vec<TokenBalance>, Error> {
    let source = balances::source_for(&wallet, &http)?;
    log::info!("Updating wallet '{}' from {}", wallet.name, source.name());
    source.fetch_balances().await
}
