//! Append-only balance record store over SQLite.
//!
//! The schema is created idempotently on first use, so a fresh database
//! file behaves like an empty store instead of failing queries. Records
//! are only ever inserted; nothing updates or deletes them.

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::data::{BalanceRecord, BalanceSet, truncate_to_second};
use crate::error::Error;

const SELECT_COLUMNS: &str =
    "ts, run_id, wallet, token, address, balance, balance_locked, fiat_value";

#[derive(Debug, Clone)]
pub struct BalanceStore {
    pool: SqlitePool,
}

impl BalanceStore {
    /// Opens the database file at `path`, creating it when missing.
    pub async fn open(path: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Ephemeral in-memory store. A single connection keeps every query
    /// on the same in-memory database.
    pub async fn in_memory() -> Result<Self, Error> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balance (
                ts TEXT NOT NULL,
                run_id TEXT NOT NULL,
                wallet TEXT NOT NULL,
                token TEXT NOT NULL,
                address TEXT NOT NULL,
                balance REAL NOT NULL,
                balance_locked REAL NOT NULL,
                fiat_value REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_ids (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                coin_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Appends one record.
    pub async fn insert_balance(&self, record: &BalanceRecord) -> Result<(), Error> {
        self.ensure_schema().await?;
        sqlx::query(
            r#"
            INSERT INTO balance
                (ts, run_id, wallet, token, address, balance, balance_locked, fiat_value)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.ts)
        .bind(&record.run_id)
        .bind(&record.wallet)
        .bind(&record.token)
        .bind(&record.address)
        .bind(record.balance)
        .bind(record.balance_locked)
        .bind(record.fiat_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records from the last `days` days, newest first. `days == 0`
    /// returns the full history. The `run_id` tiebreak keeps records of
    /// one run contiguous even if two runs share a second.
    pub async fn query_window(&self, days: u32) -> Result<BalanceSet, Error> {
        self.ensure_schema().await?;
        let records: Vec<BalanceRecord> = if days > 0 {
            let cutoff = truncate_to_second(Utc::now() - TimeDelta::days(i64::from(days)));
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM balance WHERE ts >= ? ORDER BY ts DESC, run_id"
            ))
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM balance ORDER BY ts DESC, run_id"
            ))
            .fetch_all(&self.pool)
            .await?
        };
        log::debug!("Balance window query returned {} records", records.len());
        Ok(BalanceSet::new(records))
    }

    /// Records within an inclusive time range, ascending by time.
    pub async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BalanceSet, Error> {
        self.ensure_schema().await?;
        let records: Vec<BalanceRecord> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM balance WHERE ts BETWEEN ? AND ? ORDER BY ts ASC, run_id"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        log::debug!("Balance range query returned {} records", records.len());
        Ok(BalanceSet::new(records))
    }

    /// Cached provider coin id for a symbol, if one was ever resolved.
    pub async fn coin_id_for(&self, symbol: &str) -> Result<Option<String>, Error> {
        self.ensure_schema().await?;
        let coin_id = sqlx::query_scalar("SELECT coin_id FROM token_ids WHERE symbol = ?")
            .bind(symbol.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(coin_id)
    }

    /// Writes a symbol to coin-id mapping through to the cache table.
    pub async fn cache_coin_id(
        &self,
        symbol: &str,
        name: &str,
        coin_id: &str,
    ) -> Result<(), Error> {
        self.ensure_schema().await?;
        sqlx::query(
            r#"
            INSERT INTO token_ids (symbol, name, coin_id)
            VALUES (?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET name = excluded.name, coin_id = excluded.coin_id
            "#,
        )
        .bind(symbol.to_lowercase())
        .bind(name)
        .bind(coin_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: DateTime<Utc>, run_id: &str, token: &str, fiat_value: f64) -> BalanceRecord {
        BalanceRecord {
            ts,
            run_id: run_id.to_string(),
            wallet: "cold".to_string(),
            token: token.to_string(),
            address: "addr".to_string(),
            balance: 12.5,
            balance_locked: 2.5,
            fiat_value,
        }
    }

    #[tokio::test]
    async fn query_on_fresh_store_is_empty() {
        let store = BalanceStore::in_memory().await.unwrap();
        let set = store.query_window(7).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn insert_and_window_round_trip() {
        let store = BalanceStore::in_memory().await.unwrap();
        let now = truncate_to_second(Utc::now());
        let rec = record(now, "r1", "DOT", 80.5);
        store.insert_balance(&rec).await.unwrap();

        let set = store.query_window(1).await.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.entries()[0], rec);
    }

    #[tokio::test]
    async fn window_excludes_old_records_and_zero_means_all() {
        let store = BalanceStore::in_memory().await.unwrap();
        let now = truncate_to_second(Utc::now());
        let old = truncate_to_second(Utc::now() - TimeDelta::days(10));
        store.insert_balance(&record(now, "r1", "DOT", 10.0)).await.unwrap();
        store.insert_balance(&record(old, "r0", "DOT", 9.0)).await.unwrap();

        let recent = store.query_window(7).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent.entries()[0].run_id, "r1");

        let all = store.query_window(0).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first.
        assert_eq!(all.entries()[0].run_id, "r1");
    }

    #[tokio::test]
    async fn range_query_is_ascending() {
        let store = BalanceStore::in_memory().await.unwrap();
        let now = truncate_to_second(Utc::now());
        let earlier = now - TimeDelta::hours(2);
        store.insert_balance(&record(now, "r2", "KSM", 20.0)).await.unwrap();
        store.insert_balance(&record(earlier, "r1", "KSM", 19.0)).await.unwrap();

        let set = store
            .query_range(now - TimeDelta::hours(3), now)
            .await
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.entries()[0].run_id, "r1");
        assert_eq!(set.entries()[1].run_id, "r2");
    }

    #[tokio::test]
    async fn coin_id_cache_round_trip() {
        let store = BalanceStore::in_memory().await.unwrap();
        assert_eq!(store.coin_id_for("dot").await.unwrap(), None);

        store.cache_coin_id("DOT", "Polkadot", "polkadot").await.unwrap();
        assert_eq!(
            store.coin_id_for("dot").await.unwrap(),
            Some("polkadot".to_string())
        );
        // Lookup is case-insensitive through lowercasing.
        assert_eq!(
            store.coin_id_for("DOT").await.unwrap(),
            Some("polkadot".to_string())
        );

        // Re-caching overwrites.
        store.cache_coin_id("dot", "Polkadot", "polkadot-2").await.unwrap();
        assert_eq!(
            store.coin_id_for("dot").await.unwrap(),
            Some("polkadot-2".to_string())
        );
    }
}
