//! Core data model: transient balance and price structs produced during a
//! pipeline run, the persisted [`BalanceRecord`], and the sampling algebra
//! over sets of records.
//!
//! All [`BalanceSet`] transformations are pure and return new sets; the
//! backing records are append-only and never mutated after a run writes
//! them.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Timelike, Utc};

/// Sentinel wallet/address label for records merged by grouping.
pub const GROUPED: &str = "Grouped";

/// Drops the sub-second part of a timestamp. Run timestamps and query
/// cutoffs go through this so their stored encodings compare cleanly.
pub fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// One token balance as reported by a balance source, before pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub wallet: String,
    pub symbol: String,
    pub address: String,
    pub balance: f64,
    pub locked: f64,
}

/// Price of a single token in the configured fiat currency.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPrice {
    pub token: String,
    pub price: f32,
    pub fiat: String,
}

/// Resolved prices for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct TokenPrices {
    pub entries: Vec<TokenPrice>,
}

impl TokenPrices {
    /// Price for a token (case-insensitive), or 0.0 when it was never
    /// resolved.
    pub fn price_for(&self, token: &str) -> f64 {
        for entry in &self.entries {
            if entry.token.eq_ignore_ascii_case(token) {
                return f64::from(entry.price);
            }
        }
        log::warn!("Price not found for {}", token);
        0.0
    }
}

/// One persisted balance observation.
///
/// Every record of a run shares the same second-truncated `ts` and the
/// same `run_id`; the fiat value is frozen at write time and never
/// recomputed against later prices.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BalanceRecord {
    pub ts: DateTime<Utc>,
    pub run_id: String,
    pub wallet: String,
    pub token: String,
    pub address: String,
    pub balance: f64,
    pub balance_locked: f64,
    pub fiat_value: f64,
}

impl BalanceRecord {
    /// Uniqueness key of this record within one run.
    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.wallet, self.token, self.address)
    }

    /// Address shortened for display, keeping both ends.
    pub fn short_addr(&self) -> String {
        if self.address.len() < 12 {
            return self.address.clone();
        }
        format!(
            "{}...{}",
            &self.address[..4],
            &self.address[self.address.len() - 4..]
        )
    }

    /// Implied unit price frozen into this record.
    pub fn price_per_token(&self) -> f64 {
        self.fiat_value / self.balance
    }

    /// Sum of two records under the grouped sentinel labels.
    fn merge(&self, other: &BalanceRecord) -> BalanceRecord {
        BalanceRecord {
            ts: self.ts,
            run_id: self.run_id.clone(),
            wallet: GROUPED.to_string(),
            token: self.token.clone(),
            address: GROUPED.to_string(),
            balance: self.balance + other.balance,
            balance_locked: self.balance_locked + other.balance_locked,
            fiat_value: self.fiat_value + other.fiat_value,
        }
    }
}

/// An in-memory, ordered view over balance records.
///
/// Sets loaded from the store arrive newest-first; sampling relies on
/// records of one run being contiguous.
#[derive(Debug, Clone, Default)]
pub struct BalanceSet {
    entries: Vec<BalanceRecord>,
}

impl BalanceSet {
    pub fn new(entries: Vec<BalanceRecord>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[BalanceRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the run whose timestamp lies closest to `now - offset` and
    /// returns all of its records. Empty in, empty out.
    pub fn closest_sample(&self, offset: TimeDelta) -> BalanceSet {
        let Some(first) = self.entries.first() else {
            return BalanceSet::default();
        };
        let target = Utc::now() - offset;
        let mut best = first;
        let mut best_delta = (target - first.ts).abs();
        for entry in &self.entries {
            let delta = (target - entry.ts).abs();
            if delta < best_delta {
                best_delta = delta;
                best = entry;
            }
        }
        let run_id = best.run_id.clone();
        BalanceSet::new(
            self.entries
                .iter()
                .filter(|e| e.run_id == run_id)
                .cloned()
                .collect(),
        )
    }

    /// The most recent run in the set.
    pub fn last_sample(&self) -> BalanceSet {
        self.closest_sample(TimeDelta::zero())
    }

    /// Two closest samples concatenated, the nearer-to-now one first.
    pub fn sample_pair(&self, start: TimeDelta, end: TimeDelta) -> BalanceSet {
        let mut entries = self.closest_sample(start).entries;
        entries.extend(self.closest_sample(end).entries);
        BalanceSet::new(entries)
    }

    /// Fixed-interval series walking back from now: `amount - 1` samples,
    /// step `i` taken at offset `i * interval`. Steps with no nearby run
    /// simply repeat whatever run is closest; an empty set yields empty
    /// samples.
    pub fn time_series(&self, amount: usize, interval: TimeDelta) -> Vec<BalanceSet> {
        let mut series = Vec::new();
        let mut offset = TimeDelta::zero();
        for _ in 1..amount {
            series.push(self.closest_sample(offset));
            offset += interval;
        }
        series
    }

    /// Collapses each run block into one record per symbol, summing
    /// balances, locked amounts and fiat values. Merged records adopt the
    /// [`GROUPED`] sentinel labels; a symbol with a single record passes
    /// through unchanged. First-seen symbol order is preserved.
    pub fn group_by_symbol(&self) -> BalanceSet {
        let mut grouped: Vec<BalanceRecord> = Vec::new();
        let mut block: Vec<BalanceRecord> = Vec::new();
        let mut current_run: Option<String> = None;
        for entry in &self.entries {
            if current_run.as_deref() != Some(entry.run_id.as_str()) {
                grouped.append(&mut block);
                current_run = Some(entry.run_id.clone());
            }
            match block
                .iter_mut()
                .find(|b| b.token.eq_ignore_ascii_case(&entry.token))
            {
                Some(existing) => *existing = existing.merge(entry),
                None => block.push(entry.clone()),
            }
        }
        grouped.append(&mut block);
        BalanceSet::new(grouped)
    }

    pub fn filter_token(&self, token: &str) -> BalanceSet {
        BalanceSet::new(
            self.entries
                .iter()
                .filter(|e| e.token.eq_ignore_ascii_case(token))
                .cloned()
                .collect(),
        )
    }

    pub fn filter_wallet(&self, name: &str) -> BalanceSet {
        BalanceSet::new(
            self.entries
                .iter()
                .filter(|e| e.wallet.eq_ignore_ascii_case(name))
                .cloned()
                .collect(),
        )
    }

    pub fn filter_id(&self, id: &str) -> BalanceSet {
        BalanceSet::new(
            self.entries
                .iter()
                .filter(|e| e.id() == id)
                .cloned()
                .collect(),
        )
    }

    /// Unique token symbols, uppercased, in first-seen order.
    pub fn tokens(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for entry in &self.entries {
            let symbol = entry.token.to_uppercase();
            if seen.insert(symbol.clone()) {
                tokens.push(symbol);
            }
        }
        tokens
    }

    /// Unique wallet names in first-seen order.
    pub fn wallets(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut wallets = Vec::new();
        for entry in &self.entries {
            if seen.insert(entry.wallet.clone()) {
                wallets.push(entry.wallet.clone());
            }
        }
        wallets
    }

    /// Sum of fiat values counting each `(wallet, token, address)` key
    /// once, so accidental duplicates cannot inflate the total.
    pub fn total_fiat_value(&self) -> f64 {
        let mut seen = HashSet::new();
        let mut total = 0.0;
        for entry in &self.entries {
            if seen.insert(entry.id()) {
                total += entry.fiat_value;
            }
        }
        total
    }

    /// Portfolio-wide fiat change between now and `days` ago, as a
    /// fraction (0.10 means +10%). Equal or missing totals yield 0.
    pub fn total_fiat_change(&self, days: i64) -> f64 {
        let start = self.last_sample().total_fiat_value();
        let end = self.closest_sample(TimeDelta::days(days)).total_fiat_value();
        if start == end {
            return 0.0;
        }
        start / end - 1.0
    }

    /// Fiat value change for one token between now and `days` ago.
    pub fn fiat_value_change(&self, token: &str, days: i64) -> f64 {
        let tuple = self
            .sample_pair(TimeDelta::zero(), TimeDelta::days(days))
            .group_by_symbol()
            .filter_token(token);
        let entries = tuple.entries();
        if entries.len() < 2 {
            return 0.0;
        }
        let start = entries[0].fiat_value;
        let end = entries[entries.len() - 1].fiat_value;
        start / end - 1.0
    }

    /// Unit price change for one token between now and `days` ago.
    pub fn price_change(&self, token: &str, days: i64) -> f64 {
        let tuple = self
            .sample_pair(TimeDelta::zero(), TimeDelta::days(days))
            .group_by_symbol()
            .filter_token(token);
        let entries = tuple.entries();
        if entries.len() < 2 {
            return 0.0;
        }
        let start = entries[0].price_per_token();
        let end = entries[entries.len() - 1].price_per_token();
        start / end - 1.0
    }

    /// Balance change for one record id between now and `days` ago.
    /// Id-based comparisons stay ungrouped so the key survives intact.
    pub fn balance_change(&self, id: &str, days: i64) -> f64 {
        let tuple = self
            .sample_pair(TimeDelta::zero(), TimeDelta::days(days))
            .filter_id(id);
        let entries = tuple.entries();
        if entries.len() < 2 {
            return 0.0;
        }
        let start = entries[0].balance;
        let end = entries[entries.len() - 1].balance;
        start / end - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        ts: DateTime<Utc>,
        run_id: &str,
        wallet: &str,
        token: &str,
        address: &str,
        balance: f64,
        fiat_value: f64,
    ) -> BalanceRecord {
        BalanceRecord {
            ts,
            run_id: run_id.to_string(),
            wallet: wallet.to_string(),
            token: token.to_string(),
            address: address.to_string(),
            balance,
            balance_locked: 0.0,
            fiat_value,
        }
    }

    fn minutes_ago(minutes: i64) -> DateTime<Utc> {
        Utc::now() - TimeDelta::minutes(minutes)
    }

    #[test]
    fn total_fiat_value_ignores_duplicate_keys() {
        let ts = minutes_ago(1);
        let one = record(ts, "r1", "cold", "DOT", "addr1", 10.0, 50.0);
        let set = BalanceSet::new(vec![
            one.clone(),
            one.clone(),
            record(ts, "r1", "cold", "KSM", "addr2", 5.0, 30.0),
        ]);
        assert_eq!(set.total_fiat_value(), 80.0);
    }

    #[test]
    fn closest_sample_picks_nearest_run() {
        let recent = minutes_ago(10);
        let old = minutes_ago(60 * 48);
        let set = BalanceSet::new(vec![
            record(recent, "r-new", "cold", "DOT", "a", 10.0, 50.0),
            record(recent, "r-new", "cold", "KSM", "b", 1.0, 20.0),
            record(old, "r-old", "cold", "DOT", "a", 9.0, 40.0),
        ]);

        let now_sample = set.closest_sample(TimeDelta::zero());
        assert_eq!(now_sample.len(), 2);
        assert!(now_sample.entries().iter().all(|e| e.run_id == "r-new"));

        let past_sample = set.closest_sample(TimeDelta::days(2));
        assert_eq!(past_sample.len(), 1);
        assert_eq!(past_sample.entries()[0].run_id, "r-old");
    }

    #[test]
    fn closest_sample_on_empty_set_is_empty() {
        let set = BalanceSet::default();
        assert!(set.closest_sample(TimeDelta::zero()).is_empty());
        assert_eq!(set.fiat_value_change("DOT", 7), 0.0);
        assert_eq!(set.total_fiat_change(7), 0.0);
    }

    #[test]
    fn time_series_yields_one_less_than_amount() {
        let set = BalanceSet::new(vec![record(
            minutes_ago(1),
            "r1",
            "cold",
            "DOT",
            "a",
            1.0,
            10.0,
        )]);
        assert_eq!(set.time_series(5, TimeDelta::hours(24)).len(), 4);
        assert_eq!(set.time_series(1, TimeDelta::hours(24)).len(), 0);
        assert_eq!(set.time_series(0, TimeDelta::hours(24)).len(), 0);
    }

    #[test]
    fn group_by_symbol_sums_within_a_run() {
        let ts = minutes_ago(5);
        let set = BalanceSet::new(vec![
            record(ts, "r1", "cold", "DOT", "a", 10.0, 50.0),
            record(ts, "r1", "hot", "dot", "b", 5.0, 25.0),
            record(ts, "r1", "cold", "KSM", "c", 2.0, 40.0),
        ]);
        let grouped = set.group_by_symbol();
        assert_eq!(grouped.len(), 2);

        let dot = &grouped.entries()[0];
        assert_eq!(dot.wallet, GROUPED);
        assert_eq!(dot.address, GROUPED);
        assert_eq!(dot.balance, 15.0);
        assert_eq!(dot.fiat_value, 75.0);

        // A lone symbol keeps its own labels.
        let ksm = &grouped.entries()[1];
        assert_eq!(ksm.wallet, "cold");
        assert_eq!(ksm.address, "c");
    }

    #[test]
    fn group_by_symbol_keeps_runs_apart() {
        let recent = minutes_ago(10);
        let old = minutes_ago(60 * 24);
        let set = BalanceSet::new(vec![
            record(recent, "r-new", "cold", "DOT", "a", 10.0, 110.0),
            record(old, "r-old", "cold", "DOT", "a", 10.0, 100.0),
        ]);
        let grouped = set.group_by_symbol();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.entries()[0].fiat_value, 110.0);
        assert_eq!(grouped.entries()[1].fiat_value, 100.0);
    }

    #[test]
    fn percent_change_orientation() {
        let recent = minutes_ago(10);
        let old = minutes_ago(60 * 24);
        let set = BalanceSet::new(vec![
            record(recent, "r-new", "cold", "DOT", "a", 10.0, 110.0),
            record(old, "r-old", "cold", "DOT", "a", 10.0, 100.0),
        ]);
        let change = set.total_fiat_change(1);
        assert!((change - 0.10).abs() < 1e-9);

        let token_change = set.fiat_value_change("DOT", 1);
        assert!((token_change - 0.10).abs() < 1e-9);
    }

    #[test]
    fn change_queries_with_a_single_run_are_zero() {
        let ts = minutes_ago(10);
        let set = BalanceSet::new(vec![record(ts, "r1", "cold", "DOT", "a", 10.0, 110.0)]);
        assert_eq!(set.fiat_value_change("DOT", 7), 0.0);
        assert_eq!(set.balance_change("cold/DOT/a", 7), 0.0);
        assert_eq!(set.total_fiat_change(7), 0.0);
    }

    #[test]
    fn balance_change_matches_raw_id() {
        let recent = minutes_ago(10);
        let old = minutes_ago(60 * 24);
        let set = BalanceSet::new(vec![
            record(recent, "r-new", "cold", "DOT", "a", 12.0, 120.0),
            record(recent, "r-new", "hot", "DOT", "b", 1.0, 10.0),
            record(old, "r-old", "cold", "DOT", "a", 10.0, 100.0),
            record(old, "r-old", "hot", "DOT", "b", 1.0, 10.0),
        ]);
        let change = set.balance_change("cold/DOT/a", 1);
        assert!((change - 0.20).abs() < 1e-9);
    }

    #[test]
    fn filters_are_case_insensitive() {
        let ts = minutes_ago(1);
        let set = BalanceSet::new(vec![
            record(ts, "r1", "Cold", "DOT", "a", 1.0, 10.0),
            record(ts, "r1", "hot", "ksm", "b", 1.0, 10.0),
        ]);
        assert_eq!(set.filter_token("dot").len(), 1);
        assert_eq!(set.filter_wallet("cold").len(), 1);
        assert_eq!(set.tokens(), vec!["DOT".to_string(), "KSM".to_string()]);
        assert_eq!(
            set.wallets(),
            vec!["Cold".to_string(), "hot".to_string()]
        );
    }

    #[test]
    fn short_addr_keeps_both_ends() {
        let mut rec = record(minutes_ago(1), "r1", "w", "DOT", "short", 1.0, 1.0);
        assert_eq!(rec.short_addr(), "short");
        rec.address = "1DEP8i3QJCsomS4BSMY2RpU1upv62aGvhD".to_string();
        assert_eq!(rec.short_addr(), "1DEP...GvhD");
    }

    #[test]
    fn truncate_to_second_drops_sub_second_part() {
        let ts = Utc::now();
        let truncated = truncate_to_second(ts);
        assert_eq!(truncated.nanosecond(), 0);
        assert_eq!(truncated.timestamp(), ts.timestamp());
    }

    #[test]
    fn price_for_missing_token_is_zero() {
        let prices = TokenPrices {
            entries: vec![TokenPrice {
                token: "DOT".to_string(),
                price: 5.5,
                fiat: "usd".to_string(),
            }],
        };
        assert_eq!(prices.price_for("dot"), 5.5);
        assert_eq!(prices.price_for("KSM"), 0.0);
    }
}
