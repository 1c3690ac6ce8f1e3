//! Durable cache of exchange rates keyed by (date, currency).
//!
//! Rates are stored as `rate_per_base`: the amount of foreign currency equal
//! to one unit of the base currency. Converting an amount into the base
//! currency therefore divides by the rate. A (date, currency) pair is fetched
//! at most once; cached rates are never revised, even if the upstream source
//! would restate historical values.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Canonical on-disk column order. An existing file whose header differs is
/// rejected outright so a corrupt cache cannot be masked by fresh fetches.
const RATE_COLUMNS: [&str; 4] = ["date_curr", "date", "currency_code", "rate_per_base"];

/// Composite cache key, rendered as `{date}_{currency}` on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RateKey {
    pub date: NaiveDate,
    pub currency: String,
}

impl RateKey {
    pub fn new(date: NaiveDate, currency: &str) -> Self {
        RateKey {
            date,
            currency: currency.to_string(),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // NaiveDate displays as YYYY-MM-DD.
        write!(f, "{}_{}", self.date, self.currency)
    }
}

/// One fetched exchange rate, as returned by a rate provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub currency_code: String,
    pub rate_per_base: f64,
}

impl RateRecord {
    pub fn key(&self) -> RateKey {
        RateKey::new(self.date, &self.currency_code)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskRate {
    date_curr: String,
    date: NaiveDate,
    currency_code: String,
    rate_per_base: f64,
}

/// In-memory rate table, ordered by composite key so saves are deterministic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<RateKey, f64>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the persisted table. A missing file yields an empty table; an
    /// existing file with the wrong schema is a fatal configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No rate cache at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open rate cache: {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read rate cache header: {}", path.display()))?;
        if headers.iter().ne(RATE_COLUMNS) {
            bail!(
                "Rate cache {} has incorrect format: columns [{}] not [{}]",
                path.display(),
                headers.iter().collect::<Vec<_>>().join(", "),
                RATE_COLUMNS.join(", ")
            );
        }

        let mut table = Self::new();
        for row in reader.deserialize() {
            let row: DiskRate = row
                .with_context(|| format!("Malformed row in rate cache: {}", path.display()))?;
            table.rates.insert(
                RateKey::new(row.date, &row.currency_code),
                row.rate_per_base,
            );
        }
        debug!("Loaded {} cached rates from {}", table.len(), path.display());
        Ok(table)
    }

    /// Required pairs not yet cached. Pairs already present are excluded, so
    /// a complete cache produces an empty set and no network traffic.
    pub fn diff(&self, required: &BTreeSet<RateKey>) -> BTreeSet<RateKey> {
        required
            .iter()
            .filter(|key| !self.rates.contains_key(key))
            .cloned()
            .collect()
    }

    /// Folds freshly fetched records into the table. `diff` never requests a
    /// cached key so duplicates should not occur; if concurrent runs produce
    /// one anyway, the last write wins.
    pub fn merge(&mut self, records: impl IntoIterator<Item = RateRecord>) {
        for record in records {
            self.rates.insert(record.key(), record.rate_per_base);
        }
    }

    pub fn get(&self, key: &RateKey) -> Option<f64> {
        self.rates.get(key).copied()
    }

    pub fn contains(&self, key: &RateKey) -> bool {
        self.rates.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RateKey, f64)> {
        self.rates.iter().map(|(key, rate)| (key, *rate))
    }

    /// Overwrites the file wholesale: rows sorted by composite key, header
    /// always present. Writes to a sibling temp file first and renames it
    /// into place so a failed run never leaves a truncated cache behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("csv.tmp");
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp_path)
            .with_context(|| format!("Failed to create rate cache: {}", tmp_path.display()))?;
        writer.write_record(RATE_COLUMNS)?;
        for (key, rate) in &self.rates {
            writer.serialize(DiskRate {
                date_curr: key.to_string(),
                date: key.date,
                currency_code: key.currency.clone(),
                rate_per_base: *rate,
            })?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace rate cache: {}", path.display()))?;
        debug!("Saved {} rates to {}", self.len(), path.display());
        Ok(())
    }
}
