//! Converts a mixed-currency ledger into the base currency, fetching and
//! caching only the exchange rates not already persisted.

use crate::ledger::{ConvertedTransaction, Transaction};
use crate::rate_provider::RateProvider;
use crate::rates::{RateKey, RateTable};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// The converted ledger plus how many rate requests the run issued. The
/// count is an explicit return value so callers and tests can assert on it
/// without any process-global state.
#[derive(Debug)]
pub struct ConvertedLedger {
    pub transactions: Vec<ConvertedTransaction>,
    pub fetch_calls: usize,
}

/// Converts every transaction into `base_currency`, keeping the rate cache
/// at `rate_file` up to date.
///
/// Missing (date, currency) pairs are grouped by date so one request covers
/// all currencies seen on that date. The merged cache is persisted before
/// any conversion happens, so fetched rates survive even if a later step of
/// the run fails. Rows whose rate cannot be resolved after the fetch are
/// converted at 1.0 with a warning rather than aborting the run.
pub async fn convert_to_base(
    transactions: Vec<Transaction>,
    base_currency: &str,
    rate_file: &Path,
    provider: &dyn RateProvider,
) -> Result<ConvertedLedger> {
    if transactions.is_empty() {
        return Ok(ConvertedLedger {
            transactions: Vec::new(),
            fetch_calls: 0,
        });
    }

    // A malformed cache aborts here, before any network traffic.
    let mut table = RateTable::load(rate_file)?;

    let required: BTreeSet<RateKey> = transactions
        .iter()
        .filter(|t| t.currency_code != base_currency)
        .map(|t| RateKey::new(t.date, &t.currency_code))
        .collect();
    let missing = table.diff(&required);
    debug!(
        "{} rate pairs required, {} missing from cache",
        required.len(),
        missing.len()
    );

    let mut fetch_calls = 0;
    if !missing.is_empty() {
        let mut by_date: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
        for key in missing {
            by_date.entry(key.date).or_default().push(key.currency);
        }

        let mut fetched = Vec::new();
        for (date, currencies) in by_date {
            debug!("Fetching {} rate(s) for {}", currencies.len(), date);
            let records = provider
                .fetch_rates(date, &currencies, base_currency)
                .await
                .with_context(|| format!("Failed to fetch exchange rates for {date}"))?;
            fetch_calls += 1;
            fetched.extend(records);
        }

        table.merge(fetched);
        table
            .save(rate_file)
            .with_context(|| format!("Failed to persist rate cache: {}", rate_file.display()))?;
    }

    let mut converted: Vec<ConvertedTransaction> = transactions
        .into_iter()
        .map(|transaction| {
            let rate = resolve_rate(&table, &transaction, base_currency);
            ConvertedTransaction {
                amount: transaction.owed / rate,
                transaction,
            }
        })
        .collect();
    // Stable sort: same-day rows keep their input order.
    converted.sort_by_key(|row| row.transaction.date);

    Ok(ConvertedLedger {
        transactions: converted,
        fetch_calls,
    })
}

fn resolve_rate(table: &RateTable, transaction: &Transaction, base_currency: &str) -> f64 {
    if transaction.currency_code == base_currency {
        return 1.0;
    }
    match table.get(&RateKey::new(transaction.date, &transaction.currency_code)) {
        Some(rate) => rate,
        None => {
            warn!(
                date = %transaction.date,
                currency = %transaction.currency_code,
                "No exchange rate resolved; converting at 1.0"
            );
            1.0
        }
    }
}
