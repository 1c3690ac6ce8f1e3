//! Normalizes raw shared expenses into the working ledger.

use crate::expense_provider::RawExpense;
use anyhow::{Context, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One ledger row: the configured user's share of a shared expense.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub sub_subcategory: String,
    pub account: String,
    pub currency_code: String,
    pub owed: f64,
    pub paid: f64,
    pub group_id: i64,
    pub details: String,
}

#[derive(Debug, Deserialize)]
struct CategoryRow {
    sub_subcategory: String,
    subcategory: String,
}

/// Maps upstream category names (kept as `sub_subcategory`) onto the
/// user's own subcategories. Names without a mapping pass through
/// unchanged, so an incomplete map never drops information.
#[derive(Debug, Default)]
pub struct CategoryMap {
    subcategories: HashMap<String, String>,
}

impl CategoryMap {
    /// Reads a two-column CSV: `sub_subcategory,subcategory`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open categories file: {}", path.display()))?;
        let mut subcategories = HashMap::new();
        for row in reader.deserialize() {
            let row: CategoryRow = row
                .with_context(|| format!("Malformed row in categories file: {}", path.display()))?;
            subcategories.insert(row.sub_subcategory, row.subcategory);
        }
        debug!("Loaded {} category mappings", subcategories.len());
        Ok(CategoryMap { subcategories })
    }

    pub fn resolve(&self, sub_subcategory: &str) -> String {
        self.subcategories
            .get(sub_subcategory)
            .cloned()
            .unwrap_or_else(|| sub_subcategory.to_string())
    }
}

/// A ledger row with its base-currency amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedTransaction {
    pub transaction: Transaction,
    pub amount: f64,
}

/// Builds the ledger for one user: deleted expenses and settlement payments
/// are dropped, and only rows where the user actually owes something remain.
/// Output is sorted by date.
pub fn build_ledger(
    expenses: Vec<RawExpense>,
    user_id: i64,
    categories: &CategoryMap,
) -> Vec<Transaction> {
    let mut transactions: Vec<Transaction> = expenses
        .into_iter()
        .filter(|e| e.deleted_at.is_none() && !e.payment)
        .filter_map(|expense| {
            let share = expense.users.iter().find(|s| s.user.id == user_id)?;
            let owed = parse_share(share.owed_share.as_deref());
            if owed <= 0.0 {
                return None;
            }
            let paid = parse_share(share.paid_share.as_deref());
            let details = expense
                .details
                .as_deref()
                .unwrap_or("")
                .replace('\n', " ");
            Some(Transaction {
                id: expense.id,
                date: expense.date.date_naive(),
                description: expense.description,
                category: "Expense".to_string(),
                subcategory: categories.resolve(&expense.category.name),
                sub_subcategory: expense.category.name,
                account: account_from_details(&details).to_string(),
                currency_code: expense.currency_code,
                owed,
                paid,
                group_id: expense.group_id.unwrap_or(0),
                details,
            })
        })
        .collect();

    transactions.sort_by_key(|t| t.date);
    debug!("Built ledger with {} transactions", transactions.len());
    transactions
}

fn parse_share(share: Option<&str>) -> f64 {
    share.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

/// Which account a payment was taken from, inferred from the details text.
pub fn account_from_details(details: &str) -> &'static str {
    if details.to_lowercase().contains("paypal") {
        "PayPal"
    } else {
        "Current"
    }
}

/// Splits `[start, today]` into per-calendar-year fetch windows: the start
/// date to the end of its year, whole years in between, then the current
/// year up to tomorrow.
pub fn year_windows(start: NaiveDate, today: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let start_year = start.year();
    let this_year = today.year();
    let mut windows = vec![(
        start,
        NaiveDate::from_ymd_opt(start_year, 12, 31).unwrap(),
    )];
    for year in (start_year + 1)..this_year {
        windows.push((
            NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
        ));
    }
    windows.push((
        NaiveDate::from_ymd_opt(this_year, 1, 1).unwrap(),
        today.checked_add_days(Days::new(1)).unwrap(),
    ));
    windows
}

const LEDGER_COLUMNS: [&str; 13] = [
    "id",
    "date",
    "description",
    "category",
    "subcategory",
    "sub_subcategory",
    "account",
    "currency_code",
    "owed",
    "paid",
    "group_id",
    "details",
    "amount",
];

/// Writes the converted ledger wholesale, header first, dates as ISO. The
/// intermediate composite-key column never reaches this file.
pub fn write_ledger_csv(path: &Path, transactions: &[ConvertedTransaction]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create ledger file: {}", path.display()))?;
    writer.write_record(LEDGER_COLUMNS)?;
    for row in transactions {
        let t = &row.transaction;
        writer.write_record([
            t.id.to_string(),
            t.date.to_string(),
            t.description.clone(),
            t.category.clone(),
            t.subcategory.clone(),
            t.sub_subcategory.clone(),
            t.account.clone(),
            t.currency_code.clone(),
            t.owed.to_string(),
            t.paid.to_string(),
            t.group_id.to_string(),
            t.details.clone(),
            row.amount.to_string(),
        ])?;
    }
    writer.flush()?;
    debug!(
        "Wrote {} converted transactions to {}",
        transactions.len(),
        path.display()
    );
    Ok(())
}
