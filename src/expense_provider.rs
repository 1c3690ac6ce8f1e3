//! Shared-expense fetching boundary and the raw rows it produces.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// A raw shared expense as reported by the upstream service, before any
/// per-user filtering or currency conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct RawExpense {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub description: String,
    pub currency_code: String,
    pub category: ExpenseCategory,
    pub payment: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub group_id: Option<i64>,
    pub details: Option<String>,
    pub users: Vec<UserShare>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseCategory {
    pub name: String,
}

/// Per-user split of an expense. Shares arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct UserShare {
    pub user: UserRef,
    pub owed_share: Option<String>,
    pub paid_share: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: i64,
}

/// Fetches all expenses dated inside the half-open window `[from, to)`.
#[async_trait]
pub trait ExpenseProvider: Send + Sync {
    async fn fetch_expenses(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RawExpense>>;
}
