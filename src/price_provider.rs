//! Investment price history abstractions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which feed an investment's price history comes from. Each variant maps
/// to exactly one provider implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceFeed {
    Yahoo,
    Eodhd,
}

/// One daily dividend/split-adjusted closing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adj_close: f64,
}

#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Daily adjusted closes for `ticker` over `[from, to]`, oldest first.
    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>>;
}
