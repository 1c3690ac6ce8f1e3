//! Exchange-rate fetching boundary.

use crate::rates::RateRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Fetches rates relative to `base` for one date. Accepts one or more
/// currencies per call; the conversion engine relies on this to batch all
/// currencies seen on a date into a single request.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(
        &self,
        date: NaiveDate,
        currencies: &[String],
        base: &str,
    ) -> Result<Vec<RateRecord>>;
}
