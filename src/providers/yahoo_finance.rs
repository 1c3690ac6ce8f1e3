use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::price_provider::{PriceHistoryProvider, PricePoint};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Daily price history from the Yahoo Finance CSV download endpoint.
pub struct YahooFinanceProvider {
    base_url: String,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Self {
        YahooFinanceProvider {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    // "null" on non-trading days, so parsed leniently below.
    #[serde(rename = "Adj Close")]
    adj_close: String,
}

#[async_trait]
impl PriceHistoryProvider for YahooFinanceProvider {
    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let period1 = from.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let period2 = to
            .checked_add_days(Days::new(1))
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        let url = format!(
            "{}/v7/finance/download/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url, ticker, period1, period2
        );
        debug!("Requesting price history from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("pennywise/1.0")
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for ticker: {}", e, ticker))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ticker: {}",
                response.status(),
                ticker
            ));
        }

        let body = response.text().await?;
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut points = Vec::new();
        for row in reader.deserialize() {
            let row: YahooRow =
                row.map_err(|e| anyhow!("Malformed price row for {}: {}", ticker, e))?;
            match row.adj_close.parse::<f64>() {
                Ok(adj_close) => points.push(PricePoint {
                    date: row.date,
                    adj_close,
                }),
                Err(_) => debug!("Skipping {} on {}: no close value", ticker, row.date),
            }
        }
        Ok(points)
    }
}
