use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::inflation::{InflationPoint, InflationProvider};

pub const DEFAULT_BASE_URL: &str = "https://www.ons.gov.uk";
const SERIES_URI: &str = "/economy/inflationandpriceindices/timeseries/l55o/mm23";

/// Monthly CPIH annual-rate series from the ONS time-series generator. The
/// CSV body mixes metadata, yearly and quarterly rows with the monthly ones;
/// only rows labelled like "2023 JAN" are monthly observations.
pub struct OnsProvider {
    base_url: String,
}

impl OnsProvider {
    pub fn new(base_url: &str) -> Self {
        OnsProvider {
            base_url: base_url.to_string(),
        }
    }
}

fn parse_month_label(label: &str) -> Option<NaiveDate> {
    let (year, month_name) = label.split_once(' ')?;
    let year: i32 = year.parse().ok()?;
    let month = match month_name {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[async_trait]
impl InflationProvider for OnsProvider {
    async fn fetch_monthly_rates(&self) -> Result<Vec<InflationPoint>> {
        let url = format!("{}/generator?format=csv&uri={}", self.base_url, SERIES_URI);
        debug!("Requesting inflation series from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("pennywise/1.0")
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} fetching inflation series", e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} fetching inflation series",
                response.status()
            ));
        }

        let body = response.text().await?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());
        let mut points = Vec::new();
        for record in reader.records() {
            let record = record?;
            let label = match record.get(0) {
                Some(label) => label,
                None => continue,
            };
            let month = match parse_month_label(label) {
                Some(month) => month,
                None => continue,
            };
            let rate = record
                .get(1)
                .and_then(|value| value.parse::<f64>().ok())
                .ok_or_else(|| anyhow!("Malformed inflation value for {}", label))?;
            points.push(InflationPoint { month, rate });
        }
        debug!("Parsed {} monthly inflation observations", points.len());
        Ok(points)
    }
}
