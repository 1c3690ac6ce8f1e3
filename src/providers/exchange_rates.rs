use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::rate_provider::RateProvider;
use crate::rates::RateRecord;

pub const DEFAULT_BASE_URL: &str = "https://api.apilayer.com/exchangerates_data";

/// Historical exchange rates from the apilayer `exchangerates_data` API.
/// One request returns the rates of any number of currencies against the
/// base for a single date.
pub struct ExchangeRatesApi {
    base_url: String,
    api_key: String,
}

impl ExchangeRatesApi {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ExchangeRatesApi {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for ExchangeRatesApi {
    async fn fetch_rates(
        &self,
        date: NaiveDate,
        currencies: &[String],
        base: &str,
    ) -> Result<Vec<RateRecord>> {
        let url = format!("{}/{}", self.base_url, date);
        debug!("Requesting exchange rates from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("pennywise/1.0")
            .build()?;
        let response = client
            .get(&url)
            .query(&[("symbols", currencies.join(",")), ("base", base.to_string())])
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for rates on {}", e, date))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} fetching rates for {}",
                response.status(),
                date
            ));
        }

        let text = response.text().await?;
        let data: RatesResponse = serde_json::from_str(&text)
            .with_context(|| format!("Unexpected rates response for {date}: {text}"))?;
        Ok(data
            .rates
            .into_iter()
            .map(|(currency_code, rate_per_base)| RateRecord {
                date,
                currency_code,
                rate_per_base,
            })
            .collect())
    }
}
