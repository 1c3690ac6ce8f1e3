use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::price_provider::{PriceHistoryProvider, PricePoint};

pub const DEFAULT_BASE_URL: &str = "https://eodhistoricaldata.com";

/// End-of-day price history from EODHD. Requires an API token.
pub struct EodhdProvider {
    base_url: String,
    api_token: String,
}

impl EodhdProvider {
    pub fn new(base_url: &str, api_token: &str) -> Self {
        EodhdProvider {
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct EodhdRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Adjusted_close")]
    adjusted_close: f64,
}

#[async_trait]
impl PriceHistoryProvider for EodhdProvider {
    async fn fetch_daily_closes(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let url = format!("{}/api/eod/{}", self.base_url, ticker);
        debug!("Requesting price history from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("pennywise/1.0")
            .build()?;
        let from_param = from.to_string();
        let to_param = to.to_string();
        let response = client
            .get(&url)
            .query(&[
                ("api_token", self.api_token.as_str()),
                ("fmt", "csv"),
                ("period", "d"),
                ("from", from_param.as_str()),
                ("to", to_param.as_str()),
            ])
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
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut points = Vec::new();
        for row in reader.deserialize() {
            let row: EodhdRow =
                row.map_err(|e| anyhow!("Malformed price row for {}: {}", ticker, e))?;
            points.push(PricePoint {
                date: row.date,
                adj_close: row.adjusted_close,
            });
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_successful_history_fetch() {
        let mock_server = MockServer::start().await;
        let mock_response = "\
Date,Open,High,Low,Close,Adjusted_close,Volume
2023-06-01,94.0,95.5,93.8,95.0,95.0,1200
2023-06-02,95.0,97.0,94.9,96.5,96.1,900
";

        Mock::given(method("GET"))
            .and(path("/api/eod/VMID.L"))
            .and(query_param("api_token", "test-token"))
            .and(query_param("fmt", "csv"))
            .and(query_param("from", "2023-06-01"))
            .and(query_param("to", "2023-06-02"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let provider = EodhdProvider::new(&mock_server.uri(), "test-token");
        let points = provider
            .fetch_daily_closes("VMID.L", date("2023-06-01"), date("2023-06-02"))
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].date, date("2023-06-02"));
        assert_eq!(points[1].adj_close, 96.1);
    }

    #[tokio::test]
    async fn test_empty_body_yields_no_points() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/eod/NEW.L"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&mock_server)
            .await;

        let provider = EodhdProvider::new(&mock_server.uri(), "test-token");
        let points = provider
            .fetch_daily_closes("NEW.L", date("2023-06-01"), date("2023-06-02"))
            .await
            .unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/eod/BAD"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let provider = EodhdProvider::new(&mock_server.uri(), "bad-token");
        let result = provider
            .fetch_daily_closes("BAD", date("2023-06-01"), date("2023-06-02"))
            .await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 403 Forbidden for ticker: BAD"
        );
    }
}
