use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::expense_provider::{ExpenseProvider, RawExpense};

pub const DEFAULT_BASE_URL: &str = "https://secure.splitwise.com";

/// Shared expenses from the Splitwise REST API. The token comes from the
/// "API keys" section of a registered Splitwise OAuth client.
pub struct SplitwiseProvider {
    base_url: String,
    token: String,
}

impl SplitwiseProvider {
    pub fn new(base_url: &str, token: &str) -> Self {
        SplitwiseProvider {
            base_url: base_url.to_string(),
            token: token.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ExpensesResponse {
    expenses: Vec<RawExpense>,
}

#[async_trait]
impl ExpenseProvider for SplitwiseProvider {
    async fn fetch_expenses(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RawExpense>> {
        let url = format!("{}/api/v3.0/get_expenses", self.base_url);
        debug!("Requesting expenses {} to {} from {}", from, to, url);

        let client = reqwest::Client::builder()
            .user_agent("pennywise/1.0")
            .build()?;
        let response = client
            .get(&url)
            .query(&[
                ("dated_after", from.to_string()),
                ("dated_before", to.to_string()),
                // limit=0 disables pagination so one call covers the window.
                ("limit", "0".to_string()),
            ])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} fetching expenses", e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} fetching expenses {} to {}",
                response.status(),
                from,
                to
            ));
        }

        let data = response.json::<ExpensesResponse>().await?;
        debug!("Received {} raw expenses", data.expenses.len());
        Ok(data.expenses)
    }
}
