//! Keeps a flat CSV of the monthly UK inflation series.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::fs;
use std::path::Path;
use tracing::info;

/// One monthly observation. `month` is the first day of the month.
#[derive(Debug, Clone, PartialEq)]
pub struct InflationPoint {
    pub month: NaiveDate,
    pub rate: f64,
}

#[async_trait]
pub trait InflationProvider: Send + Sync {
    /// The full monthly series, oldest first.
    async fn fetch_monthly_rates(&self) -> Result<Vec<InflationPoint>>;
}

/// Rewrites the inflation CSV with every observation from `min_date`'s month
/// onwards. Upstream restates recent values, so the file is replaced
/// wholesale instead of merged.
pub async fn refresh_inflation(
    provider: &dyn InflationProvider,
    output_file: &Path,
    min_date: NaiveDate,
) -> Result<()> {
    let min_month = min_date.with_day(1).unwrap();
    let mut points: Vec<InflationPoint> = provider
        .fetch_monthly_rates()
        .await
        .context("Failed to fetch inflation series")?
        .into_iter()
        .filter(|point| point.month >= min_month)
        .collect();
    points.sort_by_key(|point| point.month);

    if let Some(parent) = output_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let tmp_path = output_file.with_extension("csv.tmp");
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp_path)
        .with_context(|| format!("Failed to create inflation file: {}", tmp_path.display()))?;
    writer.write_record(["date", "inflation_rate"])?;
    for point in &points {
        writer.write_record([
            point.month.format("%Y-%m").to_string(),
            point.rate.to_string(),
        ])?;
    }
    writer.flush()?;
    drop(writer);
    fs::rename(&tmp_path, output_file)
        .with_context(|| format!("Failed to replace inflation file: {}", output_file.display()))?;

    info!(
        "Wrote {} inflation observations to {}",
        points.len(),
        output_file.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use tempfile::tempdir;

    struct MockInflationProvider {
        points: Vec<InflationPoint>,
        fail: bool,
    }

    #[async_trait]
    impl InflationProvider for MockInflationProvider {
        async fn fetch_monthly_rates(&self) -> Result<Vec<InflationPoint>> {
            if self.fail {
                return Err(anyhow!("Series unavailable"));
            }
            Ok(self.points.clone())
        }
    }

    fn point(month: &str, rate: f64) -> InflationPoint {
        InflationPoint {
            month: format!("{month}-01").parse().unwrap(),
            rate,
        }
    }

    #[tokio::test]
    async fn test_series_filtered_from_min_date_month() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("inflation.csv");
        let provider = MockInflationProvider {
            points: vec![
                point("2023-01", 8.8),
                point("2022-12", 9.2),
                point("2022-11", 9.4),
            ],
            fail: false,
        };

        // Mid-month start date still includes that month's observation.
        refresh_inflation(&provider, &output, "2022-12-15".parse().unwrap())
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&output).unwrap();
        assert_eq!(contents, "date,inflation_rate\n2022-12,9.2\n2023-01,8.8\n");
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("inflation.csv");
        let provider = MockInflationProvider {
            points: Vec::new(),
            fail: true,
        };

        let err = refresh_inflation(&provider, &output, "2022-01-01".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inflation series"), "{err}");
        assert!(!output.exists());
    }
}
