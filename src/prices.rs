//! Maintains one CSV of daily adjusted closes per tracked investment.

use crate::config::Investment;
use crate::price_provider::{PriceFeed, PriceHistoryProvider, PricePoint};
use crate::ui;
use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Refreshes the price history file of every investment. Histories already
/// covering `today` are left alone; stale files only fetch the dates after
/// their newest row and are rewritten whole.
pub async fn refresh_price_histories(
    investments: &[Investment],
    yahoo: &dyn PriceHistoryProvider,
    eodhd: &dyn PriceHistoryProvider,
    prices_dir: &Path,
    today: NaiveDate,
) -> Result<()> {
    fs::create_dir_all(prices_dir)
        .with_context(|| format!("Failed to create directory: {}", prices_dir.display()))?;

    let pb = ui::new_progress_bar(investments.len() as u64);
    pb.set_message("Updating price histories...");

    for investment in investments {
        let provider = match investment.source {
            PriceFeed::Yahoo => yahoo,
            PriceFeed::Eodhd => eodhd,
        };
        refresh_one(investment, provider, prices_dir, today).await?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

pub fn history_file(prices_dir: &Path, investment: &Investment) -> PathBuf {
    prices_dir.join(format!("{}-{}.csv", investment.ticker, investment.name))
}

async fn refresh_one(
    investment: &Investment,
    provider: &dyn PriceHistoryProvider,
    prices_dir: &Path,
    today: NaiveDate,
) -> Result<()> {
    let path = history_file(prices_dir, investment);

    let mut history = if path.exists() {
        load_history(&path)?
    } else {
        Vec::new()
    };

    let fetch_from = match history.last() {
        Some(newest) => {
            let next = newest.date.checked_add_days(Days::new(1)).unwrap();
            if next > today {
                debug!("{} already up to date", investment.ticker);
                return Ok(());
            }
            next
        }
        None => investment.start_date,
    };

    let fetched = provider
        .fetch_daily_closes(&investment.ticker, fetch_from, today)
        .await
        .with_context(|| format!("Failed to fetch prices for {}", investment.ticker))?;
    info!(
        "Fetched {} price(s) for {} from {}",
        fetched.len(),
        investment.ticker,
        fetch_from
    );

    history.extend(fetched);
    history.sort_by_key(|point| point.date);
    history.dedup_by_key(|point| point.date);
    save_history(&path, &history)
}

fn load_history(path: &Path) -> Result<Vec<PricePoint>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open price history: {}", path.display()))?;
    let mut history = Vec::new();
    for row in reader.deserialize() {
        let point: PricePoint =
            row.with_context(|| format!("Malformed row in price history: {}", path.display()))?;
        history.push(point);
    }
    history.sort_by_key(|point| point.date);
    Ok(history)
}

fn save_history(path: &Path, history: &[PricePoint]) -> Result<()> {
    let tmp_path = path.with_extension("csv.tmp");
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp_path)
        .with_context(|| format!("Failed to create price history: {}", tmp_path.display()))?;
    writer.write_record(["date", "adj_close"])?;
    for point in history {
        writer.serialize(point)?;
    }
    writer.flush()?;
    drop(writer);
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace price history: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MockHistoryProvider {
        points: Vec<PricePoint>,
        call_count: AtomicUsize,
        requested_ranges: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl MockHistoryProvider {
        fn new(points: Vec<PricePoint>) -> Self {
            Self {
                points,
                call_count: AtomicUsize::new(0),
                requested_ranges: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceHistoryProvider for MockHistoryProvider {
        async fn fetch_daily_closes(
            &self,
            _ticker: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<PricePoint>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.requested_ranges.lock().unwrap().push((from, to));
            Ok(self
                .points
                .iter()
                .filter(|p| p.date >= from && p.date <= to)
                .cloned()
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl PriceHistoryProvider for FailingProvider {
        async fn fetch_daily_closes(
            &self,
            _ticker: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<PricePoint>> {
            Err(anyhow!("Feed unavailable"))
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn point(day: &str, adj_close: f64) -> PricePoint {
        PricePoint {
            date: date(day),
            adj_close,
        }
    }

    fn investment(source: PriceFeed) -> Investment {
        Investment {
            ticker: "VWRL.L".to_string(),
            name: "FTSE All-World".to_string(),
            source,
            start_date: date("2023-06-01"),
        }
    }

    #[tokio::test]
    async fn test_initial_fetch_creates_file() {
        let dir = tempdir().unwrap();
        let yahoo = MockHistoryProvider::new(vec![
            point("2023-06-01", 95.0),
            point("2023-06-02", 96.5),
        ]);
        let investments = vec![investment(PriceFeed::Yahoo)];

        refresh_price_histories(
            &investments,
            &yahoo,
            &FailingProvider,
            dir.path(),
            date("2023-06-02"),
        )
        .await
        .unwrap();

        assert_eq!(yahoo.calls(), 1);
        assert_eq!(
            yahoo.requested_ranges.lock().unwrap()[0],
            (date("2023-06-01"), date("2023-06-02"))
        );
        let history = load_history(&history_file(dir.path(), &investments[0])).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], point("2023-06-02", 96.5));
    }

    #[tokio::test]
    async fn test_up_to_date_history_skips_fetch() {
        let dir = tempdir().unwrap();
        let investments = vec![investment(PriceFeed::Yahoo)];
        let path = history_file(dir.path(), &investments[0]);
        save_history(&path, &[point("2023-06-02", 96.5)]).unwrap();

        let yahoo = MockHistoryProvider::new(vec![]);
        refresh_price_histories(
            &investments,
            &yahoo,
            &FailingProvider,
            dir.path(),
            date("2023-06-02"),
        )
        .await
        .unwrap();

        assert_eq!(yahoo.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_history_fetches_tail_only() {
        let dir = tempdir().unwrap();
        let investments = vec![investment(PriceFeed::Eodhd)];
        let path = history_file(dir.path(), &investments[0]);
        save_history(
            &path,
            &[point("2023-06-01", 95.0), point("2023-06-02", 96.5)],
        )
        .unwrap();

        let eodhd = MockHistoryProvider::new(vec![
            point("2023-06-03", 97.0),
            point("2023-06-04", 98.0),
        ]);
        refresh_price_histories(
            &investments,
            &FailingProvider,
            &eodhd,
            dir.path(),
            date("2023-06-04"),
        )
        .await
        .unwrap();

        assert_eq!(eodhd.calls(), 1);
        assert_eq!(
            eodhd.requested_ranges.lock().unwrap()[0],
            (date("2023-06-03"), date("2023-06-04"))
        );
        let history = load_history(&path).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3], point("2023-06-04", 98.0));
    }

    #[tokio::test]
    async fn test_feed_error_propagates() {
        let dir = tempdir().unwrap();
        let investments = vec![investment(PriceFeed::Yahoo)];

        let err = refresh_price_histories(
            &investments,
            &FailingProvider,
            &FailingProvider,
            dir.path(),
            date("2023-06-02"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("VWRL.L"), "{err}");
    }
}
