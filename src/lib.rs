pub mod config;
pub mod convert;
pub mod expense_provider;
pub mod inflation;
pub mod ledger;
pub mod log;
pub mod price_provider;
pub mod prices;
pub mod providers;
pub mod rate_provider;
pub mod rates;
pub mod summary;
pub mod ui;

use crate::config::AppConfig;
use crate::expense_provider::ExpenseProvider;
use crate::price_provider::PriceFeed;
use crate::providers::{eodhd, exchange_rates, ons, splitwise, yahoo_finance};
use crate::summary::LedgerSummary;
use anyhow::{bail, Result};
use chrono::Local;
use futures::future::join_all;
use tracing::{debug, info};

pub enum AppCommand {
    /// Fetch shared expenses, convert to the base currency, write the ledger.
    Expenses,
    /// Refresh per-investment price history files.
    Prices,
    /// Refresh the monthly inflation series file.
    Inflation,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    match command {
        AppCommand::Expenses => refresh_expenses(&config).await,
        AppCommand::Prices => refresh_prices(&config).await,
        AppCommand::Inflation => refresh_inflation(&config).await,
    }
}

async fn refresh_expenses(config: &AppConfig) -> Result<()> {
    info!("Refreshing expense ledger...");

    let splitwise_url = config
        .providers
        .splitwise
        .as_ref()
        .map_or(splitwise::DEFAULT_BASE_URL, |p| &p.base_url);
    let expense_provider = splitwise::SplitwiseProvider::new(splitwise_url, &config.splitwise_token);

    let rates_url = config
        .providers
        .exchange_rates
        .as_ref()
        .map_or(exchange_rates::DEFAULT_BASE_URL, |p| &p.base_url);
    let rate_provider =
        exchange_rates::ExchangeRatesApi::new(rates_url, &config.exchange_rates_token);

    let today = Local::now().date_naive();
    let windows = ledger::year_windows(config.start_date, today);
    debug!("Fetching expenses across {} windows", windows.len());

    let pb = ui::new_progress_bar(windows.len() as u64);
    pb.set_message("Fetching expenses...");
    let fetches = windows.iter().map(|(from, to)| {
        let pb = pb.clone();
        let provider = &expense_provider;
        async move {
            let result = provider.fetch_expenses(*from, *to).await;
            pb.inc(1);
            result
        }
    });
    let results = join_all(fetches).await;
    pb.finish_and_clear();

    let mut raw_expenses = Vec::new();
    for result in results {
        raw_expenses.extend(result?);
    }

    let categories = match &config.categories_file {
        Some(path) => ledger::CategoryMap::load(path)?,
        None => ledger::CategoryMap::default(),
    };
    let transactions = ledger::build_ledger(raw_expenses, config.user_id, &categories);
    let outcome = convert::convert_to_base(
        transactions,
        &config.currency,
        &config.rate_file()?,
        &rate_provider,
    )
    .await?;

    let expenses_file = config.expenses_file()?;
    ledger::write_ledger_csv(&expenses_file, &outcome.transactions)?;
    info!(
        transactions = outcome.transactions.len(),
        rate_requests = outcome.fetch_calls,
        "Ledger written to {}",
        expenses_file.display()
    );

    let summary = LedgerSummary::from_ledger(&outcome.transactions, &config.currency);
    println!("{}", summary.display_as_table());
    Ok(())
}

async fn refresh_prices(config: &AppConfig) -> Result<()> {
    info!("Refreshing investment price histories...");

    if config
        .investments
        .iter()
        .any(|i| i.source == PriceFeed::Eodhd)
        && config.eodhd_token.is_none()
    {
        bail!("An investment uses the eodhd feed but no eodhd_token is configured");
    }

    let yahoo_url = config
        .providers
        .yahoo
        .as_ref()
        .map_or(yahoo_finance::DEFAULT_BASE_URL, |p| &p.base_url);
    let yahoo = yahoo_finance::YahooFinanceProvider::new(yahoo_url);

    let eodhd_url = config
        .providers
        .eodhd
        .as_ref()
        .map_or(eodhd::DEFAULT_BASE_URL, |p| &p.base_url);
    let eodhd =
        eodhd::EodhdProvider::new(eodhd_url, config.eodhd_token.as_deref().unwrap_or_default());

    prices::refresh_price_histories(
        &config.investments,
        &yahoo,
        &eodhd,
        &config.prices_dir()?,
        Local::now().date_naive(),
    )
    .await
}

async fn refresh_inflation(config: &AppConfig) -> Result<()> {
    info!("Refreshing inflation series...");

    let ons_url = config
        .providers
        .ons
        .as_ref()
        .map_or(ons::DEFAULT_BASE_URL, |p| &p.base_url);
    let provider = ons::OnsProvider::new(ons_url);

    inflation::refresh_inflation(&provider, &config.inflation_file()?, config.start_date).await
}
