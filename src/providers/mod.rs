pub mod eodhd;
pub mod exchange_rates;
pub mod ons;
pub mod splitwise;
pub mod yahoo_finance;
