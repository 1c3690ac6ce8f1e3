//! Per-currency breakdown of a converted ledger for terminal display.

use crate::ledger::ConvertedTransaction;
use crate::ui;
use comfy_table::Cell;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyBreakdown {
    pub currency: String,
    pub transactions: usize,
    pub owed_total: f64,
    pub converted_total: f64,
}

#[derive(Debug)]
pub struct LedgerSummary {
    pub base_currency: String,
    pub breakdowns: Vec<CurrencyBreakdown>,
    pub grand_total: f64,
}

impl LedgerSummary {
    pub fn from_ledger(transactions: &[ConvertedTransaction], base_currency: &str) -> Self {
        let mut by_currency: BTreeMap<String, CurrencyBreakdown> = BTreeMap::new();
        let mut grand_total = 0.0;

        for row in transactions {
            let entry = by_currency
                .entry(row.transaction.currency_code.clone())
                .or_insert_with(|| CurrencyBreakdown {
                    currency: row.transaction.currency_code.clone(),
                    transactions: 0,
                    owed_total: 0.0,
                    converted_total: 0.0,
                });
            entry.transactions += 1;
            entry.owed_total += row.transaction.owed;
            entry.converted_total += row.amount;
            grand_total += row.amount;
        }

        LedgerSummary {
            base_currency: base_currency.to_string(),
            breakdowns: by_currency.into_values().collect(),
            grand_total,
        }
    }

    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell("Transactions"),
            ui::header_cell("Total (native)"),
            ui::header_cell(&format!("Total ({})", self.base_currency)),
        ]);

        for breakdown in &self.breakdowns {
            table.add_row(vec![
                Cell::new(&breakdown.currency),
                Cell::new(breakdown.transactions),
                ui::amount_cell(breakdown.owed_total),
                ui::amount_cell(breakdown.converted_total),
            ]);
        }

        let mut output = format!(
            "{}\n\n{}",
            ui::style_text("Expenses by currency", ui::StyleType::Title),
            table
        );
        output.push_str(&format!(
            "\n\nTotal ({}): {}",
            ui::style_text(&self.base_currency, ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", self.grand_total), ui::StyleType::TotalValue)
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Transaction;
    use chrono::NaiveDate;

    fn converted(currency: &str, owed: f64, amount: f64) -> ConvertedTransaction {
        ConvertedTransaction {
            transaction: Transaction {
                id: 1,
                date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                description: "x".to_string(),
                category: "Expense".to_string(),
                subcategory: "General".to_string(),
                sub_subcategory: "General".to_string(),
                account: "Current".to_string(),
                currency_code: currency.to_string(),
                owed,
                paid: 0.0,
                group_id: 0,
                details: String::new(),
            },
            amount,
        }
    }

    #[test]
    fn test_breakdown_groups_by_currency() {
        let ledger = vec![
            converted("GBP", 10.0, 10.0),
            converted("USD", 100.0, 80.0),
            converted("USD", 25.0, 20.0),
        ];
        let summary = LedgerSummary::from_ledger(&ledger, "GBP");

        assert_eq!(summary.breakdowns.len(), 2);
        assert_eq!(summary.breakdowns[0].currency, "GBP");
        assert_eq!(summary.breakdowns[0].transactions, 1);
        assert_eq!(summary.breakdowns[1].currency, "USD");
        assert_eq!(summary.breakdowns[1].transactions, 2);
        assert_eq!(summary.breakdowns[1].owed_total, 125.0);
        assert_eq!(summary.breakdowns[1].converted_total, 100.0);
        assert_eq!(summary.grand_total, 110.0);
    }

    #[test]
    fn test_display_contains_currencies_and_total() {
        let ledger = vec![converted("GBP", 10.0, 10.0), converted("USD", 100.0, 80.0)];
        let summary = LedgerSummary::from_ledger(&ledger, "GBP");
        let rendered = summary.display_as_table();
        assert!(rendered.contains("USD"));
        assert!(rendered.contains("Total (GBP)"));
        assert!(rendered.contains("90.00"));
    }
}
