//! CSV report rendering.
//!
//! Splits a classified-transaction sequence into expenses and top-ups and
//! renders each partition as a header-less CSV body with columns
//! `[dd/mm/yyyy, year, month, description, amount]`. A transaction flagged
//! with a currency mismatch gets a fixed manual-review marker in place of
//! its amount.

use crate::domain::transaction::{ClassifiedTransaction, TransactionKind};
use crate::error::Result;

/// Literal written to the amount cell of a currency-mismatched row.
pub const CURRENCY_REVIEW_MARKER: &str = "Unrecognised currency - review manually";

/// The two rendered report bodies of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReports {
    /// Everything that is not a member top-up, sorted by date.
    pub expenses: String,
    /// Member top-ups, sorted by date.
    pub top_ups: String,
}

/// Render both report bodies from one classified sequence.
pub fn render_reports(transactions: &[ClassifiedTransaction]) -> Result<CsvReports> {
    let (top_ups, expenses): (Vec<_>, Vec<_>) = transactions
        .iter()
        .partition(|t| t.kind == TransactionKind::BalanceTopUp);

    Ok(CsvReports {
        expenses: render_partition(expenses)?,
        top_ups: render_partition(top_ups)?,
    })
}

fn render_partition(mut transactions: Vec<&ClassifiedTransaction>) -> Result<String> {
    transactions.sort_by_key(|t| t.date);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for transaction in transactions {
        let amount = if transaction.currency_error {
            CURRENCY_REVIEW_MARKER.to_string()
        } else {
            transaction.amount.to_string()
        };
        writer.write_record([
            transaction.date.format("%d/%m/%Y").to_string(),
            transaction.date.format("%Y").to_string(),
            transaction.date.format("%m").to_string(),
            transaction.description.clone(),
            amount,
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| crate::error::HousetabError::Validation(format!("csv flush: {e}")))?;
    // The writer only ever receives UTF-8 fields.
    String::from_utf8(bytes)
        .map_err(|e| crate::error::HousetabError::Validation(format!("csv encoding: {e}")))
}
