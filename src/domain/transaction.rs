//! Classified transaction types and the account-user roster.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A household member whose transfers into the shared account count as
/// balance top-ups rather than external expenses.
///
/// Read-only reference data, sourced from object storage; no lifecycle here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountUser {
    /// Name the bank reports as the transfer's debtor.
    pub debtor_name: String,
    /// Remittance text the member uses for top-up transfers.
    pub reference: String,
    /// Name shown for this member in the exported reports.
    pub export_name: String,
}

/// Category assigned to a classified transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money coming back into the shared account from outside.
    Refund,
    /// An external expense paid from the shared account.
    OutgoingPayment,
    /// A recognised member transfer into the shared account.
    BalanceTopUp,
}

/// A transaction after classification against the roster.
///
/// Derived and immutable; produced fresh each pipeline run and written under
/// a new run identifier, never updated in place. Classification is a pure
/// function of the raw transaction, the roster and the target currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedTransaction {
    pub date: NaiveDate,
    /// Signed amount. For non-top-ups the upstream sign is inverted so that
    /// household expenses read as positive costs.
    pub amount: Decimal,
    /// Creditor/remittance text, or the member's export name for top-ups.
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Set when the transaction currency differs from the configured target
    /// currency. The amount is still carried for audit; report rendering
    /// replaces it with a manual-review marker.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub currency_error: bool,
}
