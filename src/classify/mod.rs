//! Transaction classification against the account-user roster.
//!
//! Classification is pure: identical inputs always yield identical outputs,
//! and problems are recorded on the produced records (the currency flag)
//! rather than raised. The upstream sign convention is negative for money
//! leaving the shared account; for anything that is not a member top-up the
//! sign is inverted so household expenses read as positive costs.

use crate::api::types::{ApiTransaction, TransactionsDocument};
use crate::domain::transaction::{AccountUser, ClassifiedTransaction, TransactionKind};

/// Find the roster member matching a transaction's `(debtor, remittance)`
/// pair exactly, case-sensitively.
fn matching_user<'a>(
    transaction: &ApiTransaction,
    roster: &'a [AccountUser],
) -> Option<&'a AccountUser> {
    let debtor = transaction.debtor_name.as_deref()?;
    roster.iter().find(|user| {
        user.debtor_name == debtor
            && user.reference == transaction.remittance_information_unstructured
    })
}

/// Classify one raw transaction.
pub fn classify_transaction(
    transaction: &ApiTransaction,
    roster: &[AccountUser],
    target_currency: &str,
) -> ClassifiedTransaction {
    let currency_error = transaction.transaction_amount.currency != target_currency;

    match matching_user(transaction, roster) {
        Some(user) => ClassifiedTransaction {
            date: transaction.value_date,
            // Top-ups keep the upstream sign.
            amount: transaction.transaction_amount.amount,
            description: user.export_name.clone(),
            kind: TransactionKind::BalanceTopUp,
            currency_error,
        },
        None => {
            let amount = -transaction.transaction_amount.amount;
            let kind = if amount < rust_decimal::Decimal::ZERO {
                TransactionKind::Refund
            } else {
                TransactionKind::OutgoingPayment
            };
            let description = transaction
                .creditor_name
                .clone()
                .unwrap_or_else(|| transaction.remittance_information_unstructured.clone());
            ClassifiedTransaction {
                date: transaction.value_date,
                amount,
                description,
                kind,
                currency_error,
            }
        }
    }
}

/// Classify a full transactions document: booked first, pending appended.
pub fn classify_document(
    document: &TransactionsDocument,
    roster: &[AccountUser],
    target_currency: &str,
) -> Vec<ClassifiedTransaction> {
    document
        .transactions
        .booked
        .iter()
        .chain(document.transactions.pending.iter())
        .map(|t| classify_transaction(t, roster, target_currency))
        .collect()
}
