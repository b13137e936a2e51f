//! Wire types for the aggregator API.
//!
//! One typed parse-and-validate boundary per upstream call: responses are
//! deserialized here and shape problems converted into
//! [`HousetabError::Validation`] with enough detail for diagnosis.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{HousetabError, Result};

/// Parse an upstream JSON value, converting shape mismatches into a
/// validation error naming the offending call.
pub fn parse_response<T: DeserializeOwned>(value: serde_json::Value, context: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| HousetabError::Validation(format!("{context}: {e}")))
}

/// Response of a full authentication with the secret pair.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access: String,
    /// Access token lifetime in seconds from issuance.
    pub access_expires: i64,
    pub refresh: String,
    /// Refresh token lifetime in seconds from issuance.
    pub refresh_expires: i64,
}

/// Response of a refresh-token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessGrant {
    pub access: String,
    pub access_expires: i64,
}

/// One institution in the aggregator's per-country list.
#[derive(Debug, Clone, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
}

/// Request body for creating a requisition.
#[derive(Debug, Clone, Serialize)]
pub struct RequisitionRequest {
    /// Where the user lands after approving the consent. Carries the
    /// workflow resume token as a query parameter.
    pub redirect: String,
    pub institution_id: String,
    /// Our fresh unique consent key.
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_language: Option<String>,
}

/// Requisition as returned by the aggregator on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRequisition {
    pub id: String,
    /// Confirmation link the user must follow.
    pub link: String,
    pub created: DateTime<Utc>,
    pub institution_id: String,
    #[serde(default)]
    pub user_language: Option<String>,
}

/// Requisition details, fetched once the consent is confirmed.
#[derive(Debug, Clone, Deserialize)]
pub struct RequisitionDetails {
    /// Ids of the accounts the consent grants access to.
    pub accounts: Vec<String>,
}

impl RequisitionDetails {
    /// The account this pipeline reads; the consent covers exactly one.
    pub fn first_account(&self) -> Result<&str> {
        self.accounts
            .first()
            .map(String::as_str)
            .ok_or_else(|| {
                HousetabError::Validation(
                    "requisition details contained no linked accounts".to_string(),
                )
            })
    }
}

/// Date range for a transaction fetch, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DateRange {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

/// Amount and currency of one upstream transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAmount {
    /// Signed decimal; the aggregator serializes it as a string.
    pub amount: Decimal,
    /// ISO-4217 code.
    pub currency: String,
}

/// One transaction as reported by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTransaction {
    pub transaction_amount: TransactionAmount,
    pub value_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor_name: Option<String>,
    pub remittance_information_unstructured: String,
}

/// The booked/pending transaction lists of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLists {
    pub booked: Vec<ApiTransaction>,
    pub pending: Vec<ApiTransaction>,
}

/// Full transactions document for one account and date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsDocument {
    pub transactions: TransactionLists,
}

impl TransactionsDocument {
    /// Parse and validate the raw document stored for audit.
    pub fn parse(value: serde_json::Value) -> Result<Self> {
        let document: TransactionsDocument = parse_response(value, "account transactions")?;
        for transaction in document
            .transactions
            .booked
            .iter()
            .chain(document.transactions.pending.iter())
        {
            let currency = &transaction.transaction_amount.currency;
            if currency.len() != 3 {
                return Err(HousetabError::Validation(format!(
                    "transaction currency {currency:?} is not an ISO-4217 code"
                )));
            }
        }
        Ok(document)
    }
}
