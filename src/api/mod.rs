//! Aggregator API abstraction.
//!
//! This module defines the [`BankDataClient`] trait over the open-banking
//! aggregator's endpoints, enabling testability with a mock implementation.
//! All response parsing goes through the typed boundary in [`types`], so
//! malformed upstream shapes become `Validation` errors before any business
//! logic runs.

mod mock;
mod rest;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
pub use mock::{MockBankDataClient, MockCall};
pub use rest::RestBankDataClient;
pub use types::{
    AccessGrant, ApiRequisition, ApiTransaction, DateRange, Institution, RequisitionDetails,
    RequisitionRequest, TokenGrant, TransactionAmount, TransactionsDocument,
};

/// Trait for calling the open-banking aggregator.
///
/// Implementations must not retry internally; a failed call is fatal to the
/// invocation and retry policy belongs to the calling orchestrator.
#[async_trait]
pub trait BankDataClient: Send + Sync {
    /// Full authentication with the long-lived secret pair, returning a new
    /// access/refresh token grant.
    async fn issue_tokens(&self, secret_id: &str, secret_key: &str) -> Result<TokenGrant>;

    /// Exchange a refresh token for a new access token. The refresh token
    /// itself is untouched by this call.
    async fn refresh_access(&self, refresh_token: &str) -> Result<AccessGrant>;

    /// List the institutions available in a country.
    async fn list_institutions(
        &self,
        access_token: &str,
        country: &str,
    ) -> Result<Vec<Institution>>;

    /// Create a new requisition (bank-linking consent).
    async fn create_requisition(
        &self,
        access_token: &str,
        request: &RequisitionRequest,
    ) -> Result<ApiRequisition>;

    /// Fetch the current details of a requisition, including its linked
    /// account ids.
    async fn requisition_details(
        &self,
        access_token: &str,
        requisition_id: &str,
    ) -> Result<RequisitionDetails>;

    /// Fetch an account's transactions for a date range.
    ///
    /// Returns the raw JSON document: the pipeline stores it verbatim for
    /// audit before parsing it through [`TransactionsDocument::parse`].
    async fn account_transactions(
        &self,
        access_token: &str,
        account_id: &str,
        range: &DateRange,
    ) -> Result<serde_json::Value>;
}
