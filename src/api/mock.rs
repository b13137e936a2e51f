//! Mock aggregator client for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{HousetabError, Result};

use super::types::{
    self, AccessGrant, ApiRequisition, DateRange, Institution, RequisitionDetails,
    RequisitionRequest, TokenGrant,
};
use super::BankDataClient;

/// Record of a call made to the mock client.
#[derive(Debug, Clone)]
pub struct MockCall {
    /// Operation key, e.g. `"token/refresh"` or `"transactions"`.
    pub operation: String,
    /// Arguments the call was made with, as JSON.
    pub payload: serde_json::Value,
}

/// Mock aggregator client.
///
/// Responses are queued per operation as raw JSON and consumed FIFO; they go
/// through the same parse-and-validate boundary as real responses, so a test
/// can also exercise shape validation. Every call is recorded.
///
/// # Example
/// ```ignore
/// let mock = MockBankDataClient::new();
/// mock.queue_ok("token/refresh", json!({"access": "a2", "access_expires": 86400}));
/// ```
#[derive(Default)]
pub struct MockBankDataClient {
    responses: Mutex<HashMap<String, Vec<Result<serde_json::Value>>>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockBankDataClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw JSON response for an operation.
    pub fn queue_ok(&self, operation: &str, body: serde_json::Value) {
        self.responses
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push(Ok(body));
    }

    /// Queue an error for an operation.
    pub fn queue_err(&self, operation: &str, error: HousetabError) {
        self.responses
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push(Err(error));
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of calls made to one operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn take(&self, operation: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        self.calls.lock().push(MockCall {
            operation: operation.to_string(),
            payload,
        });
        let mut responses = self.responses.lock();
        let queue = responses.get_mut(operation).ok_or_else(|| {
            HousetabError::Validation(format!("mock: no response queued for {operation}"))
        })?;
        if queue.is_empty() {
            return Err(HousetabError::Validation(format!(
                "mock: response queue for {operation} exhausted"
            )));
        }
        queue.remove(0)
    }
}

#[async_trait]
impl BankDataClient for MockBankDataClient {
    async fn issue_tokens(&self, secret_id: &str, _secret_key: &str) -> Result<TokenGrant> {
        let body = self.take(
            "token/new",
            serde_json::json!({ "secret_id": secret_id }),
        )?;
        types::parse_response(body, "token issue")
    }

    async fn refresh_access(&self, refresh_token: &str) -> Result<AccessGrant> {
        let body = self.take(
            "token/refresh",
            serde_json::json!({ "refresh": refresh_token }),
        )?;
        types::parse_response(body, "token refresh")
    }

    async fn list_institutions(
        &self,
        _access_token: &str,
        country: &str,
    ) -> Result<Vec<Institution>> {
        let body = self.take("institutions", serde_json::json!({ "country": country }))?;
        types::parse_response(body, "institution list")
    }

    async fn create_requisition(
        &self,
        _access_token: &str,
        request: &RequisitionRequest,
    ) -> Result<ApiRequisition> {
        let body = self.take("requisitions/create", serde_json::to_value(request)?)?;
        types::parse_response(body, "requisition create")
    }

    async fn requisition_details(
        &self,
        _access_token: &str,
        requisition_id: &str,
    ) -> Result<RequisitionDetails> {
        let body = self.take(
            "requisitions/details",
            serde_json::json!({ "id": requisition_id }),
        )?;
        types::parse_response(body, "requisition details")
    }

    async fn account_transactions(
        &self,
        _access_token: &str,
        account_id: &str,
        range: &DateRange,
    ) -> Result<serde_json::Value> {
        self.take(
            "transactions",
            serde_json::json!({
                "account_id": account_id,
                "date_from": range.date_from,
                "date_to": range.date_to,
            }),
        )
    }
}
