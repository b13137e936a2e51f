//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by the pipeline stages.
///
/// Injected explicitly into each manager/stage; there is no global state.
/// Thresholds live in [`crate::expiry`] as constants because the upstream
/// API contract fixes them, not deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Exact institution name to match against the aggregator's list.
    pub bank_name: String,

    /// ISO country code scoping the institution lookup.
    pub country: String,

    /// Target ISO-4217 currency for the shared account.
    pub currency: String,

    /// Parameter-store name holding the aggregator secret id.
    pub secret_id_param: String,

    /// Parameter-store name holding the aggregator secret key.
    pub secret_key_param: String,

    /// Public URL of the confirmation callback; the workflow resume token is
    /// appended as a query parameter when building the redirect target.
    pub confirm_endpoint: String,

    /// Object-store key of the account-user roster JSON.
    pub account_users_key: String,

    /// Preferred end-user language for the consent flow, if any.
    pub user_language: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bank_name: String::new(),
            country: "GB".to_string(),
            currency: "GBP".to_string(),
            secret_id_param: "/aggregator/secret-id".to_string(),
            secret_key_param: "/aggregator/secret-key".to_string(),
            confirm_endpoint: "https://localhost/requisitions/confirm".to_string(),
            account_users_key: "account-users.json".to_string(),
            user_language: None,
        }
    }
}
