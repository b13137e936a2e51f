//! Error types for the ingest pipeline.

use thiserror::Error;

/// Result type alias using the housetab error type.
pub type Result<T> = std::result::Result<T, HousetabError>;

/// Main error type for the ingest pipeline.
///
/// Lifecycle problems (credentials, requisitions) are hard failures that
/// abort the current stage; retry policy belongs to the calling orchestrator.
/// Data-level problems (currency mismatches) are flags on records and never
/// appear here.
#[derive(Error, Debug)]
pub enum HousetabError {
    /// A referenced requisition, account or stored object is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requisition exists but the user has not yet confirmed consent.
    #[error("Requisition {0} not yet confirmed by user")]
    Unconfirmed(String),

    /// No institution matched the configured bank name in the configured country.
    #[error("Failed to find institution {name} in country {country}")]
    InstitutionNotFound { name: String, country: String },

    /// The upstream auth endpoint rejected a token request.
    #[error("Upstream auth request failed with status {status}: {body}")]
    UpstreamAuth { status: u16, body: String },

    /// The aggregator API returned an error response.
    #[error("Upstream API request failed with status {status}: {body}")]
    UpstreamApi { status: u16, body: String },

    /// An upstream response did not match the expected shape.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required configuration parameter is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The workflow resume token was already consumed.
    ///
    /// Callers treat this as a benign duplicate delivery, not a failure.
    #[error("Workflow task already resolved")]
    DuplicateCompletion,

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV rendering error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HousetabError {
    /// True for the duplicate-completion case that managers swallow.
    pub fn is_duplicate_completion(&self) -> bool {
        matches!(self, HousetabError::DuplicateCompletion)
    }
}
