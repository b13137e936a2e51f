//! Shared-account transaction ingest for an open-banking aggregator.
//!
//! This crate maintains the two time-limited resources the aggregator hands
//! out (an access/refresh token pair and a human-approved bank consent, the
//! "requisition"), fetches one account's transactions for a month, classifies
//! them against a roster of known household members, and renders per-month
//! expenses/top-ups CSV reports.
//!
//! Each stage is a single sequential invocation driven by an external
//! orchestrator; all collaborators (aggregator API, parameter store,
//! requisition records, object storage, notifications, workflow resumption)
//! are injected as trait objects, with in-memory implementations for tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod expiry;
pub mod export;
pub mod pipeline;
pub mod ports;
pub mod requisition;

// Re-export commonly used types
pub use api::{BankDataClient, MockBankDataClient, RestBankDataClient};
pub use config::PipelineConfig;
pub use credentials::{CredentialManager, CredentialOutcome};
pub use domain::credentials::{ApiCredential, CredentialPair, CredentialUpdate, ExpiringToken};
pub use domain::requisition::{
    AnyRequisition, Confirmed, Pending, Requisition, RequisitionData, ResumeToken,
};
pub use domain::transaction::{AccountUser, ClassifiedTransaction, TransactionKind};
pub use error::{HousetabError, Result};
pub use requisition::{RequisitionManager, RequisitionOutcome};
