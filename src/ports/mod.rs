//! Trait boundaries for external collaborators.
//!
//! Cloud parameter storage, the requisition record table, object storage,
//! approval notification, outbound mail and the workflow engine are all
//! external to this core; they appear here only as traits, injected per
//! stage invocation. In-memory implementations live in [`memory`] and back
//! the integration tests.

pub mod memory;

use async_trait::async_trait;

use crate::domain::requisition::{AnyRequisition, Pending, Requisition, ResumeToken};
use crate::error::Result;

pub use memory::{
    MemoryObjectStore, MemoryParameterStore, MemoryRequisitionStore, MemoryWorkflowSignaler,
    RecordingMailer, RecordingNotifier,
};

/// Named secret/parameter lookup.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Get a parameter value by name, `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<String>>;
}

/// Durable storage of requisition records, keyed by consent reference.
///
/// Updates are optimistic: `mark_confirmed` requires the record to already
/// exist and fails `NotFound` otherwise. There is no locking; concurrent
/// renewals for the same reference must tolerate duplicate-creation or
/// duplicate-confirmation outcomes as benign.
#[async_trait]
pub trait RequisitionStore: Send + Sync {
    /// Look up a record by reference.
    async fn get(&self, reference: &str) -> Result<Option<AnyRequisition>>;

    /// Persist a newly created pending requisition.
    ///
    /// Superseded records for other references are retained for audit.
    async fn insert(&self, requisition: &Requisition<Pending>) -> Result<()>;

    /// Conditionally set an existing record's status to confirmed.
    ///
    /// Fails `NotFound` if no record exists for the reference. Confirming an
    /// already-confirmed record is a no-op.
    async fn mark_confirmed(&self, reference: &str) -> Result<()>;
}

/// Object storage of JSON/CSV artifacts by logical key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Human-approval notification delivery (e.g. a pub/sub topic fanning out to
/// the account holder).
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str) -> Result<()>;
}

/// Resumption of a workflow parked on a resume token.
#[async_trait]
pub trait WorkflowSignaler: Send + Sync {
    /// Resolve the paused task identified by `token` with `payload`.
    ///
    /// Implementations report an already-consumed token as
    /// [`crate::HousetabError::DuplicateCompletion`]; callers decide whether
    /// to swallow it (they generally do).
    async fn resolve(&self, token: &ResumeToken, payload: serde_json::Value) -> Result<()>;
}

/// An attachment on an outbound report mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// An outbound report mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

/// Outbound email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a mail, returning the provider's message id.
    async fn send(&self, mail: OutboundMail) -> Result<String>;
}
