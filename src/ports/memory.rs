//! In-memory implementations of the collaborator ports.
//!
//! These back the integration tests and double as a local-run harness; the
//! requisition store reproduces the conditional-update and
//! duplicate-completion semantics of the real collaborators.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::requisition::{AnyRequisition, Confirmed, Pending, Requisition, ResumeToken};
use crate::error::{HousetabError, Result};

use super::{
    ApprovalNotifier, Mailer, ObjectStore, OutboundMail, ParameterStore, RequisitionStore,
    WorkflowSignaler,
};

/// Parameter store over a map.
#[derive(Default)]
pub struct MemoryParameterStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: &str) {
        self.values
            .lock()
            .insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(name).cloned())
    }
}

/// Requisition record store over a map keyed by reference.
#[derive(Default)]
pub struct MemoryRequisitionStore {
    records: Mutex<HashMap<String, AnyRequisition>>,
}

impl MemoryRequisitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records; superseded records keep their own
    /// references, so they count.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RequisitionStore for MemoryRequisitionStore {
    async fn get(&self, reference: &str) -> Result<Option<AnyRequisition>> {
        Ok(self.records.lock().get(reference).cloned())
    }

    async fn insert(&self, requisition: &Requisition<Pending>) -> Result<()> {
        self.records.lock().insert(
            requisition.data.reference.clone(),
            AnyRequisition::Pending(requisition.clone()),
        );
        Ok(())
    }

    async fn mark_confirmed(&self, reference: &str) -> Result<()> {
        let mut records = self.records.lock();
        match records.get(reference) {
            None => Err(HousetabError::NotFound(format!(
                "requisition reference {reference}"
            ))),
            Some(AnyRequisition::Confirmed(_)) => Ok(()),
            Some(AnyRequisition::Pending(pending)) => {
                let confirmed = Requisition {
                    state: Confirmed {},
                    data: pending.data.clone(),
                };
                records.insert(reference.to_string(), AnyRequisition::Confirmed(confirmed));
                Ok(())
            }
        }
    }
}

/// Object store over a map of logical keys.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for a key, if stored.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects
            .lock()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().get(key).map(|(b, _)| b.clone()))
    }
}

/// Notifier that records every message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(subject, message)` pairs delivered so far.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl ApprovalNotifier for RecordingNotifier {
    async fn notify(&self, subject: &str, message: &str) -> Result<()> {
        self.messages
            .lock()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

/// Workflow signaler that consumes each token exactly once.
///
/// A second resolution of the same token returns `DuplicateCompletion`, the
/// way the real workflow engine reports an already-resolved task.
#[derive(Default)]
pub struct MemoryWorkflowSignaler {
    resolved: Mutex<HashSet<String>>,
    payloads: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryWorkflowSignaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a token as already consumed, to simulate a duplicate delivery.
    pub fn preconsume(&self, token: &ResumeToken) {
        self.resolved.lock().insert(token.0.clone());
    }

    pub fn resolved_count(&self) -> usize {
        self.payloads.lock().len()
    }

    /// Payloads of successful resolutions, in order.
    pub fn payloads(&self) -> Vec<(String, serde_json::Value)> {
        self.payloads.lock().clone()
    }
}

#[async_trait]
impl WorkflowSignaler for MemoryWorkflowSignaler {
    async fn resolve(&self, token: &ResumeToken, payload: serde_json::Value) -> Result<()> {
        if !self.resolved.lock().insert(token.0.clone()) {
            return Err(HousetabError::DuplicateCompletion);
        }
        self.payloads.lock().push((token.0.clone(), payload));
        Ok(())
    }
}

/// Mailer that records sent mail and returns sequential message ids.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutboundMail) -> Result<String> {
        let mut sent = self.sent.lock();
        sent.push(mail);
        Ok(format!("message-{}", sent.len()))
    }
}
