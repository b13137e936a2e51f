//! Requisition lifecycle types using the typestate pattern.
//!
//! A requisition is a user-approved consent granting read access to one bank
//! account's transaction history. Its status only ever moves forward,
//! `Pending → Confirmed`, and that transition is enforced at compile time:
//! only a `Requisition<Pending>` has a `confirm` method, and it goes through
//! a store update that requires the record to already exist (guarding
//! against the confirmation callback racing ahead of record creation).
//!
//! Expired requisitions are superseded by new records with fresh references;
//! old records are retained for audit and never deleted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::RequisitionStore;

/// Opaque handle held by a paused external workflow instance.
///
/// Stored on the requisition record and later handed back to the workflow
/// engine unchanged; never generated, parsed or combined with business data
/// inside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(pub String);

impl ResumeToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResumeToken {
    fn from(value: String) -> Self {
        ResumeToken(value)
    }
}

impl std::fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Opaque and potentially sensitive; show only a length in logs.
        write!(f, "<resume-token:{}b>", self.0.len())
    }
}

/// Marker trait for valid requisition states.
pub trait RequisitionState: Send + Sync {}

/// Consent created with the aggregator, awaiting the user's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pending {}

impl RequisitionState for Pending {}

/// Consent approved by the user via the confirmation callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmed {}

impl RequisitionState for Confirmed {}

/// Fields shared by a requisition in every state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionData {
    /// Identifier assigned by the aggregator.
    pub id: String,
    /// Globally unique consent key; the storage key for the record.
    pub reference: String,
    /// Link the user follows to approve the consent.
    pub confirm_link: String,
    #[serde(rename = "created", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expires", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    pub institution_id: String,
    /// Handle for resuming the workflow parked on this consent.
    pub resume_token: ResumeToken,
    /// End-user language reported by the aggregator, if any.
    pub language: Option<String>,
}

/// A bank-linking consent record.
///
/// The generic parameter `S` is the current lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requisition<S: RequisitionState> {
    /// The current state of the requisition.
    pub state: S,
    /// The requisition record fields.
    pub data: RequisitionData,
}

impl Requisition<Pending> {
    /// Transition to `Confirmed` on the user's approval callback.
    ///
    /// The store update is conditional on the record existing; a missing
    /// record surfaces as `NotFound` rather than resurrecting the consent.
    pub async fn confirm<S: RequisitionStore + ?Sized>(
        self,
        store: &S,
    ) -> Result<Requisition<Confirmed>> {
        store.mark_confirmed(&self.data.reference).await?;
        Ok(Requisition {
            state: Confirmed {},
            data: self.data,
        })
    }
}

/// Enum that can hold a requisition in any state.
///
/// Used at the storage boundary where records are handled uniformly
/// regardless of status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "requisition")]
pub enum AnyRequisition {
    Pending(Requisition<Pending>),
    Confirmed(Requisition<Confirmed>),
}

impl AnyRequisition {
    /// Get the record fields regardless of state.
    pub fn data(&self) -> &RequisitionData {
        match self {
            AnyRequisition::Pending(r) => &r.data,
            AnyRequisition::Confirmed(r) => &r.data,
        }
    }

    /// Get the consent reference regardless of state.
    pub fn reference(&self) -> &str {
        &self.data().reference
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, AnyRequisition::Confirmed(_))
    }

    /// The status string stored on the record boundary.
    pub fn status(&self) -> &'static str {
        match self {
            AnyRequisition::Pending(_) => "Pending",
            AnyRequisition::Confirmed(_) => "Confirmed",
        }
    }
}

impl From<Requisition<Pending>> for AnyRequisition {
    fn from(r: Requisition<Pending>) -> Self {
        AnyRequisition::Pending(r)
    }
}

impl From<Requisition<Confirmed>> for AnyRequisition {
    fn from(r: Requisition<Confirmed>) -> Self {
        AnyRequisition::Confirmed(r)
    }
}
