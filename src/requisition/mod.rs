//! Requisition lifecycle management.
//!
//! Decides whether a stored bank consent is still usable, creates and
//! persists a replacement when it is not, and handles the user's external
//! confirmation callback. Creation pauses the calling workflow until the
//! user approves; both resumption paths tolerate an already-resolved task as
//! a benign duplicate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use uuid::Uuid;

use crate::api::{BankDataClient, RequisitionRequest};
use crate::config::PipelineConfig;
use crate::domain::requisition::{
    AnyRequisition, Confirmed, Pending, Requisition, RequisitionData, ResumeToken,
};
use crate::error::{HousetabError, Result};
use crate::expiry::{self, REQUISITION_THRESHOLD_MINUTES, REQUISITION_VALIDITY_DAYS};
use crate::ports::{ApprovalNotifier, RequisitionStore, WorkflowSignaler};

const APPROVAL_SUBJECT: &str = "A bank account data requisition requires your approval";

/// Result of ensuring a requisition.
#[derive(Debug, Clone)]
pub enum RequisitionOutcome {
    /// A new consent was created and persisted as pending; the workflow must
    /// pause awaiting the user's confirmation.
    Created(Requisition<Pending>),
    /// The stored consent is still valid; the parked workflow was resolved.
    Reused(AnyRequisition),
}

impl RequisitionOutcome {
    /// Whether this invocation replaced the stored consent.
    pub fn updated(&self) -> bool {
        matches!(self, RequisitionOutcome::Created(_))
    }

    pub fn reference(&self) -> &str {
        match self {
            RequisitionOutcome::Created(r) => &r.data.reference,
            RequisitionOutcome::Reused(r) => r.reference(),
        }
    }
}

/// Manager for bank-linking consents.
pub struct RequisitionManager<B, S, N, W> {
    api: Arc<B>,
    store: Arc<S>,
    notifier: Arc<N>,
    workflow: Arc<W>,
    config: PipelineConfig,
}

impl<B, S, N, W> RequisitionManager<B, S, N, W>
where
    B: BankDataClient,
    S: RequisitionStore,
    N: ApprovalNotifier,
    W: WorkflowSignaler,
{
    pub fn new(
        api: Arc<B>,
        store: Arc<S>,
        notifier: Arc<N>,
        workflow: Arc<W>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            api,
            store,
            notifier,
            workflow,
            config,
        }
    }

    /// Ensure a usable consent exists for `reference`.
    ///
    /// A missing or expiring record (less than an hour of validity left) is
    /// superseded by a freshly created requisition under a new reference;
    /// the caller then pauses on `resume_token` until the user confirms. A
    /// still-valid record resolves the parked workflow immediately, using
    /// the token stored on the record.
    #[tracing::instrument(skip(self, access_token, resume_token))]
    pub async fn ensure(
        &self,
        reference: &str,
        access_token: &str,
        resume_token: ResumeToken,
    ) -> Result<RequisitionOutcome> {
        self.ensure_at(reference, access_token, resume_token, Utc::now())
            .await
    }

    async fn ensure_at(
        &self,
        reference: &str,
        access_token: &str,
        resume_token: ResumeToken,
        now: DateTime<Utc>,
    ) -> Result<RequisitionOutcome> {
        if let Some(existing) = self.store.get(reference).await? {
            let remaining = expiry::time_remaining(existing.data().expires_at, now);
            if expiry::is_valid(remaining, REQUISITION_THRESHOLD_MINUTES) {
                tracing::info!(reference, "Requisition still valid, re-using");
                self.resolve_tolerating_duplicate(
                    &existing.data().resume_token,
                    resume_payload(existing.reference()),
                )
                .await?;
                return Ok(RequisitionOutcome::Reused(existing));
            }
            tracing::info!(
                reference,
                expires_at = %existing.data().expires_at,
                "Stored requisition expiring, superseding"
            );
        } else {
            tracing::info!(reference, "No stored requisition, creating");
        }

        let created = self.create(access_token, resume_token, now).await?;
        Ok(RequisitionOutcome::Created(created))
    }

    /// Create, persist and announce a new pending consent.
    async fn create(
        &self,
        access_token: &str,
        resume_token: ResumeToken,
        now: DateTime<Utc>,
    ) -> Result<Requisition<Pending>> {
        let institutions = self
            .api
            .list_institutions(access_token, &self.config.country)
            .await?;
        let institution = institutions
            .iter()
            .find(|i| i.name == self.config.bank_name)
            .ok_or_else(|| HousetabError::InstitutionNotFound {
                name: self.config.bank_name.clone(),
                country: self.config.country.clone(),
            })?;
        tracing::info!(
            institution_id = %institution.id,
            name = %institution.name,
            "Resolved institution"
        );

        let reference = Uuid::new_v4().to_string();
        let redirect = format!(
            "{}?resumeToken={}",
            self.config.confirm_endpoint,
            urlencoding::encode(resume_token.as_str())
        );
        let api_requisition = self
            .api
            .create_requisition(
                access_token,
                &RequisitionRequest {
                    redirect,
                    institution_id: institution.id.clone(),
                    reference: reference.clone(),
                    user_language: self.config.user_language.clone(),
                },
            )
            .await?;
        tracing::info!(reference, id = %api_requisition.id, "Created requisition with aggregator");

        let requisition = Requisition {
            state: Pending {},
            data: RequisitionData {
                id: api_requisition.id,
                reference,
                confirm_link: api_requisition.link,
                created_at: api_requisition.created,
                expires_at: now + Duration::days(REQUISITION_VALIDITY_DAYS),
                institution_id: api_requisition.institution_id,
                resume_token,
                language: api_requisition.user_language,
            },
        };
        self.store.insert(&requisition).await?;
        counter!("housetab_requisition_created_total").increment(1);

        self.notifier
            .notify(
                APPROVAL_SUBJECT,
                &format!(
                    "Please click the following link to authorize read access to your \
                     bank account transactions, in order to export them to the monthly \
                     shared-expenses report\n\n{}",
                    requisition.data.confirm_link
                ),
            )
            .await?;
        tracing::info!(reference = %requisition.data.reference, "Published approval notification");

        Ok(requisition)
    }

    /// Handle the user's confirmation callback for `reference`.
    ///
    /// Confirms the stored record (conditionally: the record must already
    /// exist) and resolves the workflow parked on its resume token. A
    /// duplicate callback, or a callback racing a duplicate, is benign.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, reference: &str) -> Result<Requisition<Confirmed>> {
        let existing = self.store.get(reference).await?.ok_or_else(|| {
            HousetabError::NotFound(format!("requisition reference {reference}"))
        })?;

        let confirmed = match existing {
            AnyRequisition::Pending(pending) => pending.confirm(self.store.as_ref()).await?,
            AnyRequisition::Confirmed(already) => {
                tracing::info!(reference, "Requisition already confirmed, duplicate callback");
                already
            }
        };

        self.resolve_tolerating_duplicate(
            &confirmed.data.resume_token,
            resume_payload(&confirmed.data.reference),
        )
        .await?;

        Ok(confirmed)
    }

    /// Resolve a parked workflow task, swallowing an already-resolved
    /// response; any other resolution error is surfaced.
    async fn resolve_tolerating_duplicate(
        &self,
        token: &ResumeToken,
        payload: serde_json::Value,
    ) -> Result<()> {
        match self.workflow.resolve(token, payload).await {
            Ok(()) => {
                tracing::info!("Resolved workflow task");
                Ok(())
            }
            Err(e) if e.is_duplicate_completion() => {
                counter!("housetab_duplicate_completion_total").increment(1);
                tracing::info!("Ignoring duplicate workflow resolution");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn resume_payload(reference: &str) -> serde_json::Value {
    serde_json::json!({ "Requisition": { "Reference": reference } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBankDataClient;
    use crate::ports::{
        MemoryRequisitionStore, MemoryWorkflowSignaler, RecordingNotifier, RequisitionStore,
    };
    use serde_json::json;

    struct Harness {
        api: Arc<MockBankDataClient>,
        store: Arc<MemoryRequisitionStore>,
        notifier: Arc<RecordingNotifier>,
        workflow: Arc<MemoryWorkflowSignaler>,
        manager: RequisitionManager<
            MockBankDataClient,
            MemoryRequisitionStore,
            RecordingNotifier,
            MemoryWorkflowSignaler,
        >,
    }

    fn harness() -> Harness {
        let api = Arc::new(MockBankDataClient::new());
        let store = Arc::new(MemoryRequisitionStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let workflow = Arc::new(MemoryWorkflowSignaler::new());
        let config = PipelineConfig {
            bank_name: "Example Bank".to_string(),
            ..PipelineConfig::default()
        };
        let manager = RequisitionManager::new(
            api.clone(),
            store.clone(),
            notifier.clone(),
            workflow.clone(),
            config,
        );
        Harness {
            api,
            store,
            notifier,
            workflow,
            manager,
        }
    }

    fn queue_creation(api: &MockBankDataClient) {
        api.queue_ok(
            "institutions",
            json!([
                { "id": "OTHER_BANK", "name": "Other Bank" },
                { "id": "EXAMPLE_BANK_GB", "name": "Example Bank" }
            ]),
        );
        api.queue_ok(
            "requisitions/create",
            json!({
                "id": "req-api-id-1",
                "link": "https://aggregator.example/psd2/start/req-api-id-1",
                "created": "2026-08-01T10:00:00Z",
                "institution_id": "EXAMPLE_BANK_GB",
                "user_language": "EN"
            }),
        );
    }

    async fn stored(store: &MemoryRequisitionStore, reference: &str) -> AnyRequisition {
        store.get(reference).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn absent_record_creates_pending_requisition_and_notifies() {
        let h = harness();
        queue_creation(&h.api);

        let outcome = h
            .manager
            .ensure("unknown-ref", "tok", ResumeToken("wf-1".into()))
            .await
            .unwrap();

        let RequisitionOutcome::Created(created) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(created.data.id, "req-api-id-1");
        assert_ne!(created.data.reference, "unknown-ref");
        assert_eq!(created.data.resume_token, ResumeToken("wf-1".into()));

        // Persisted as pending under the fresh reference.
        let record = stored(&h.store, &created.data.reference).await;
        assert_eq!(record.status(), "Pending");

        // Approval notification carries the confirm link.
        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains(&created.data.confirm_link));

        // Workflow stays parked until the user confirms.
        assert_eq!(h.workflow.resolved_count(), 0);

        // Redirect target carries the url-encoded resume token.
        let create_call = &h.api.calls()[1];
        let redirect = create_call.payload["redirect"].as_str().unwrap();
        assert!(redirect.contains("resumeToken=wf-1"), "{redirect}");
    }

    #[tokio::test]
    async fn valid_record_is_reused_and_resolves_workflow() {
        let h = harness();
        queue_creation(&h.api);
        let created = match h
            .manager
            .ensure("none", "tok", ResumeToken("wf-1".into()))
            .await
            .unwrap()
        {
            RequisitionOutcome::Created(c) => c,
            _ => panic!("expected creation"),
        };
        h.manager.confirm(&created.data.reference).await.unwrap();
        assert_eq!(h.workflow.resolved_count(), 1);

        // Second run: record valid for 90 days, new workflow invocation.
        let outcome = h
            .manager
            .ensure(&created.data.reference, "tok", ResumeToken("wf-2".into()))
            .await
            .unwrap();
        assert!(!outcome.updated());
        assert_eq!(outcome.reference(), created.data.reference);
        // Resolution used the stored token, which was already consumed by
        // the confirmation; the duplicate is swallowed, not an error.
        assert_eq!(h.workflow.resolved_count(), 1);
    }

    #[tokio::test]
    async fn expiring_record_is_superseded_by_a_new_reference() {
        let h = harness();
        queue_creation(&h.api);
        let created = match h
            .manager
            .ensure("none", "tok", ResumeToken("wf-1".into()))
            .await
            .unwrap()
        {
            RequisitionOutcome::Created(c) => c,
            _ => panic!("expected creation"),
        };

        // 30 minutes of validity left: below the one-hour threshold.
        let soon = created.data.expires_at - Duration::minutes(30);
        queue_creation(&h.api);
        let outcome = h
            .manager
            .ensure_at(
                &created.data.reference,
                "tok",
                ResumeToken("wf-2".into()),
                soon,
            )
            .await
            .unwrap();

        assert!(outcome.updated());
        assert_ne!(outcome.reference(), created.data.reference);
        // The superseded record is retained for audit.
        assert_eq!(h.store.len(), 2);
    }

    #[tokio::test]
    async fn unknown_institution_is_fatal() {
        let h = harness();
        h.api
            .queue_ok("institutions", json!([{ "id": "X", "name": "Some Other Bank" }]));

        let err = h
            .manager
            .ensure("none", "tok", ResumeToken("wf-1".into()))
            .await
            .unwrap_err();
        assert!(
            matches!(err, HousetabError::InstitutionNotFound { .. }),
            "{err}"
        );
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn confirm_unknown_reference_is_not_found() {
        let h = harness();
        let err = h.manager.confirm("missing").await.unwrap_err();
        assert!(matches!(err, HousetabError::NotFound(_)), "{err}");
    }

    #[tokio::test]
    async fn duplicate_confirmation_is_benign() {
        let h = harness();
        queue_creation(&h.api);
        let created = match h
            .manager
            .ensure("none", "tok", ResumeToken("wf-1".into()))
            .await
            .unwrap()
        {
            RequisitionOutcome::Created(c) => c,
            _ => panic!("expected creation"),
        };

        h.manager.confirm(&created.data.reference).await.unwrap();
        // Second delivery of the same callback: status stays confirmed, the
        // consumed resume token is tolerated.
        let confirmed = h.manager.confirm(&created.data.reference).await.unwrap();
        assert_eq!(confirmed.data.reference, created.data.reference);
        assert_eq!(h.workflow.resolved_count(), 1);
        assert!(stored(&h.store, &created.data.reference).await.is_confirmed());
    }
}
