//! Credential and consent lifecycle tests: reissue-then-consent bootstrap,
//! confirmation callback, and renewal of an expiring consent.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use housetab::api::MockBankDataClient;
use housetab::ports::{
    MemoryParameterStore, MemoryRequisitionStore, MemoryWorkflowSignaler, RecordingNotifier,
    RequisitionStore,
};
use housetab::{
    CredentialManager, CredentialPair, ExpiringToken, PipelineConfig, RequisitionManager,
    RequisitionOutcome, ResumeToken,
};

fn config() -> PipelineConfig {
    PipelineConfig {
        bank_name: "Example Bank".to_string(),
        ..PipelineConfig::default()
    }
}

fn token(value: &str, minutes: i64) -> ExpiringToken {
    ExpiringToken {
        value: value.to_string(),
        expires_at: Utc::now() + Duration::minutes(minutes),
    }
}

fn queue_requisition_creation(api: &MockBankDataClient) {
    api.queue_ok(
        "institutions",
        json!([{ "id": "EXAMPLE_BANK_GB", "name": "Example Bank" }]),
    );
    api.queue_ok(
        "requisitions/create",
        json!({
            "id": "req-api-id-1",
            "link": "https://aggregator.example/psd2/start/req-api-id-1",
            "created": "2026-08-01T10:00:00Z",
            "institution_id": "EXAMPLE_BANK_GB"
        }),
    );
}

#[test_log::test(tokio::test)]
async fn bootstrap_reissues_credentials_then_creates_consent() {
    let api = Arc::new(MockBankDataClient::new());
    let parameters = Arc::new(MemoryParameterStore::new());
    let config = config();
    parameters.set(&config.secret_id_param, "sid");
    parameters.set(&config.secret_key_param, "skey");

    // Both tokens dead: full reissue with the secret pair.
    api.queue_ok(
        "token/new",
        json!({
            "access": "a1",
            "access_expires": 86400,
            "refresh": "r1",
            "refresh_expires": 2592000
        }),
    );
    let credentials = CredentialManager::new(api.clone(), parameters, config.clone());
    let update = credentials
        .ensure(CredentialPair {
            access_token: token("dead-a", -10),
            refresh_token: token("dead-r", -10),
        })
        .await
        .unwrap();
    assert!(update.access_token.updated && update.refresh_token.updated);

    // The fresh access token feeds consent creation.
    queue_requisition_creation(&api);
    let store = Arc::new(MemoryRequisitionStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let workflow = Arc::new(MemoryWorkflowSignaler::new());
    let requisitions = RequisitionManager::new(
        api.clone(),
        store.clone(),
        notifier.clone(),
        workflow.clone(),
        config,
    );

    let outcome = requisitions
        .ensure(
            "no-record-yet",
            &update.access_token.token.value,
            ResumeToken("wf-1".to_string()),
        )
        .await
        .unwrap();
    assert!(outcome.updated());

    // Pending record persisted, approval notification sent, workflow still
    // parked until the user follows the confirm link.
    assert_eq!(store.len(), 1);
    assert_eq!(notifier.messages().len(), 1);
    assert_eq!(workflow.resolved_count(), 0);

    // The user's confirmation callback flips the status and resumes the
    // workflow with the consent reference.
    let confirmed = requisitions.confirm(outcome.reference()).await.unwrap();
    assert_eq!(workflow.resolved_count(), 1);
    let (resolved_token, payload) = workflow.payloads().remove(0);
    assert_eq!(resolved_token, "wf-1");
    assert_eq!(
        payload["Requisition"]["Reference"],
        confirmed.data.reference.as_str()
    );
    assert!(store
        .get(&confirmed.data.reference)
        .await
        .unwrap()
        .unwrap()
        .is_confirmed());
}

#[test_log::test(tokio::test)]
async fn later_runs_reuse_the_confirmed_consent() {
    let api = Arc::new(MockBankDataClient::new());
    let store = Arc::new(MemoryRequisitionStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let workflow = Arc::new(MemoryWorkflowSignaler::new());
    let requisitions = RequisitionManager::new(
        api.clone(),
        store.clone(),
        notifier.clone(),
        workflow.clone(),
        config(),
    );

    queue_requisition_creation(&api);
    let outcome = requisitions
        .ensure("none", "access", ResumeToken("wf-1".to_string()))
        .await
        .unwrap();
    let reference = outcome.reference().to_string();
    requisitions.confirm(&reference).await.unwrap();

    // Next month's run: the stored consent has ~90 days left, so no new
    // consent is created and no new notification goes out. The stored
    // resume token was already consumed; the duplicate is benign.
    let outcome = requisitions
        .ensure(&reference, "access", ResumeToken("wf-2".to_string()))
        .await
        .unwrap();
    assert!(matches!(outcome, RequisitionOutcome::Reused(_)));
    assert_eq!(store.len(), 1);
    assert_eq!(notifier.messages().len(), 1);
    assert_eq!(api.call_count("institutions"), 1);
}

#[test_log::test(tokio::test)]
async fn resolving_an_already_resolved_task_twice_is_not_fatal() {
    let api = Arc::new(MockBankDataClient::new());
    let store = Arc::new(MemoryRequisitionStore::new());
    let workflow = Arc::new(MemoryWorkflowSignaler::new());
    let requisitions = RequisitionManager::new(
        api.clone(),
        store.clone(),
        Arc::new(RecordingNotifier::new()),
        workflow.clone(),
        config(),
    );

    queue_requisition_creation(&api);
    let outcome = requisitions
        .ensure("none", "access", ResumeToken("wf-1".to_string()))
        .await
        .unwrap();
    let reference = outcome.reference().to_string();

    // The aggregator redirect can fire the callback twice.
    requisitions.confirm(&reference).await.unwrap();
    requisitions.confirm(&reference).await.unwrap();
    assert_eq!(workflow.resolved_count(), 1);
}
