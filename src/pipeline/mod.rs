//! Pipeline stages around the classifier and exporter.
//!
//! Each method is one orchestrator-driven stage invocation: fetch-and-
//! classify, export-to-CSV, and mail-the-reports. Stages share no in-process
//! state; every artifact of one run is written under a fresh run identifier
//! and prior runs are never updated in place.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::types::{DateRange, TransactionsDocument};
use crate::api::BankDataClient;
use crate::classify;
use crate::config::PipelineConfig;
use crate::domain::requisition::AnyRequisition;
use crate::domain::transaction::{AccountUser, ClassifiedTransaction};
use crate::error::{HousetabError, Result};
use crate::export;
use crate::ports::{MailAttachment, Mailer, ObjectStore, OutboundMail, RequisitionStore};

/// Fresh identifier grouping all artifacts of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn fresh() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object-store key layout for one account's artifacts.
pub mod keys {
    use super::RunId;

    pub fn raw_transactions(account_id: &str, run_id: RunId) -> String {
        format!("accounts/{account_id}/transactions/raw/{run_id}")
    }

    pub fn formatted_transactions(account_id: &str, run_id: RunId) -> String {
        format!("accounts/{account_id}/transactions/formatted/{run_id}")
    }

    pub fn expenses_csv(account_id: &str, run_id: RunId) -> String {
        format!("accounts/{account_id}/transactions/csv/expenses/{run_id}")
    }

    pub fn top_ups_csv(account_id: &str, run_id: RunId) -> String {
        format!("accounts/{account_id}/transactions/csv/top-ups/{run_id}")
    }
}

/// First and last day of the month before the one containing `today`.
///
/// The orchestrator runs the pipeline early each month for the month just
/// ended and passes this range as `DateFrom`/`DateTo`.
pub fn previous_month_range(today: NaiveDate) -> DateRange {
    // The first of the current month is always valid.
    let month_start = today.with_day(1).expect("day 1 is valid for every month");
    let date_to = month_start - Duration::days(1);
    let date_from = date_to.with_day(1).expect("day 1 is valid for every month");
    DateRange { date_from, date_to }
}

/// Output of the fetch-and-classify stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FetchOutput {
    pub account_id: String,
    pub run_id: RunId,
    /// Key of the verbatim upstream document, stored before parsing.
    pub raw_transactions_key: String,
    /// Key of the classified-transaction artifact.
    pub formatted_transactions_key: String,
}

/// Output of the CSV export stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportOutput {
    pub expenses_csv_key: String,
    pub top_ups_csv_key: String,
}

/// The transaction fetch/classify/export stages.
pub struct TransactionPipeline<B, R, O> {
    api: Arc<B>,
    requisitions: Arc<R>,
    objects: Arc<O>,
    config: PipelineConfig,
}

impl<B, R, O> TransactionPipeline<B, R, O>
where
    B: BankDataClient,
    R: RequisitionStore,
    O: ObjectStore,
{
    pub fn new(
        api: Arc<B>,
        requisitions: Arc<R>,
        objects: Arc<O>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            api,
            requisitions,
            objects,
            config,
        }
    }

    /// Resolve the account id behind a confirmed requisition reference.
    ///
    /// Fails `NotFound` for an unknown reference and `Unconfirmed` while the
    /// user has not yet approved the consent (the caller retries later).
    async fn account_id(&self, reference: &str, access_token: &str) -> Result<String> {
        let record = self.requisitions.get(reference).await?.ok_or_else(|| {
            HousetabError::NotFound(format!("requisition reference {reference}"))
        })?;
        let confirmed = match record {
            AnyRequisition::Confirmed(r) => r,
            AnyRequisition::Pending(_) => {
                return Err(HousetabError::Unconfirmed(reference.to_string()));
            }
        };
        let details = self
            .api
            .requisition_details(access_token, &confirmed.data.id)
            .await?;
        Ok(details.first_account()?.to_string())
    }

    /// Load and validate the account-user roster from object storage.
    async fn roster(&self) -> Result<Vec<AccountUser>> {
        let key = &self.config.account_users_key;
        let bytes = self
            .objects
            .get(key)
            .await?
            .ok_or_else(|| HousetabError::NotFound(format!("account users object {key}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HousetabError::Validation(format!("account users object {key}: {e}")))
    }

    /// Fetch one month of transactions, classify them and persist both the
    /// raw and the classified artifacts under a fresh run identifier.
    #[tracing::instrument(skip(self, access_token))]
    pub async fn fetch(
        &self,
        reference: &str,
        access_token: &str,
        range: DateRange,
    ) -> Result<FetchOutput> {
        let account_id = self.account_id(reference, access_token).await?;
        tracing::info!(account_id, "Resolved account for requisition");

        let roster = self.roster().await?;
        let raw = self
            .api
            .account_transactions(access_token, &account_id, &range)
            .await?;

        let run_id = RunId::fresh();
        let raw_key = keys::raw_transactions(&account_id, run_id);
        self.objects
            .put(&raw_key, serde_json::to_vec(&raw)?, "application/json")
            .await?;
        tracing::info!(key = %raw_key, "Stored raw transactions");

        let document = TransactionsDocument::parse(raw)?;
        let classified = classify::classify_document(&document, &roster, &self.config.currency);
        tracing::info!(count = classified.len(), "Classified transactions");

        let formatted_key = keys::formatted_transactions(&account_id, run_id);
        self.objects
            .put(
                &formatted_key,
                serde_json::to_vec(&classified)?,
                "application/json",
            )
            .await?;
        tracing::info!(key = %formatted_key, "Stored classified transactions");

        Ok(FetchOutput {
            account_id,
            run_id,
            raw_transactions_key: raw_key,
            formatted_transactions_key: formatted_key,
        })
    }

    /// Render the CSV reports from a stored classified artifact.
    #[tracing::instrument(skip(self))]
    pub async fn export(
        &self,
        account_id: &str,
        run_id: RunId,
        formatted_transactions_key: &str,
    ) -> Result<ExportOutput> {
        let bytes = self
            .objects
            .get(formatted_transactions_key)
            .await?
            .ok_or_else(|| {
                HousetabError::NotFound(format!(
                    "classified transactions object {formatted_transactions_key}"
                ))
            })?;
        let classified: Vec<ClassifiedTransaction> = serde_json::from_slice(&bytes)?;

        let reports = export::render_reports(&classified)?;
        let expenses_key = keys::expenses_csv(account_id, run_id);
        let top_ups_key = keys::top_ups_csv(account_id, run_id);
        self.objects
            .put(&expenses_key, reports.expenses.into_bytes(), "text/csv")
            .await?;
        self.objects
            .put(&top_ups_key, reports.top_ups.into_bytes(), "text/csv")
            .await?;
        tracing::info!(expenses = %expenses_key, top_ups = %top_ups_key, "Stored CSV reports");

        Ok(ExportOutput {
            expenses_csv_key: expenses_key,
            top_ups_csv_key: top_ups_key,
        })
    }

    /// Mail both CSV artifacts for a month, returning the message id.
    #[tracing::instrument(skip(self, mailer))]
    pub async fn send<M: Mailer>(
        &self,
        mailer: &M,
        month: &str,
        from: &str,
        to: &str,
        reports: &ExportOutput,
    ) -> Result<String> {
        let expenses = self.csv_attachment(&reports.expenses_csv_key, month, "expenses").await?;
        let top_ups = self.csv_attachment(&reports.top_ups_csv_key, month, "top-ups").await?;

        let message_id = mailer
            .send(OutboundMail {
                from: from.to_string(),
                to: to.to_string(),
                subject: format!("Shared Account Files For {month}"),
                body: format!(
                    "Find attached the expenses and top ups CSV files for the month {month}"
                ),
                attachments: vec![expenses, top_ups],
            })
            .await?;
        tracing::info!(message_id, "Sent report mail");
        Ok(message_id)
    }

    async fn csv_attachment(&self, key: &str, month: &str, suffix: &str) -> Result<MailAttachment> {
        let content = self
            .objects
            .get(key)
            .await?
            .ok_or_else(|| HousetabError::NotFound(format!("report object {key}")))?;
        Ok(MailAttachment {
            filename: format!("{month}-{suffix}.csv"),
            content_type: "text/csv".to_string(),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn previous_month_range_mid_month() {
        let range = previous_month_range(day(2026, 8, 27));
        assert_eq!(range.date_from, day(2026, 7, 1));
        assert_eq!(range.date_to, day(2026, 7, 31));
    }

    #[test]
    fn previous_month_range_crosses_year_boundary() {
        let range = previous_month_range(day(2026, 1, 3));
        assert_eq!(range.date_from, day(2025, 12, 1));
        assert_eq!(range.date_to, day(2025, 12, 31));
    }

    #[test]
    fn previous_month_range_handles_february() {
        let range = previous_month_range(day(2026, 3, 31));
        assert_eq!(range.date_from, day(2026, 2, 1));
        assert_eq!(range.date_to, day(2026, 2, 28));
    }

    #[test]
    fn key_layout_shares_one_run_id() {
        let run_id = RunId::fresh();
        let raw = keys::raw_transactions("acc-1", run_id);
        let formatted = keys::formatted_transactions("acc-1", run_id);
        assert_eq!(raw, format!("accounts/acc-1/transactions/raw/{run_id}"));
        assert_eq!(
            formatted,
            format!("accounts/acc-1/transactions/formatted/{run_id}")
        );
        assert!(keys::expenses_csv("acc-1", run_id).ends_with(&run_id.to_string()));
        assert!(keys::top_ups_csv("acc-1", run_id).contains("/csv/top-ups/"));
    }
}
