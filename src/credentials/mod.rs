//! Credential lifecycle management.
//!
//! Decides whether the access/refresh token pair handed in by the
//! orchestrator is still usable, and produces a refreshed or fully reissued
//! pair when it is not. The decision is a pure function of the two remaining
//! validity windows; only the chosen action touches the network or the
//! parameter store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::api::BankDataClient;
use crate::config::PipelineConfig;
use crate::domain::credentials::{ApiCredential, CredentialPair, CredentialUpdate, ExpiringToken};
use crate::error::{HousetabError, Result};
use crate::expiry::{self, ACCESS_TOKEN_THRESHOLD_MINUTES, REFRESH_TOKEN_THRESHOLD_MINUTES};
use crate::ports::ParameterStore;

/// What `ensure` decided to do with the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// Access token still valid; nothing touched.
    KeptCurrent,
    /// Access token exchanged via the refresh token; refresh token untouched.
    Refreshed,
    /// Both tokens replaced via the secret pair.
    Reissued,
}

/// Pick the action from the two remaining windows.
fn plan(access_remaining: chrono::Duration, refresh_remaining: chrono::Duration) -> CredentialOutcome {
    if expiry::is_valid(access_remaining, ACCESS_TOKEN_THRESHOLD_MINUTES) {
        CredentialOutcome::KeptCurrent
    } else if expiry::is_valid(refresh_remaining, REFRESH_TOKEN_THRESHOLD_MINUTES) {
        CredentialOutcome::Refreshed
    } else {
        CredentialOutcome::Reissued
    }
}

/// Manager for the aggregator token pair.
pub struct CredentialManager<B, P> {
    api: Arc<B>,
    parameters: Arc<P>,
    config: PipelineConfig,
}

impl<B: BankDataClient, P: ParameterStore> CredentialManager<B, P> {
    pub fn new(api: Arc<B>, parameters: Arc<P>, config: PipelineConfig) -> Self {
        Self {
            api,
            parameters,
            config,
        }
    }

    /// Return a usable credential pair, refreshing or reissuing as needed.
    ///
    /// Upstream auth failures and missing secret parameters are fatal to the
    /// invocation; no internal retries.
    #[tracing::instrument(skip_all)]
    pub async fn ensure(&self, current: CredentialPair) -> Result<CredentialUpdate> {
        self.ensure_at(current, Utc::now()).await
    }

    async fn ensure_at(
        &self,
        current: CredentialPair,
        now: DateTime<Utc>,
    ) -> Result<CredentialUpdate> {
        let access_remaining = expiry::time_remaining(current.access_token.expires_at, now);
        let refresh_remaining = expiry::time_remaining(current.refresh_token.expires_at, now);

        match plan(access_remaining, refresh_remaining) {
            CredentialOutcome::KeptCurrent => {
                tracing::info!("Access token still valid, not updating or refreshing");
                Ok(CredentialUpdate {
                    access_token: ApiCredential::unchanged(current.access_token),
                    refresh_token: ApiCredential::unchanged(current.refresh_token),
                })
            }
            CredentialOutcome::Refreshed => {
                tracing::info!("Refreshing access token");
                counter!("housetab_token_refresh_total").increment(1);
                let grant = self
                    .api
                    .refresh_access(&current.refresh_token.value)
                    .await?;
                let access =
                    ExpiringToken::with_lifetime(grant.access, grant.access_expires, now);
                Ok(CredentialUpdate {
                    access_token: ApiCredential::replaced(access),
                    refresh_token: ApiCredential::unchanged(current.refresh_token),
                })
            }
            CredentialOutcome::Reissued => {
                tracing::info!("Requesting new access and refresh tokens");
                counter!("housetab_token_reissue_total").increment(1);
                let secret_id = self.secret(&self.config.secret_id_param).await?;
                let secret_key = self.secret(&self.config.secret_key_param).await?;
                let grant = self.api.issue_tokens(&secret_id, &secret_key).await?;
                Ok(CredentialUpdate {
                    access_token: ApiCredential::replaced(ExpiringToken::with_lifetime(
                        grant.access,
                        grant.access_expires,
                        now,
                    )),
                    refresh_token: ApiCredential::replaced(ExpiringToken::with_lifetime(
                        grant.refresh,
                        grant.refresh_expires,
                        now,
                    )),
                })
            }
        }
    }

    async fn secret(&self, name: &str) -> Result<String> {
        self.parameters.get(name).await?.ok_or_else(|| {
            HousetabError::Configuration(format!("parameter {name} not found"))
        })
    }
}
