//! Production aggregator client using reqwest.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{HousetabError, Result};

use super::types::{
    self, AccessGrant, ApiRequisition, DateRange, Institution, RequisitionDetails,
    RequisitionRequest, TokenGrant,
};
use super::BankDataClient;

/// Which error variant a failed endpoint call maps to.
#[derive(Clone, Copy)]
enum EndpointKind {
    Auth,
    Api,
}

/// Production client for the aggregator's REST API.
#[derive(Clone)]
pub struct RestBankDataClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestBankDataClient {
    /// Create a client against the given API base URL
    /// (e.g. `https://bankaccountdata.gocardless.com/api/v2`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read a response body, mapping non-success statuses to the upstream
    /// error variant for `kind` and the body to JSON.
    async fn read_json(
        response: reqwest::Response,
        kind: EndpointKind,
        context: &str,
    ) -> Result<serde_json::Value> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(status, context, "Received aggregator response");
        if !(200..300).contains(&status) {
            return Err(match kind {
                EndpointKind::Auth => HousetabError::UpstreamAuth { status, body },
                EndpointKind::Api => HousetabError::UpstreamApi { status, body },
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| HousetabError::Validation(format!("{context}: invalid JSON body: {e}")))
    }

    async fn get(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;
        Self::read_json(response, EndpointKind::Api, context).await
    }
}

#[async_trait]
impl BankDataClient for RestBankDataClient {
    #[tracing::instrument(skip_all)]
    async fn issue_tokens(&self, secret_id: &str, secret_key: &str) -> Result<TokenGrant> {
        tracing::info!("Requesting new access and refresh tokens");
        let response = self
            .client
            .post(self.url("/token/new/"))
            .header("Accept", "application/json")
            .json(&json!({ "secret_id": secret_id, "secret_key": secret_key }))
            .send()
            .await?;
        let body = Self::read_json(response, EndpointKind::Auth, "token issue").await?;
        types::parse_response(body, "token issue")
    }

    #[tracing::instrument(skip_all)]
    async fn refresh_access(&self, refresh_token: &str) -> Result<AccessGrant> {
        tracing::info!("Refreshing access token");
        let response = self
            .client
            .post(self.url("/token/refresh/"))
            .header("Accept", "application/json")
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await?;
        let body = Self::read_json(response, EndpointKind::Auth, "token refresh").await?;
        types::parse_response(body, "token refresh")
    }

    #[tracing::instrument(skip(self, access_token))]
    async fn list_institutions(
        &self,
        access_token: &str,
        country: &str,
    ) -> Result<Vec<Institution>> {
        let body = self
            .get(
                access_token,
                "/institutions/",
                &[("country", country)],
                "institution list",
            )
            .await?;
        types::parse_response(body, "institution list")
    }

    #[tracing::instrument(skip(self, access_token, request), fields(institution_id = %request.institution_id))]
    async fn create_requisition(
        &self,
        access_token: &str,
        request: &RequisitionRequest,
    ) -> Result<ApiRequisition> {
        let response = self
            .client
            .post(self.url("/requisitions/"))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;
        let body = Self::read_json(response, EndpointKind::Api, "requisition create").await?;
        types::parse_response(body, "requisition create")
    }

    #[tracing::instrument(skip(self, access_token))]
    async fn requisition_details(
        &self,
        access_token: &str,
        requisition_id: &str,
    ) -> Result<RequisitionDetails> {
        let body = self
            .get(
                access_token,
                &format!("/requisitions/{requisition_id}/"),
                &[],
                "requisition details",
            )
            .await?;
        types::parse_response(body, "requisition details")
    }

    #[tracing::instrument(skip(self, access_token))]
    async fn account_transactions(
        &self,
        access_token: &str,
        account_id: &str,
        range: &DateRange,
    ) -> Result<serde_json::Value> {
        self.get(
            access_token,
            &format!("/accounts/{account_id}/transactions/"),
            &[
                ("date_from", &range.date_from.to_string()),
                ("date_to", &range.date_to.to_string()),
            ],
            "account transactions",
        )
        .await
    }
}
