//! Credential domain types.
//!
//! Tokens are immutable once issued; a refresh or reissue supersedes the old
//! value instead of mutating it. Field names follow the stable stage
//! contract (`AccessToken: {Value, Expires}`) with expiries carried as epoch
//! seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential value with an expiry instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpiringToken {
    /// The opaque token value.
    pub value: String,
    /// When the token stops being usable.
    #[serde(rename = "Expires", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl ExpiringToken {
    /// Build a token expiring `lifetime_seconds` from `now`, as the auth
    /// endpoint reports lifetimes.
    pub fn with_lifetime(value: String, lifetime_seconds: i64, now: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: now + chrono::Duration::seconds(lifetime_seconds),
        }
    }
}

/// A token plus whether this invocation replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiCredential {
    #[serde(flatten)]
    pub token: ExpiringToken,
    pub updated: bool,
}

impl ApiCredential {
    /// Wrap an existing token that was not touched by this invocation.
    pub fn unchanged(token: ExpiringToken) -> Self {
        Self {
            token,
            updated: false,
        }
    }

    /// Wrap a freshly issued token.
    pub fn replaced(token: ExpiringToken) -> Self {
        Self {
            token,
            updated: true,
        }
    }
}

/// The access/refresh pair as passed between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialPair {
    pub access_token: ExpiringToken,
    pub refresh_token: ExpiringToken,
}

/// Output of a credential check: both tokens, each flagged if replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialUpdate {
    pub access_token: ApiCredential,
    pub refresh_token: ApiCredential,
}

impl CredentialUpdate {
    /// Whether either token was replaced by this invocation.
    pub fn any_updated(&self) -> bool {
        self.access_token.updated || self.refresh_token.updated
    }
}
