// Data model for the credential service.
//
// Secrets (password digest, refresh-token digest) are never serialized and
// never logged.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity record. Email and username are each globally unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    /// Normalized (trimmed, lowercased) email.
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Salted + peppered one-way hash. Never leaves the service.
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    /// One-way hash of the currently valid refresh token, if any.
    #[serde(skip_serializing)]
    pub refresh_token_digest: Option<String>,
}

impl Account {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password_digest: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&email.into()),
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_digest: password_digest.into(),
            is_active: true,
            email_verified: false,
            created_at: Utc::now(),
            last_login: None,
            refresh_token_digest: None,
        }
    }
}

/// Canonical form used for uniqueness checks and ledger keys.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Maps a (normalized email, client-supplied key) pair to the result a
/// previous registration attempt produced. Honored only while unexpired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub id: Uuid,
    pub email: String,
    pub key: String,
    pub account_id: Uuid,
    /// The access token returned to the original request.
    pub response_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(
        email: impl Into<String>,
        key: impl Into<String>,
        account_id: Uuid,
        response_token: impl Into<String>,
        window: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&email.into()),
            key: key.into(),
            account_id,
            response_token: response_token.into(),
            created_at: now,
            expires_at: now + window,
        }
    }

    /// A lookup after expiry is treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Single-use opaque token bound to one account. Consumed on successful
/// verification; deleted when discovered expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerificationToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EmailVerificationToken {
    pub fn new(account_id: Uuid, token: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            token: token.into(),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Append-only audit entry. Failures writing these are swallowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    pub action: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Asynchronous compensation task for a profile that could not be
/// provisioned synchronously. `attempt_number` only ever grows across
/// redeliveries; the downstream treats provisioning as idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningJob {
    pub account_id: Uuid,
    pub username: String,
    pub correlation_id: String,
    pub attempt_number: u32,
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account id.
    pub sub: Uuid,
    pub email: String,
    pub username: String,
}

impl TokenClaims {
    pub fn for_account(account: &Account) -> Self {
        Self {
            sub: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
        }
    }
}

/// Access + refresh token value pair. Never persisted as-is; only the
/// refresh token's digest is stored, on the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
