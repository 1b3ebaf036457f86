// Token lifecycle manager.
//
// Issues and verifies access (15 min) and refresh (7 d) tokens, each signed
// with its own key, and digests refresh tokens for at-rest storage. Only
// the digest of the currently valid refresh token is persisted (on the
// account), which is what makes rotation work: once a new pair is issued,
// the old refresh token no longer matches the stored digest.

use std::time::Duration;

use credo_core::error::AuthResult;
use credo_core::logger::AuthLogger;
use credo_core::models::{TokenClaims, TokenPair};
use credo_core::options::{KeyOptions, TokenOptions};

use crate::crypto::{jwt, password};

/// Which signing key a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Access,
    Refresh,
}

/// Stateless signing/verification over the configured key material.
#[derive(Debug)]
pub struct TokenManager {
    access_key: jwt::SigningKey,
    refresh_key: jwt::SigningKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenManager {
    pub fn new(keys: &KeyOptions, token: &TokenOptions, logger: &AuthLogger) -> AuthResult<Self> {
        Self::with_ttls(
            keys,
            token.access_ttl.as_secs() as i64,
            token.refresh_ttl.as_secs() as i64,
            logger,
        )
    }

    /// Explicit TTLs, seconds. Negative values issue already-expired tokens,
    /// which the expiry tests rely on.
    pub fn with_ttls(
        keys: &KeyOptions,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
        logger: &AuthLogger,
    ) -> AuthResult<Self> {
        Ok(Self {
            access_key: jwt::SigningKey::from_material(&keys.access, "access", logger)?,
            refresh_key: jwt::SigningKey::from_material(&keys.refresh, "refresh", logger)?,
            access_ttl_secs,
            refresh_ttl_secs,
        })
    }

    pub fn issue_access_token(&self, claims: &TokenClaims) -> AuthResult<String> {
        jwt::sign(claims, &self.access_key, self.access_ttl_secs)
    }

    pub fn issue_refresh_token(&self, claims: &TokenClaims) -> AuthResult<String> {
        jwt::sign(claims, &self.refresh_key, self.refresh_ttl_secs)
    }

    pub fn issue_pair(&self, claims: &TokenClaims) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(claims)?,
            refresh_token: self.issue_refresh_token(claims)?,
        })
    }

    /// Verify a token against the named key class.
    ///
    /// Fails with `InvalidToken` on signature mismatch or expiry; the two
    /// are indistinguishable to the caller.
    pub fn verify(&self, token: &str, class: KeyClass) -> AuthResult<TokenClaims> {
        let key = match class {
            KeyClass::Access => &self.access_key,
            KeyClass::Refresh => &self.refresh_key,
        };
        jwt::verify(token, key)
    }

    /// One-way adaptive digest of a refresh token for at-rest storage.
    pub fn digest(&self, token: &str) -> AuthResult<String> {
        password::hash_password(token, "")
    }

    /// Constant-time check of a refresh token against a stored digest.
    pub fn matches(&self, token: &str, digest: &str) -> AuthResult<bool> {
        password::verify_password(digest, token, "")
    }

    /// Access token lifetime, for `expires_in` response fields.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs.max(0) as u64)
    }
}
