// Login and refresh-token rotation.
//
// Login issues a full access+refresh pair and persists the refresh digest
// and last-login timestamp. Refresh verifies the presented token against
// both the signature and the stored digest, then rotates: a new pair is
// issued and the new digest replaces the old one, which is what makes a
// stolen refresh token usable at most once.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use credo_core::error::{AuthError, AuthResult};
use credo_core::models::{normalize_email, Account, TokenClaims, TokenPair};

use crate::audit::{actions, outcomes};
use crate::context::{AuthContext, RequestContext};
use crate::crypto::password;
use crate::rate_limit::RateLimiter;
use crate::tokens::KeyClass;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Handle email/password login.
pub async fn handle_login(
    ctx: &AuthContext,
    request: LoginRequest,
    rctx: &RequestContext,
) -> AuthResult<LoginResponse> {
    let started = Instant::now();
    let result = login_inner(ctx, &request, rctx).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    ctx.metrics.record_attempt("login", outcome);
    ctx.metrics.record_duration("login", outcome, started.elapsed());

    result
}

async fn login_inner(
    ctx: &AuthContext,
    request: &LoginRequest,
    rctx: &RequestContext,
) -> AuthResult<LoginResponse> {
    let rate_key = RateLimiter::key(rctx.identity(), "login", None);
    ctx.rate_limiter.check(&rate_key)?;

    let email = normalize_email(&request.email);
    let mut account = match ctx.accounts.find_by_email(&email).await? {
        Some(account) => account,
        None => {
            // Hash anyway so response timing does not reveal which emails
            // have accounts.
            let _ = password::hash_password(&request.password, &ctx.options.password.pepper);
            return Err(AuthError::InvalidCredentials);
        }
    };

    let valid = password::verify_password(
        &account.password_digest,
        &request.password,
        &ctx.options.password.pepper,
    )?;
    if !valid {
        ctx.audit
            .append(
                Some(account.id),
                actions::USER_LOGIN,
                outcomes::FAILURE,
                rctx,
                serde_json::json!({ "email": account.email }),
            )
            .await;
        return Err(AuthError::InvalidCredentials);
    }

    let pair = ctx.tokens.issue_pair(&TokenClaims::for_account(&account))?;

    account.refresh_token_digest = Some(ctx.tokens.digest(&pair.refresh_token)?);
    account.last_login = Some(Utc::now());
    ctx.accounts.update(&account).await?;

    ctx.audit
        .append(
            Some(account.id),
            actions::USER_LOGIN,
            outcomes::SUCCESS,
            rctx,
            serde_json::json!({ "email": account.email }),
        )
        .await;

    Ok(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: ctx.tokens.access_ttl().as_secs(),
        account,
    })
}

/// Rotate a refresh token into a new access+refresh pair.
///
/// Every rejection (bad signature, expiry, unknown subject, deactivated
/// account, missing or mismatched stored digest) is the same
/// `InvalidToken`, so a caller learns nothing about why.
pub async fn handle_refresh(
    ctx: &AuthContext,
    refresh_token: &str,
    rctx: &RequestContext,
) -> AuthResult<TokenPair> {
    let started = Instant::now();
    let result = refresh_inner(ctx, refresh_token, rctx).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    ctx.metrics.record_attempt("refresh", outcome);
    ctx.metrics.record_duration("refresh", outcome, started.elapsed());

    result
}

async fn refresh_inner(
    ctx: &AuthContext,
    refresh_token: &str,
    rctx: &RequestContext,
) -> AuthResult<TokenPair> {
    let claims = ctx.tokens.verify(refresh_token, KeyClass::Refresh)?;

    let mut account = ctx
        .accounts
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    if !account.is_active {
        return Err(AuthError::InvalidToken);
    }

    let stored_digest = account
        .refresh_token_digest
        .as_deref()
        .ok_or(AuthError::InvalidToken)?;
    if !ctx.tokens.matches(refresh_token, stored_digest)? {
        return Err(AuthError::InvalidToken);
    }

    // Rotation: the new digest supersedes the old one, so the token just
    // presented can never be used again.
    let pair = ctx.tokens.issue_pair(&TokenClaims::for_account(&account))?;
    account.refresh_token_digest = Some(ctx.tokens.digest(&pair.refresh_token)?);
    ctx.accounts.update(&account).await?;

    ctx.audit
        .append(
            Some(account.id),
            actions::TOKEN_REFRESH,
            outcomes::SUCCESS,
            rctx,
            serde_json::json!({ "email": account.email }),
        )
        .await;

    Ok(pair)
}
