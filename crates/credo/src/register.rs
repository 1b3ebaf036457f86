// Registration orchestrator.
//
// Linear pipeline: rate check → captcha → idempotent replay → MX check →
// uniqueness (email, username) → reserved name → breach screen → persist →
// best-effort downstream provisioning → verification token → access token →
// idempotency record. The only mutation before the account insert is the
// rate-limit bookkeeping, so every failure up to that point leaves nothing
// behind.
//
// Provisioning failure is non-terminal by design: the account is kept, a
// compensation job repairs the downstream profile later, and the caller
// never sees the instability.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use credo_core::error::{AuthError, AuthResult};
use credo_core::models::{normalize_email, Account, ProvisioningJob, TokenClaims};

use crate::audit::{actions, outcomes};
use crate::context::{AuthContext, RequestContext};
use crate::crypto::password;
use crate::rate_limit::RateLimiter;
use crate::reserved;
use crate::verification;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Client-supplied replay key; optional.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub account: Account,
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Whether this response was replayed from the idempotency ledger.
    #[serde(skip_serializing)]
    pub replayed: bool,
}

/// Basic shape check: one `@`, non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    !parts[0].is_empty() && !parts[1].is_empty() && parts[1].contains('.')
}

/// Handle a registration request.
///
/// Every terminal outcome (success, replay, or any failure) is mirrored to
/// the metrics sink and the audit trail, tagged by outcome.
pub async fn handle_register(
    ctx: &AuthContext,
    request: RegistrationRequest,
    rctx: &RequestContext,
) -> AuthResult<RegistrationResponse> {
    let started = Instant::now();
    let result = register_inner(ctx, &request, rctx).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    ctx.metrics.record_attempt("register", outcome);
    ctx.metrics.record_duration("register", outcome, started.elapsed());

    if let Err(e) = &result {
        ctx.audit
            .append(
                None,
                actions::USER_REGISTER,
                outcomes::FAILURE,
                rctx,
                serde_json::json!({
                    "email": normalize_email(&request.email),
                    "error": e.code(),
                }),
            )
            .await;
    }

    result
}

async fn register_inner(
    ctx: &AuthContext,
    request: &RegistrationRequest,
    rctx: &RequestContext,
) -> AuthResult<RegistrationResponse> {
    // 1. Admission. The per-email sub-key keeps NAT neighbors from
    //    consuming each other's quota.
    let rate_key = RateLimiter::key(rctx.identity(), "register", Some(&request.email));
    ctx.rate_limiter.check(&rate_key)?;

    // 2. CAPTCHA, only when configured.
    if let Some(captcha) = &ctx.captcha_oracle {
        let token = rctx
            .captcha_token
            .as_deref()
            .ok_or_else(|| AuthError::validation("captcha", "CAPTCHA token is required"))?;
        if !captcha.verify(token).await {
            return Err(AuthError::validation("captcha", "CAPTCHA verification failed"));
        }
    }

    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(AuthError::validation("email", "Invalid email address"));
    }

    // 3. Idempotent replay: same (email, key) inside the window returns
    //    the original result without touching anything else.
    if let Some(key) = request.idempotency_key.as_deref() {
        if let Some(record) = ctx.ledger.lookup(&email, key).await? {
            if let Some(account) = ctx.accounts.find_by_id(record.account_id).await? {
                return Ok(RegistrationResponse {
                    account,
                    access_token: record.response_token,
                    expires_in: ctx.tokens.access_ttl().as_secs(),
                    replayed: true,
                });
            }
        }
    }

    // 4. MX screening, feature-flagged; the oracle fails open internally.
    if ctx.options.oracles.mx_check_enabled {
        let domain = email.split('@').nth(1).unwrap_or_default();
        if !ctx.mx_oracle.has_mx(domain).await {
            return Err(AuthError::validation(
                "email",
                "Email domain does not have valid MX records",
            ));
        }
    }

    // 5. Password policy.
    if request.password.len() < ctx.options.password.min_length {
        return Err(AuthError::validation("password", "Password is too short"));
    }
    if request.password.len() > ctx.options.password.max_length {
        return Err(AuthError::validation("password", "Password is too long"));
    }

    // 6. Uniqueness and reservation checks. Advisory only; the store's
    //    unique indexes are the real arbiter under concurrency.
    if ctx.accounts.find_by_email(&email).await?.is_some() {
        return Err(AuthError::conflict("email"));
    }
    if ctx.accounts.find_by_username(&request.username).await?.is_some() {
        return Err(AuthError::conflict("username"));
    }
    if reserved::is_reserved(&request.username) {
        return Err(AuthError::conflict("username"));
    }

    // 7. Breach screening, feature-flagged. An oracle outage fails open.
    if ctx.options.oracles.breach_check_enabled {
        match ctx.breach_oracle.is_breached(&request.password).await {
            Ok(true) => {
                return Err(AuthError::validation(
                    "password",
                    "Password has appeared in known breaches",
                ));
            }
            Ok(false) => {}
            Err(e) => {
                ctx.logger
                    .warn(&format!("breach oracle unavailable, failing open: {e}"));
            }
        }
    }

    // 8. Hash before creating, so a hashing failure leaves no orphaned row.
    let digest = password::hash_password(&request.password, &ctx.options.password.pepper)?;

    // 9. Persist. A concurrent registration for the same email/username
    //    loses here with a unique violation, surfaced as a Conflict.
    let account = ctx
        .accounts
        .create(Account::new(
            &email,
            &request.username,
            &request.first_name,
            &request.last_name,
            digest,
        ))
        .await?;

    // 10. Best-effort downstream provisioning. Failure hands off to the
    //     compensation queue; a queue outage is logged, never propagated,
    //     because the registration response is already committed.
    let provisioned = ctx
        .provisioning
        .provision(account.id, &account.username, &rctx.request_id)
        .await;
    if !provisioned {
        let job = ProvisioningJob {
            account_id: account.id,
            username: account.username.clone(),
            correlation_id: rctx.request_id.clone(),
            attempt_number: 0,
        };
        match ctx.queue.enqueue(job, std::time::Duration::ZERO).await {
            Ok(()) => ctx.logger.warn(&format!(
                "profile creation failed for account {}, enqueued compensating job",
                account.id
            )),
            Err(e) => ctx.logger.error(&format!(
                "profile creation failed for account {} and queue is unavailable, \
                 manual retry required: {e}",
                account.id
            )),
        }
    }

    // 11. Email verification flow. The send itself belongs to the
    //     notification service; here the link is logged.
    let verification_token = verification::issue_verification_token(ctx, &account).await?;
    ctx.logger.info(&format!(
        "email_verification_sent account={} link={}?token={}",
        account.id, ctx.options.verification.link_base_url, verification_token
    ));

    ctx.audit
        .append(
            Some(account.id),
            actions::USER_REGISTER,
            outcomes::SUCCESS,
            rctx,
            serde_json::json!({
                "email": account.email,
                "username": account.username,
            }),
        )
        .await;

    // 12. Issue the access token and record the idempotent result. If a
    //     concurrent retry with the same (email, key) stored first, answer
    //     with the winner's token.
    let mut access_token = ctx.tokens.issue_access_token(&TokenClaims::for_account(&account))?;
    if let Some(key) = request.idempotency_key.as_deref() {
        let stored = ctx.ledger.store(&email, key, account.id, &access_token).await?;
        access_token = stored.response_token;
    }

    Ok(RegistrationResponse {
        account,
        access_token,
        expires_in: ctx.tokens.access_ttl().as_secs(),
        replayed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user+tag@example.com"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: RegistrationRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "Str0ngP@ssw0rd!",
            "username": "alice",
            "firstName": "A",
            "lastName": "L",
            "idempotencyKey": "k1",
        }))
        .unwrap();
        assert_eq!(request.first_name, "A");
        assert_eq!(request.idempotency_key.as_deref(), Some("k1"));

        let without_key: RegistrationRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "p",
            "username": "alice",
            "firstName": "A",
            "lastName": "L",
        }))
        .unwrap();
        assert!(without_key.idempotency_key.is_none());
    }
}
