// Email verification tokens: opaque, single-use, 24 h expiry.

use chrono::Utc;

use credo_core::error::{AuthError, AuthResult};
use credo_core::models::{Account, EmailVerificationToken};

use crate::audit::{actions, outcomes};
use crate::context::{AuthContext, RequestContext};
use crate::crypto::random;

/// Issue a fresh verification token for an account.
pub async fn issue_verification_token(ctx: &AuthContext, account: &Account) -> AuthResult<String> {
    let token = random::generate_hex_token(32);
    let ttl = chrono::Duration::from_std(ctx.options.verification.token_ttl)
        .unwrap_or_else(|_| chrono::Duration::hours(24));

    ctx.verification_tokens
        .insert(EmailVerificationToken::new(account.id, &token, ttl))
        .await?;

    Ok(token)
}

/// Consume a verification token and mark the account's email verified.
///
/// The token is single-use: it is deleted on success, and also when it is
/// discovered expired or the account turns out to be verified already.
pub async fn verify_email(ctx: &AuthContext, token: &str, rctx: &RequestContext) -> AuthResult<()> {
    let record = ctx
        .verification_tokens
        .find_by_token(token)
        .await?
        .ok_or_else(|| AuthError::not_found("verification token"))?;

    if record.is_expired(Utc::now()) {
        ctx.verification_tokens.delete(record.id).await?;
        return Err(AuthError::validation("token", "Verification token has expired"));
    }

    let mut account = ctx
        .accounts
        .find_by_id(record.account_id)
        .await?
        .ok_or_else(|| AuthError::not_found("account"))?;

    if account.email_verified {
        ctx.verification_tokens.delete(record.id).await?;
        return Err(AuthError::validation("token", "Email already verified"));
    }

    account.email_verified = true;
    ctx.accounts.update(&account).await?;
    ctx.verification_tokens.delete(record.id).await?;

    ctx.audit
        .append(
            Some(account.id),
            actions::EMAIL_VERIFY,
            outcomes::SUCCESS,
            rctx,
            serde_json::json!({ "email": account.email }),
        )
        .await;

    Ok(())
}
