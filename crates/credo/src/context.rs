// Auth context — the fully-initialized service wiring, shared across all
// request handlers as `Arc<AuthContext>`, plus the per-request context
// threaded from the inbound boundary to the resilience layer.

use std::sync::Arc;

use uuid::Uuid;

use credo_core::error::{AuthError, AuthResult};
use credo_core::logger::AuthLogger;
use credo_core::metrics::{AuthMetrics, NoopMetrics};
use credo_core::options::CredoOptions;
use credo_core::store::{
    AccountStore, AuditStore, IdempotencyStore, ProvisioningQueue, VerificationTokenStore,
};

use crate::audit::AuditService;
use crate::idempotency::IdempotencyLedger;
use crate::oracles::{
    BreachOracle, CaptchaOracle, DnsMxOracle, HibpBreachOracle, MxOracle, RecaptchaOracle,
};
use crate::provisioning::{
    CircuitBreaker, CompensationWorker, GrpcTransport, HttpTransport, ProfileTransport,
    ProvisioningClient,
};
use crate::rate_limit::RateLimiter;
use crate::tokens::TokenManager;

/// Per-request metadata, created at the inbound boundary and passed as an
/// explicit argument through the call chain. The request id propagates to
/// the downstream transports.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub captcha_token: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            ip: None,
            user_agent: None,
            captcha_token: None,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = request_id.to_string();
        self
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = Some(ip.to_string());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_captcha_token(mut self, token: &str) -> Self {
        self.captcha_token = Some(token.to_string());
        self
    }

    /// Caller identity for rate-limit keys.
    pub fn identity(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The fully-initialized service context.
pub struct AuthContext {
    pub options: CredoOptions,
    pub accounts: Arc<dyn AccountStore>,
    pub verification_tokens: Arc<dyn VerificationTokenStore>,
    pub ledger: IdempotencyLedger,
    pub tokens: TokenManager,
    pub rate_limiter: RateLimiter,
    pub provisioning: Arc<ProvisioningClient>,
    pub queue: Arc<dyn ProvisioningQueue>,
    pub mx_oracle: Arc<dyn MxOracle>,
    pub breach_oracle: Arc<dyn BreachOracle>,
    /// Absent when no CAPTCHA secret is configured; verification is then
    /// bypassed entirely.
    pub captcha_oracle: Option<Arc<dyn CaptchaOracle>>,
    pub audit: AuditService,
    pub metrics: Arc<dyn AuthMetrics>,
    pub logger: AuthLogger,
}

impl AuthContext {
    pub fn builder(options: CredoOptions) -> AuthContextBuilder {
        AuthContextBuilder::new(options)
    }

    /// Compensation worker bound to this context's queue and provisioning
    /// client.
    pub fn compensation_worker(&self) -> CompensationWorker {
        CompensationWorker::new(
            self.queue.clone(),
            self.provisioning.clone(),
            self.audit.clone(),
            self.options.provisioning.clone(),
            self.logger.clone(),
        )
    }
}

/// Builder wiring stores, the queue, and optional component overrides into
/// an [`AuthContext`]. Tests override oracles, transports, and metrics with
/// scripted instances; production wiring only sets the stores and queue.
pub struct AuthContextBuilder {
    options: CredoOptions,
    accounts: Option<Arc<dyn AccountStore>>,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    verification_tokens: Option<Arc<dyn VerificationTokenStore>>,
    audit_store: Option<Arc<dyn AuditStore>>,
    queue: Option<Arc<dyn ProvisioningQueue>>,
    rpc_transport: Option<Arc<dyn ProfileTransport>>,
    http_transport: Option<Arc<dyn ProfileTransport>>,
    mx_oracle: Option<Arc<dyn MxOracle>>,
    breach_oracle: Option<Arc<dyn BreachOracle>>,
    captcha_oracle: Option<Arc<dyn CaptchaOracle>>,
    metrics: Option<Arc<dyn AuthMetrics>>,
    logger: Option<AuthLogger>,
}

impl AuthContextBuilder {
    pub fn new(options: CredoOptions) -> Self {
        Self {
            options,
            accounts: None,
            idempotency: None,
            verification_tokens: None,
            audit_store: None,
            queue: None,
            rpc_transport: None,
            http_transport: None,
            mx_oracle: None,
            breach_oracle: None,
            captcha_oracle: None,
            metrics: None,
            logger: None,
        }
    }

    pub fn account_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(store);
        self
    }

    pub fn idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(store);
        self
    }

    pub fn verification_token_store(mut self, store: Arc<dyn VerificationTokenStore>) -> Self {
        self.verification_tokens = Some(store);
        self
    }

    pub fn audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = Some(store);
        self
    }

    pub fn provisioning_queue(mut self, queue: Arc<dyn ProvisioningQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn rpc_transport(mut self, transport: Arc<dyn ProfileTransport>) -> Self {
        self.rpc_transport = Some(transport);
        self
    }

    pub fn http_transport(mut self, transport: Arc<dyn ProfileTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    pub fn mx_oracle(mut self, oracle: Arc<dyn MxOracle>) -> Self {
        self.mx_oracle = Some(oracle);
        self
    }

    pub fn breach_oracle(mut self, oracle: Arc<dyn BreachOracle>) -> Self {
        self.breach_oracle = Some(oracle);
        self
    }

    pub fn captcha_oracle(mut self, oracle: Arc<dyn CaptchaOracle>) -> Self {
        self.captcha_oracle = Some(oracle);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn AuthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: AuthLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> AuthResult<Arc<AuthContext>> {
        let logger = self.logger.unwrap_or_default();
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));

        let accounts = self
            .accounts
            .ok_or_else(|| AuthError::internal("account store not configured"))?;
        let idempotency = self
            .idempotency
            .ok_or_else(|| AuthError::internal("idempotency store not configured"))?;
        let verification_tokens = self
            .verification_tokens
            .ok_or_else(|| AuthError::internal("verification token store not configured"))?;
        let audit_store = self
            .audit_store
            .ok_or_else(|| AuthError::internal("audit store not configured"))?;
        let queue = self
            .queue
            .ok_or_else(|| AuthError::internal("provisioning queue not configured"))?;

        let tokens = TokenManager::new(&self.options.keys, &self.options.token, &logger)?;

        let rpc_transport = self.rpc_transport.or_else(|| {
            let endpoint = self.options.provisioning.rpc_endpoint.as_deref()?;
            match GrpcTransport::connect_lazy(endpoint) {
                Ok(transport) => Some(Arc::new(transport) as Arc<dyn ProfileTransport>),
                Err(e) => {
                    logger.warn(&format!(
                        "gRPC transport initialization failed, will fall back to HTTP: {e}"
                    ));
                    None
                }
            }
        });
        let http_transport = self.http_transport.unwrap_or_else(|| {
            Arc::new(HttpTransport::new(self.options.provisioning.http_endpoint.clone()))
        });

        let breaker = Arc::new(CircuitBreaker::new(
            self.options.provisioning.breaker.clone(),
            metrics.clone(),
            logger.clone(),
        ));
        let provisioning = Arc::new(ProvisioningClient::new(
            rpc_transport,
            http_transport,
            breaker,
            self.options.provisioning.clone(),
            logger.clone(),
        ));

        let mx_oracle = self
            .mx_oracle
            .unwrap_or_else(|| Arc::new(DnsMxOracle::new(logger.clone())));
        let breach_oracle = self
            .breach_oracle
            .unwrap_or_else(|| Arc::new(HibpBreachOracle::new()));
        let captcha_oracle = self.captcha_oracle.or_else(|| {
            self.options.oracles.captcha_secret.as_ref().map(|secret| {
                Arc::new(RecaptchaOracle::new(secret.clone(), logger.clone()))
                    as Arc<dyn CaptchaOracle>
            })
        });

        Ok(Arc::new(AuthContext {
            ledger: IdempotencyLedger::new(idempotency, self.options.idempotency.window),
            rate_limiter: RateLimiter::new(self.options.rate_limit.clone()),
            audit: AuditService::new(audit_store, logger.clone()),
            accounts,
            verification_tokens,
            tokens,
            provisioning,
            queue,
            mx_oracle,
            breach_oracle,
            captcha_oracle,
            metrics,
            logger,
            options: self.options,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_defaults() {
        let ctx = RequestContext::new();
        assert!(!ctx.request_id.is_empty());
        assert_eq!(ctx.identity(), "unknown");

        let ctx = ctx.with_ip("1.2.3.4").with_user_agent("ua").with_captcha_token("tok");
        assert_eq!(ctx.identity(), "1.2.3.4");
        assert_eq!(ctx.user_agent.as_deref(), Some("ua"));
        assert_eq!(ctx.captcha_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestContext::new().request_id, RequestContext::new().request_id);
    }
}
