// Downstream provisioning resilience layer.
//
// `provision` wraps the create-profile call with, outermost first:
// bounded retry with exponential backoff, the shared circuit breaker, a
// per-call 1 s timeout, and a once-per-attempt RPC→HTTP transport
// fallback. It returns `true` when the profile exists or was created and
// `false` when every synchronous option is exhausted, at which point the
// caller hands the work to the compensation queue.

pub mod breaker;
pub mod transport;
pub mod worker;

use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use uuid::Uuid;

use credo_core::logger::AuthLogger;
use credo_core::options::ProvisioningOptions;

pub use breaker::{BreakerOpen, CircuitBreaker, CircuitState};
pub use transport::{GrpcTransport, HttpTransport, ProfileTransport, ProvisionOutcome, TransportError};
pub use worker::CompensationWorker;

/// One failed attempt, as seen by the retry loop.
#[derive(Debug, Clone, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    BreakerOpen(#[from] BreakerOpen),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct ProvisioningClient {
    rpc: Option<Arc<dyn ProfileTransport>>,
    http: Arc<dyn ProfileTransport>,
    breaker: Arc<CircuitBreaker>,
    options: ProvisioningOptions,
    logger: AuthLogger,
}

impl ProvisioningClient {
    pub fn new(
        rpc: Option<Arc<dyn ProfileTransport>>,
        http: Arc<dyn ProfileTransport>,
        breaker: Arc<CircuitBreaker>,
        options: ProvisioningOptions,
        logger: AuthLogger,
    ) -> Self {
        Self {
            rpc,
            http,
            breaker,
            options,
            logger,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Synchronously provision a profile downstream.
    ///
    /// `true` means the profile exists or was created (a conflict answer
    /// counts). `false` means every retry was exhausted, including fast
    /// failures while the breaker was open; the caller must enqueue a
    /// compensation job and must not fail its own flow.
    pub async fn provision(&self, account_id: Uuid, username: &str, request_id: &str) -> bool {
        let backoff = ExponentialBuilder::new()
            .with_min_delay(self.options.retry_min_delay)
            .with_max_delay(self.options.retry_max_delay)
            .with_factor(2.0)
            .with_max_times(self.options.retries);

        let attempt = || async { self.attempt_once(account_id, username, request_id).await };

        let result = attempt
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .notify(|err: &AttemptError, dur| {
                self.logger.warn(&format!(
                    "provisioning attempt for account {account_id} failed ({err}), \
                     retrying in {dur:?}"
                ));
            })
            .await;

        match result {
            Ok(outcome) => {
                if outcome == ProvisionOutcome::AlreadyExists {
                    self.logger.info(&format!(
                        "profile already exists for account {account_id}, treating as success"
                    ));
                }
                true
            }
            Err(e) => {
                self.logger.warn(&format!(
                    "provisioning exhausted for account {account_id}: {e}"
                ));
                false
            }
        }
    }

    /// One breaker-guarded attempt.
    ///
    /// A fast failure from an open breaker does not touch the rolling
    /// sample; only calls that were actually tried are recorded.
    async fn attempt_once(
        &self,
        account_id: Uuid,
        username: &str,
        request_id: &str,
    ) -> Result<ProvisionOutcome, AttemptError> {
        self.breaker.check()?;

        match self.call_with_fallback(account_id, username, request_id).await {
            Ok(outcome) => {
                self.breaker.record_success();
                Ok(outcome)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e.into())
            }
        }
    }

    /// RPC first, HTTP on any RPC failure — once per attempt, not per retry.
    async fn call_with_fallback(
        &self,
        account_id: Uuid,
        username: &str,
        request_id: &str,
    ) -> Result<ProvisionOutcome, TransportError> {
        if let Some(rpc) = &self.rpc {
            match self.call_with_timeout(rpc.as_ref(), account_id, username, request_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    self.logger
                        .warn(&format!("RPC transport failed ({e}), falling back to HTTP"));
                }
            }
        }
        self.call_with_timeout(self.http.as_ref(), account_id, username, request_id)
            .await
    }

    /// Bound a single transport call at the configured deadline. An
    /// abandoned in-flight call is a failure, never success.
    async fn call_with_timeout(
        &self,
        transport: &dyn ProfileTransport,
        account_id: Uuid,
        username: &str,
        request_id: &str,
    ) -> Result<ProvisionOutcome, TransportError> {
        match tokio::time::timeout(
            self.options.call_timeout,
            transport.create_profile(account_id, username, request_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}
