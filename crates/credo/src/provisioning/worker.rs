// Compensation queue consumer.
//
// Runs as an independent loop decoupled from any request's lifetime.
// Each job is retried through the same provisioning contract; failures
// re-enqueue with exponential backoff (base 2 s) until the attempt cap,
// after which the job is terminally failed for operator intervention.
// The account itself is never deleted.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use credo_core::logger::AuthLogger;
use credo_core::models::ProvisioningJob;
use credo_core::options::ProvisioningOptions;
use credo_core::store::ProvisioningQueue;

use crate::audit::{actions, outcomes, AuditService};
use crate::context::RequestContext;
use crate::provisioning::ProvisioningClient;

#[derive(Debug, Clone)]
pub struct CompensationWorker {
    queue: Arc<dyn ProvisioningQueue>,
    client: Arc<ProvisioningClient>,
    audit: AuditService,
    options: ProvisioningOptions,
    logger: AuthLogger,
    poll_interval: Duration,
}

impl CompensationWorker {
    pub fn new(
        queue: Arc<dyn ProvisioningQueue>,
        client: Arc<ProvisioningClient>,
        audit: AuditService,
        options: ProvisioningOptions,
        logger: AuthLogger,
    ) -> Self {
        Self {
            queue,
            client,
            audit,
            options,
            logger,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Consume jobs until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        self.logger.info("compensation worker started");
        loop {
            let worked = tokio::select! {
                _ = shutdown.cancelled() => break,
                worked = self.tick() => worked,
            };

            if !worked {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        self.logger.info("compensation worker stopped");
    }

    /// Process at most one ready job. Returns whether anything was
    /// processed; tests drive the worker deterministically through this.
    pub async fn tick(&self) -> bool {
        match self.queue.dequeue().await {
            Ok(Some(job)) => {
                self.process(job).await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.logger.warn(&format!("compensation dequeue failed: {e}"));
                false
            }
        }
    }

    async fn process(&self, job: ProvisioningJob) {
        self.logger.info(&format!(
            "processing profile creation for account {} (attempt {})",
            job.account_id,
            job.attempt_number + 1
        ));

        let created = self
            .client
            .provision(job.account_id, &job.username, &job.correlation_id)
            .await;

        if created {
            self.logger.info(&format!(
                "profile created for account {} by compensation job",
                job.account_id
            ));
            return;
        }

        if job.attempt_number < self.options.max_job_attempts {
            let delay = redelivery_delay(self.options.queue_base_delay, job.attempt_number);
            let retry = ProvisioningJob {
                attempt_number: job.attempt_number + 1,
                ..job.clone()
            };
            if let Err(e) = self.queue.enqueue(retry, delay).await {
                self.logger.error(&format!(
                    "failed to re-enqueue provisioning job for account {}: {e}",
                    job.account_id
                ));
            }
            return;
        }

        // Terminal: operator intervention required. The account stays.
        self.logger.error(&format!(
            "profile creation failed for account {} after {} attempts, manual intervention required",
            job.account_id,
            job.attempt_number + 1
        ));
        self.audit
            .append(
                Some(job.account_id),
                actions::PROFILE_PROVISION,
                outcomes::FAILURE,
                &RequestContext::new().with_request_id(&job.correlation_id),
                serde_json::json!({
                    "username": job.username,
                    "attempts": job.attempt_number + 1,
                }),
            )
            .await;
    }
}

/// Exponential redelivery delay: base × 2^attempt.
fn redelivery_delay(base: Duration, attempt_number: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt_number.min(16)))
}
