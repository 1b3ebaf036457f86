// In-memory provisioning queue with delayed delivery.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use credo_core::error::QueueError;
use credo_core::models::ProvisioningJob;
use credo_core::store::ProvisioningQueue;

/// FIFO queue of (ready-at, job). `dequeue` only yields jobs whose delay
/// has elapsed, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    jobs: Arc<Mutex<VecDeque<(Instant, ProvisioningJob)>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make enqueue/dequeue fail, simulating the broker being down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All queued jobs regardless of readiness, oldest first.
    pub fn snapshot(&self) -> Vec<ProvisioningJob> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, job)| job.clone())
            .collect()
    }
}

#[async_trait]
impl ProvisioningQueue for MemoryQueue {
    async fn enqueue(&self, job: ProvisioningJob, delay: Duration) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError("memory queue marked unavailable".into()));
        }
        let ready_at = Instant::now() + delay;
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((ready_at, job));
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<ProvisioningJob>, QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError("memory queue marked unavailable".into()));
        }
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let position = jobs.iter().position(|(ready_at, _)| *ready_at <= now);
        Ok(position.and_then(|i| jobs.remove(i)).map(|(_, job)| job))
    }
}
