// Record-store and queue abstractions.
//
// Every backend (in-memory, SQL) implements these traits. Each operation
// has ACID-per-operation semantics; the unique indexes on email, username,
// (email, key), and token are the only cross-request ordering guarantees
// the service relies on.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{QueueError, StoreResult};
use crate::models::{Account, AuditRecord, EmailVerificationToken, IdempotencyRecord, ProvisioningJob};

/// Account persistence. `create` must fail with
/// `StoreError::UniqueViolation` naming `email` or `username` when the
/// corresponding index rejects the write; concurrent registrations for the
/// same identity are arbitrated here and nowhere else.
#[async_trait]
pub trait AccountStore: Send + Sync + fmt::Debug {
    async fn create(&self, account: Account) -> StoreResult<Account>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Full-row update keyed by `account.id`.
    async fn update(&self, account: &Account) -> StoreResult<()>;
}

/// Idempotency ledger persistence, unique on (email, key).
#[async_trait]
pub trait IdempotencyStore: Send + Sync + fmt::Debug {
    /// Insert a new record; fails with `UniqueViolation` if the (email, key)
    /// pair already exists. The losing writer of a race re-fetches.
    async fn insert(&self, record: IdempotencyRecord) -> StoreResult<IdempotencyRecord>;

    async fn find(&self, email: &str, key: &str) -> StoreResult<Option<IdempotencyRecord>>;
}

/// Email-verification token persistence, unique on token.
#[async_trait]
pub trait VerificationTokenStore: Send + Sync + fmt::Debug {
    async fn insert(&self, token: EmailVerificationToken) -> StoreResult<()>;

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<EmailVerificationToken>>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditStore: Send + Sync + fmt::Debug {
    async fn append(&self, record: AuditRecord) -> StoreResult<()>;
}

/// Compensation queue for profile provisioning.
///
/// Enqueue on the request path is fire-and-forget: the orchestrator logs a
/// `QueueError` and never propagates it. `dequeue` returns jobs whose delay
/// has elapsed, oldest first.
#[async_trait]
pub trait ProvisioningQueue: Send + Sync + fmt::Debug {
    async fn enqueue(&self, job: ProvisioningJob, delay: Duration) -> Result<(), QueueError>;

    async fn dequeue(&self) -> Result<Option<ProvisioningJob>, QueueError>;
}
