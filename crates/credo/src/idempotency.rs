// Idempotency ledger: maps (normalized email, client key) to the result the
// first successful registration attempt produced, inside a 24 h window.
//
// The (email, key) unique index arbitrates concurrent retries of the same
// logical request: a second writer loses the insert, re-fetches, and
// returns the winner's record instead of erroring.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use credo_core::error::{AuthError, AuthResult, StoreError};
use credo_core::models::IdempotencyRecord;
use credo_core::store::IdempotencyStore;

#[derive(Debug, Clone)]
pub struct IdempotencyLedger {
    store: Arc<dyn IdempotencyStore>,
    window: chrono::Duration,
}

impl IdempotencyLedger {
    pub fn new(store: Arc<dyn IdempotencyStore>, window: Duration) -> Self {
        Self {
            store,
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
        }
    }

    /// Look up a replayable result. Expired rows are treated as absent, so
    /// the same pair becomes a fresh attempt after the window.
    pub async fn lookup(&self, email: &str, key: &str) -> AuthResult<Option<IdempotencyRecord>> {
        let record = self.store.find(email, key).await?;
        Ok(record.filter(|r| !r.is_expired(Utc::now())))
    }

    /// Record the result of a completed registration.
    ///
    /// If a concurrent request stored the pair first, the winner's record is
    /// returned and the caller answers with it.
    pub async fn store(
        &self,
        email: &str,
        key: &str,
        account_id: Uuid,
        response_token: &str,
    ) -> AuthResult<IdempotencyRecord> {
        let record = IdempotencyRecord::new(email, key, account_id, response_token, self.window);
        match self.store.insert(record).await {
            Ok(stored) => Ok(stored),
            Err(StoreError::UniqueViolation { .. }) => self
                .store
                .find(email, key)
                .await?
                .ok_or_else(|| AuthError::internal("idempotency record vanished after conflict")),
            Err(e) => Err(e.into()),
        }
    }
}
