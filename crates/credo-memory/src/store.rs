// In-memory record store backing all four store traits.
//
// Data lives in HashMaps behind a single `tokio::sync::RwLock`, so an
// insert observes a consistent snapshot of every unique index, the same
// arbitration a SQL unique constraint provides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use credo_core::error::{StoreError, StoreResult};
use credo_core::models::{
    normalize_email, Account, AuditRecord, EmailVerificationToken, IdempotencyRecord,
};
use credo_core::store::{AccountStore, AuditStore, IdempotencyStore, VerificationTokenStore};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    idempotency: Vec<IdempotencyRecord>,
    verification_tokens: Vec<EmailVerificationToken>,
    audit: Vec<AuditRecord>,
}

/// In-memory store. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StoreError::Unavailable`. For tests
    /// exercising dependency-outage paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    pub async fn account_count(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    pub async fn idempotency_count(&self) -> usize {
        self.inner.read().await.idempotency.len()
    }

    pub async fn verification_token_count(&self) -> usize {
        self.inner.read().await.verification_tokens.len()
    }

    /// Snapshot of the audit trail, oldest first.
    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.inner.read().await.audit.clone()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.accounts.clear();
        inner.idempotency.clear();
        inner.verification_tokens.clear();
        inner.audit.clear();
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, account: Account) -> StoreResult<Account> {
        self.check_available()?;
        let mut inner = self.inner.write().await;

        let email = normalize_email(&account.email);
        if inner.accounts.values().any(|a| a.email == email) {
            return Err(StoreError::UniqueViolation { field: "email".into() });
        }
        if inner.accounts.values().any(|a| a.username == account.username) {
            return Err(StoreError::UniqueViolation { field: "username".into() });
        }

        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        self.check_available()?;
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check_available()?;
        let email = normalize_email(email);
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn update(&self, account: &Account) -> StoreResult<()> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        match inner.accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("no account with id {}", account.id))),
        }
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn insert(&self, record: IdempotencyRecord) -> StoreResult<IdempotencyRecord> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if inner
            .idempotency
            .iter()
            .any(|r| r.email == record.email && r.key == record.key)
        {
            return Err(StoreError::UniqueViolation { field: "email,key".into() });
        }
        inner.idempotency.push(record.clone());
        Ok(record)
    }

    async fn find(&self, email: &str, key: &str) -> StoreResult<Option<IdempotencyRecord>> {
        self.check_available()?;
        let email = normalize_email(email);
        Ok(self
            .inner
            .read()
            .await
            .idempotency
            .iter()
            .find(|r| r.email == email && r.key == key)
            .cloned())
    }
}

#[async_trait]
impl VerificationTokenStore for MemoryStore {
    async fn insert(&self, token: EmailVerificationToken) -> StoreResult<()> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if inner.verification_tokens.iter().any(|t| t.token == token.token) {
            return Err(StoreError::UniqueViolation { field: "token".into() });
        }
        inner.verification_tokens.push(token);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<EmailVerificationToken>> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .await
            .verification_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        self.inner.write().await.verification_tokens.retain(|t| t.id != id);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, record: AuditRecord) -> StoreResult<()> {
        self.check_available()?;
        self.inner.write().await.audit.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn account(email: &str, username: &str) -> Account {
        Account::new(email, username, "First", "Last", "digest")
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryStore::new();
        let created = store.create(account("a@x.com", "alice")).await.unwrap();

        assert_eq!(
            store.find_by_id(created.id).await.unwrap().unwrap().username,
            "alice"
        );
        assert!(store.find_by_email("A@X.COM").await.unwrap().is_some());
        assert!(store.find_by_username("alice").await.unwrap().is_some());
        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email_rejected() {
        let store = MemoryStore::new();
        store.create(account("a@x.com", "alice")).await.unwrap();

        let err = store.create(account("a@x.com", "bob")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref field } if field == "email"));
        assert_eq!(store.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_unique_username_rejected() {
        let store = MemoryStore::new();
        store.create(account("a@x.com", "alice")).await.unwrap();

        let err = store.create(account("b@x.com", "alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref field } if field == "username"));
    }

    #[tokio::test]
    async fn test_update_roundtrip() {
        let store = MemoryStore::new();
        let mut created = store.create(account("a@x.com", "alice")).await.unwrap();

        created.email_verified = true;
        created.refresh_token_digest = Some("digest".into());
        store.update(&created).await.unwrap();

        let loaded = store.find_by_id(created.id).await.unwrap().unwrap();
        assert!(loaded.email_verified);
        assert_eq!(loaded.refresh_token_digest.as_deref(), Some("digest"));
    }

    #[tokio::test]
    async fn test_idempotency_pair_unique() {
        let store = MemoryStore::new();
        let record = IdempotencyRecord::new("a@x.com", "k1", Uuid::new_v4(), "tok", Duration::hours(24));
        credo_core::IdempotencyStore::insert(&store, record.clone()).await.unwrap();

        let duplicate =
            IdempotencyRecord::new("a@x.com", "k1", Uuid::new_v4(), "tok2", Duration::hours(24));
        assert!(matches!(
            credo_core::IdempotencyStore::insert(&store, duplicate).await,
            Err(StoreError::UniqueViolation { .. })
        ));

        // Same key under a different email is a different pair.
        let other_email =
            IdempotencyRecord::new("b@x.com", "k1", Uuid::new_v4(), "tok3", Duration::hours(24));
        credo_core::IdempotencyStore::insert(&store, other_email).await.unwrap();

        let found = store.find("a@x.com", "k1").await.unwrap().unwrap();
        assert_eq!(found.response_token, "tok");
    }

    #[tokio::test]
    async fn test_verification_token_lifecycle() {
        let store = MemoryStore::new();
        let token = EmailVerificationToken::new(Uuid::new_v4(), "tok-1", Duration::hours(24));
        credo_core::VerificationTokenStore::insert(&store, token.clone()).await.unwrap();

        assert!(store.find_by_token("tok-1").await.unwrap().is_some());
        store.delete(token.id).await.unwrap();
        assert!(store.find_by_token("tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.find_by_email("a@x.com").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.create(account("a@x.com", "alice")).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
    }
}
