//! Shared fixtures for token service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use auth_token_service::jwt::SigningSecret;
use auth_token_service::notify::{Notifier, NotifyError};
use auth_token_service::refresh::{ManagerParams, SecretHasher, TokenClass, TokenLifecycleManager};
use auth_token_service::storage::{
    CredentialStore, CredentialTransaction, InMemoryCredentialStore, RefreshTokenRecord, StoreError,
    StoredToken,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const ACCESS_SECRET: &[u8] = b"access-secret-for-integration-tests!";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-for-integration-test!";
pub const ALERT_RECIPIENT: &str = "security@example.com";

/// Alert captured by [`RecordingNotifier`].
#[derive(Debug, Clone)]
pub struct SentAlert {
    pub recipient: String,
    pub subject: String,
    /// Store contents at the moment the alert was sent
    pub records_at_send: Vec<RefreshTokenRecord>,
}

/// Records every alert along with a snapshot of the store.
pub struct RecordingNotifier {
    store: InMemoryCredentialStore,
    fail: bool,
    sent: Mutex<Vec<SentAlert>>,
}

impl RecordingNotifier {
    pub fn new(store: InMemoryCredentialStore) -> Self {
        Self {
            store,
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(store: InMemoryCredentialStore) -> Self {
        Self {
            fail: true,
            ..Self::new(store)
        }
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        let records_at_send = self.store.records().await;
        self.sent.lock().unwrap().push(SentAlert {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            records_at_send,
        });

        if self.fail {
            return Err(NotifyError("mail relay unavailable".to_string()));
        }
        Ok(())
    }
}

/// Failure injected by [`FaultyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Plain `save` reports a conflict
    SaveConflict,
    /// Plain `get` reports a backend failure
    GetBackend,
    /// `save` inside a transaction reports a backend failure
    TransactionalInsert,
}

/// Wraps the in-memory store and injects one [`Fault`].
#[derive(Clone)]
pub struct FaultyStore {
    pub inner: InMemoryCredentialStore,
    pub fault: Fault,
}

impl FaultyStore {
    pub fn new(inner: InMemoryCredentialStore, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

#[async_trait]
impl CredentialStore for FaultyStore {
    async fn save(&self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        if self.fault == Fault::SaveConflict {
            return Err(StoreError::AlreadyExists);
        }
        self.inner.save(user_id, token_id, token_hash).await
    }

    async fn get(&self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
        if self.fault == Fault::GetBackend {
            return Err(StoreError::backend("connection reset"));
        }
        self.inner.get(user_id, token_id).await
    }

    async fn revoke(&self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        self.inner.revoke(user_id, token_id).await
    }

    async fn begin(&self) -> Result<Box<dyn CredentialTransaction>, StoreError> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fail_insert: self.fault == Fault::TransactionalInsert,
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn CredentialTransaction>,
    fail_insert: bool,
}

#[async_trait]
impl CredentialTransaction for FaultyTransaction {
    async fn save(&mut self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        if self.fail_insert {
            return Err(StoreError::backend("disk full"));
        }
        self.inner.save(user_id, token_id, token_hash).await
    }

    async fn get(&mut self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
        self.inner.get(user_id, token_id).await
    }

    async fn revoke(&mut self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        self.inner.revoke(user_id, token_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

/// Cheap work factor so tests stay fast.
pub fn test_hasher() -> SecretHasher {
    SecretHasher::new(64, 1, 1).unwrap()
}

pub fn build_manager(
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    refresh_ttl: Duration,
) -> TokenLifecycleManager {
    TokenLifecycleManager::new(ManagerParams {
        issuer: "auth-service".to_string(),
        access: TokenClass::new(SigningSecret::new(ACCESS_SECRET.to_vec()), Duration::from_secs(900)),
        refresh: TokenClass::new(SigningSecret::new(REFRESH_SECRET.to_vec()), refresh_ttl),
        hasher: test_hasher(),
        alert_recipient: ALERT_RECIPIENT.to_string(),
        store,
        notifier,
    })
}

/// Manager over a fresh in-memory store with a recording notifier.
pub fn harness() -> (TokenLifecycleManager, InMemoryCredentialStore, Arc<RecordingNotifier>) {
    let store = InMemoryCredentialStore::new();
    let notifier = Arc::new(RecordingNotifier::new(store.clone()));
    let manager = build_manager(
        Arc::new(store.clone()),
        notifier.clone(),
        Duration::from_secs(3600),
    );
    (manager, store, notifier)
}
