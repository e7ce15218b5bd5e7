//! Process-local credential store.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! copy of the records; `commit` publishes the copy. Concurrent transactions
//! are therefore serialized, and a dropped transaction leaves no trace.

use super::{CredentialStore, CredentialTransaction, RefreshTokenRecord, StoreError, StoredToken};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type Records = HashMap<(Uuid, Uuid), RefreshTokenRecord>;

/// In-memory [`CredentialStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    records: Arc<Mutex<Records>>,
}

impl InMemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record for a user.
    pub async fn records_for(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.records
            .lock()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Snapshot of every record.
    pub async fn records(&self) -> Vec<RefreshTokenRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

fn save_into(records: &mut Records, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
    if records.contains_key(&(user_id, token_id)) {
        return Err(StoreError::AlreadyExists);
    }
    records.insert(
        (user_id, token_id),
        RefreshTokenRecord {
            user_id,
            token_id,
            token_hash: token_hash.to_string(),
            revoked: false,
        },
    );
    Ok(())
}

fn get_from(records: &Records, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
    records
        .get(&(user_id, token_id))
        .map(|r| StoredToken {
            token_hash: r.token_hash.clone(),
            revoked: r.revoked,
        })
        .ok_or(StoreError::NotFound)
}

fn revoke_in(records: &mut Records, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
    match records.get_mut(&(user_id, token_id)) {
        Some(record) if !record.revoked => {
            record.revoked = true;
            Ok(())
        }
        _ => Err(StoreError::NotFound),
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn save(&self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        save_into(&mut *self.records.lock().await, user_id, token_id, token_hash)
    }

    async fn get(&self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
        get_from(&*self.records.lock().await, user_id, token_id)
    }

    async fn revoke(&self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        revoke_in(&mut *self.records.lock().await, user_id, token_id)
    }

    async fn begin(&self) -> Result<Box<dyn CredentialTransaction>, StoreError> {
        let guard = Arc::clone(&self.records).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<Records>,
    staged: Records,
}

#[async_trait]
impl CredentialTransaction for InMemoryTransaction {
    async fn save(&mut self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        save_into(&mut self.staged, user_id, token_id, token_hash)
    }

    async fn get(&mut self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
        get_from(&self.staged, user_id, token_id)
    }

    async fn revoke(&mut self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        revoke_in(&mut self.staged, user_id, token_id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
