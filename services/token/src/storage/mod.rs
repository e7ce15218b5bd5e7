//! Persistence contract for refresh token records.
//!
//! Operations inside a transaction go through an explicit
//! [`CredentialTransaction`] handle. Dropping a handle without calling
//! [`CredentialTransaction::commit`] rolls the transaction back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Storage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record already exists for the subject and token id
    #[error("refresh token exists")]
    AlreadyExists,

    /// No matching record
    #[error("refresh token not found")]
    NotFound,

    /// Underlying storage failure
    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error.
    #[must_use]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::AlreadyExists,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// A persisted refresh token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Subject the token was issued to
    pub user_id: Uuid,
    /// The token's `jti`
    pub token_id: Uuid,
    /// Digest of the signed token, never the token itself
    pub token_hash: String,
    /// Set once the token has been consumed
    pub revoked: bool,
}

/// Stored digest and revocation state for one refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    /// Digest of the signed token
    pub token_hash: String,
    /// Whether the token has been consumed
    pub revoked: bool,
}

/// Durable keyed storage for refresh token records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new, non-revoked record.
    async fn save(&self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError>;

    /// Fetch a record. `NotFound` if absent.
    async fn get(&self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError>;

    /// Flip a non-revoked record to revoked. `NotFound` if no such record
    /// exists or it is already revoked.
    async fn revoke(&self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn CredentialTransaction>, StoreError>;
}

/// Store operations that share one atomic transaction.
#[async_trait]
pub trait CredentialTransaction: Send {
    /// Transactional [`CredentialStore::save`].
    async fn save(&mut self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError>;

    /// Transactional [`CredentialStore::get`].
    async fn get(&mut self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError>;

    /// Transactional [`CredentialStore::revoke`].
    async fn revoke(&mut self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError>;

    /// Make every change in the transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every change in the transaction.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
pub async fn with_transaction<S, T, E, F>(store: &S, f: F) -> Result<T, E>
where
    S: CredentialStore + ?Sized,
    T: Send,
    E: From<StoreError> + Send,
    F: for<'t> FnOnce(&'t mut dyn CredentialTransaction) -> BoxFuture<'t, Result<T, E>> + Send,
{
    let mut tx = store.begin().await?;
    let result = f(tx.as_mut()).await;

    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
