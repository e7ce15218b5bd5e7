//! Postgres-backed credential store.

use super::{CredentialStore, CredentialTransaction, StoreError, StoredToken};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const SAVE_SQL: &str = "INSERT INTO refresh_tokens (user_id, token_id, token_hash) VALUES ($1, $2, $3)";

const GET_SQL: &str = "SELECT token_hash, revoked FROM refresh_tokens WHERE user_id = $1 AND token_id = $2";

// Row lock on the conditional update makes a concurrent revoke wait, then
// re-check `revoked` and match nothing.
const REVOKE_SQL: &str =
    "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND token_id = $2 AND revoked = FALSE";

/// [`CredentialStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool and verify it with a ping.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(max_connections, "connected to postgres");

        Ok(Self::new(pool))
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("apply migrations: {e}")))
    }
}

impl<'r> FromRow<'r, PgRow> for StoredToken {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            token_hash: row.try_get("token_hash")?,
            revoked: row.try_get("revoked")?,
        })
    }
}

async fn save_on(conn: &mut PgConnection, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
    sqlx::query(SAVE_SQL)
        .bind(user_id)
        .bind(token_id)
        .bind(token_hash)
        .execute(conn)
        .await?;
    Ok(())
}

async fn get_on(conn: &mut PgConnection, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
    sqlx::query_as::<Postgres, StoredToken>(GET_SQL)
        .bind(user_id)
        .bind(token_id)
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound)
}

async fn revoke_on(conn: &mut PgConnection, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query(REVOKE_SQL)
        .bind(user_id)
        .bind(token_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn save(&self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        save_on(&mut conn, user_id, token_id, token_hash).await
    }

    async fn get(&self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
        let mut conn = self.pool.acquire().await?;
        get_on(&mut conn, user_id, token_id).await
    }

    async fn revoke(&self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        revoke_on(&mut conn, user_id, token_id).await
    }

    async fn begin(&self) -> Result<Box<dyn CredentialTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCredentialTransaction { tx }))
    }
}

/// Open Postgres transaction. Dropping it without commit rolls back.
struct PgCredentialTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CredentialTransaction for PgCredentialTransaction {
    async fn save(&mut self, user_id: Uuid, token_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        save_on(&mut self.tx, user_id, token_id, token_hash).await
    }

    async fn get(&mut self, user_id: Uuid, token_id: Uuid) -> Result<StoredToken, StoreError> {
        get_on(&mut self.tx, user_id, token_id).await
    }

    async fn revoke(&mut self, user_id: Uuid, token_id: Uuid) -> Result<(), StoreError> {
        revoke_on(&mut self.tx, user_id, token_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::from)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(StoreError::from)
    }
}
