// Registration storage: in-memory default and PostgreSQL backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::errors::{RelayError, RelayResult};
use crate::core::models::{AcceptOutcome, Registration, RegistrationId};
use crate::core::traits::RegistrationStore;

/// Process-local registration store
///
/// Records live for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryRegistrationStore {
    records: RwLock<HashMap<RegistrationId, Registration>>,
}

impl InMemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn insert(&self, registration: &Registration) -> RelayResult<()> {
        self.records
            .write()
            .await
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    async fn get(&self, id: &RegistrationId) -> RelayResult<Option<Registration>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn accept(&self, id: &RegistrationId) -> RelayResult<AcceptOutcome> {
        let mut records = self.records.write().await;
        let outcome = match records.get_mut(id) {
            None => AcceptOutcome::NotFound,
            Some(record) if record.accepted => AcceptOutcome::AlreadyAccepted,
            Some(record) => {
                record.accepted = true;
                AcceptOutcome::Accepted(record.clone())
            }
        };
        Ok(outcome)
    }

    async fn delete(&self, id: &RegistrationId) -> RelayResult<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn list_accepted_with_callback(&self) -> RelayResult<Vec<Registration>> {
        let mut accepted: Vec<Registration> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.accepted && r.callback_uri().is_some())
            .cloned()
            .collect();
        accepted.sort_by_key(|r| r.created_at);
        Ok(accepted)
    }
}

/// Database row structure for registrations
#[derive(FromRow)]
struct RegistrationRow {
    id: String,
    accepted: bool,
    callback: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        Registration {
            id: RegistrationId::from(row.id),
            accepted: row.accepted,
            callback: row.callback,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL-backed registration store
pub struct PgRegistrationStore {
    db_pool: PgPool,
}

impl PgRegistrationStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create the `registrations` table if it does not exist yet
    pub async fn ensure_schema(&self) -> RelayResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS registrations (
                id TEXT PRIMARY KEY,
                accepted BOOLEAN NOT NULL DEFAULT FALSE,
                callback TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}

fn store_error(e: sqlx::Error) -> RelayError {
    RelayError::StoreUnavailable(format!("Database error: {}", e))
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn insert(&self, registration: &Registration) -> RelayResult<()> {
        sqlx::query(
            "INSERT INTO registrations (id, accepted, callback, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(registration.id.as_str())
        .bind(registration.accepted)
        .bind(registration.callback.as_deref())
        .bind(registration.created_at)
        .execute(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, id: &RegistrationId) -> RelayResult<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, accepted, callback, created_at FROM registrations WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(Registration::from))
    }

    async fn accept(&self, id: &RegistrationId) -> RelayResult<AcceptOutcome> {
        // Conditional update so only one concurrent caller observes the transition
        let flipped = sqlx::query_as::<_, RegistrationRow>(
            "UPDATE registrations SET accepted = TRUE
             WHERE id = $1 AND accepted = FALSE
             RETURNING id, accepted, callback, created_at",
        )
        .bind(id.as_str())
        .fetch_optional(&self.db_pool)
        .await
        .map_err(store_error)?;

        if let Some(row) = flipped {
            return Ok(AcceptOutcome::Accepted(row.into()));
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM registrations WHERE id = $1)")
                .bind(id.as_str())
                .fetch_one(&self.db_pool)
                .await
                .map_err(store_error)?;

        Ok(if exists {
            AcceptOutcome::AlreadyAccepted
        } else {
            AcceptOutcome::NotFound
        })
    }

    async fn delete(&self, id: &RegistrationId) -> RelayResult<bool> {
        let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.db_pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_accepted_with_callback(&self) -> RelayResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, accepted, callback, created_at FROM registrations
             WHERE accepted AND callback IS NOT NULL AND callback <> ''
             ORDER BY created_at",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(Registration::from).collect())
    }
}
