// Configuration record storage: in-memory default and PostgreSQL backend

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;

use crate::core::errors::{RelayError, RelayResult};
use crate::core::models::ConfigRecord;
use crate::core::traits::ConfigStore;

/// Process-local config store; keeps insertion order
#[derive(Default)]
pub struct InMemoryConfigStore {
    records: RwLock<Vec<ConfigRecord>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records (used by tests and demos)
    pub fn with_records(records: Vec<ConfigRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn list_all(&self) -> RelayResult<Vec<ConfigRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn list_for_owner(&self, owner: &str) -> RelayResult<Vec<ConfigRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }

    async fn get(&self, owner: &str, config_id: &str) -> RelayResult<Option<ConfigRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.owner == owner && r.config_id == config_id)
            .cloned())
    }

    async fn insert(&self, record: &ConfigRecord) -> RelayResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &ConfigRecord) -> RelayResult<bool> {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|r| r.owner == record.owner && r.config_id == record.config_id)
        {
            Some(existing) => {
                existing.model = record.model.clone();
                existing.message = record.message.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, owner: &str, config_id: &str) -> RelayResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.owner == owner && r.config_id == config_id));
        Ok(records.len() < before)
    }
}

#[derive(FromRow)]
struct ConfigRow {
    config_id: String,
    owner: String,
    name: String,
    model: String,
    message: String,
}

impl From<ConfigRow> for ConfigRecord {
    fn from(row: ConfigRow) -> Self {
        ConfigRecord {
            config_id: row.config_id,
            owner: row.owner,
            name: row.name,
            model: row.model,
            message: row.message,
        }
    }
}

/// PostgreSQL-backed config store
pub struct PgConfigStore {
    db_pool: PgPool,
}

impl PgConfigStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create the `configs` table if it does not exist yet
    pub async fn ensure_schema(&self) -> RelayResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS configs (
                seq BIGSERIAL,
                config_id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                model TEXT NOT NULL,
                message TEXT NOT NULL
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
impl ConfigStore for PgConfigStore {
    async fn list_all(&self) -> RelayResult<Vec<ConfigRecord>> {
        let rows = sqlx::query_as::<_, ConfigRow>(
            "SELECT config_id, owner, name, model, message FROM configs ORDER BY seq",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(ConfigRecord::from).collect())
    }

    async fn list_for_owner(&self, owner: &str) -> RelayResult<Vec<ConfigRecord>> {
        let rows = sqlx::query_as::<_, ConfigRow>(
            "SELECT config_id, owner, name, model, message FROM configs
             WHERE owner = $1 ORDER BY seq",
        )
        .bind(owner)
        .fetch_all(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(ConfigRecord::from).collect())
    }

    async fn get(&self, owner: &str, config_id: &str) -> RelayResult<Option<ConfigRecord>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT config_id, owner, name, model, message FROM configs
             WHERE owner = $1 AND config_id = $2",
        )
        .bind(owner)
        .bind(config_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(ConfigRecord::from))
    }

    async fn insert(&self, record: &ConfigRecord) -> RelayResult<()> {
        sqlx::query(
            "INSERT INTO configs (config_id, owner, name, model, message)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.config_id)
        .bind(&record.owner)
        .bind(&record.name)
        .bind(&record.model)
        .bind(&record.message)
        .execute(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn update(&self, record: &ConfigRecord) -> RelayResult<bool> {
        let result = sqlx::query(
            "UPDATE configs SET model = $3, message = $4
             WHERE owner = $1 AND config_id = $2",
        )
        .bind(&record.owner)
        .bind(&record.config_id)
        .bind(&record.model)
        .bind(&record.message)
        .execute(&self.db_pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner: &str, config_id: &str) -> RelayResult<bool> {
        let result = sqlx::query("DELETE FROM configs WHERE owner = $1 AND config_id = $2")
            .bind(owner)
            .bind(config_id)
            .execute(&self.db_pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}
