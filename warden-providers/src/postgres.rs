use crate::RegistryStore;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use warden_common::{ServerRecord, RECORD_SORT_KEY};

/// Registry over a Postgres key/value table:
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS server_records (
///     pk           TEXT NOT NULL,
///     sk           TEXT NOT NULL,
///     server_ip    TEXT,
///     server_name  TEXT NOT NULL,
///     last_updated TEXT NOT NULL,
///     is_running   BOOLEAN NOT NULL DEFAULT FALSE,
///     PRIMARY KEY (pk, sk)
/// );
/// ```
pub struct PgRegistry {
    pool: Pool<Postgres>,
}

impl PgRegistry {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl RegistryStore for PgRegistry {
    async fn put(&self, record: &ServerRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO server_records (pk, sk, server_ip, server_name, last_updated, is_running)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (pk, sk) DO UPDATE
             SET server_ip = EXCLUDED.server_ip,
                 server_name = EXCLUDED.server_name,
                 last_updated = EXCLUDED.last_updated,
                 is_running = EXCLUDED.is_running",
        )
        .bind(&record.id)
        .bind(RECORD_SORT_KEY)
        .bind(&record.address)
        .bind(&record.name)
        .bind(&record.last_updated)
        .bind(record.is_running)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, server_id: &str) -> Result<Option<ServerRecord>> {
        let row: Option<(String, Option<String>, String, String, bool)> = sqlx::query_as(
            "SELECT pk, server_ip, server_name, last_updated, is_running
             FROM server_records
             WHERE pk = $1 AND sk = $2",
        )
        .bind(server_id)
        .bind(RECORD_SORT_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, address, name, last_updated, is_running)| ServerRecord {
            id,
            address,
            name,
            last_updated,
            is_running,
        }))
    }

    async fn list(&self) -> Result<Vec<ServerRecord>> {
        let rows: Vec<(String, Option<String>, String, String, bool)> = sqlx::query_as(
            "SELECT pk, server_ip, server_name, last_updated, is_running
             FROM server_records
             WHERE sk = $1
             ORDER BY server_name",
        )
        .bind(RECORD_SORT_KEY)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, address, name, last_updated, is_running)| ServerRecord {
                id,
                address,
                name,
                last_updated,
                is_running,
            })
            .collect())
    }

    async fn delete(&self, server_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM server_records WHERE pk = $1 AND sk = $2")
            .bind(server_id)
            .bind(RECORD_SORT_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
